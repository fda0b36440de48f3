//! Append-only string tables for shader defines and layers.
//!
//! An index, once assigned to a name, stays assigned for the lifetime of the
//! table. Tables are small and capacity-bounded; running out of room is a
//! configuration error.

use std::collections::HashMap;

use crate::error::CapacityError;
use crate::types::AttributeSemantic;

/// Maximum number of distinct shader defines.
pub const MAX_SHADER_DEFINES: usize = 32;

/// Maximum number of distinct layers.
pub const MAX_LAYERS: usize = 64;

/// What a [`NameTable`] holds; selects the error reported on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    ShaderDefine,
    Layer,
}

/// Capacity-bounded, index-stable name table.
#[derive(Debug)]
pub struct NameTable {
    kind: NameKind,
    capacity: usize,
    names: Vec<String>,
}

impl NameTable {
    pub fn new(kind: NameKind, capacity: usize) -> Self {
        debug_assert!(capacity <= u8::MAX as usize + 1);
        Self {
            kind,
            capacity,
            names: Vec::new(),
        }
    }

    pub fn shader_defines() -> Self {
        Self::new(NameKind::ShaderDefine, MAX_SHADER_DEFINES)
    }

    pub fn layers() -> Self {
        Self::new(NameKind::Layer, MAX_LAYERS)
    }

    /// Index of `name`, assigning the next free index on first use.
    pub fn index_of(&mut self, name: &str) -> Result<u8, CapacityError> {
        if let Some(index) = self.names.iter().position(|n| n == name) {
            return Ok(index as u8);
        }

        if self.names.len() >= self.capacity {
            let name = name.to_string();
            let capacity = self.capacity;
            return Err(match self.kind {
                NameKind::ShaderDefine => CapacityError::ShaderDefinesExhausted { name, capacity },
                NameKind::Layer => CapacityError::LayersExhausted { name, capacity },
            });
        }

        self.names.push(name.to_string());
        Ok((self.names.len() - 1) as u8)
    }

    pub fn name(&self, index: u8) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Cache of `#define _HAS_ATTR<n>` blocks keyed by attribute set.
#[derive(Debug, Default)]
pub struct SemanticDefines {
    cache: HashMap<Vec<AttributeSemantic>, String>,
}

impl SemanticDefines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define block for `attributes`, built on first request.
    pub fn get(&mut self, attributes: &[AttributeSemantic]) -> &str {
        self.cache
            .entry(attributes.to_vec())
            .or_insert_with(|| {
                attributes
                    .iter()
                    .map(|a| format!("#define _HAS_ATTR{}\n", a.id()))
                    .collect()
            })
            .as_str()
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_stable() {
        let mut table = NameTable::shader_defines();
        assert_eq!(table.index_of("SKINNED").unwrap(), 0);
        assert_eq!(table.index_of("ALPHA_CUTOUT").unwrap(), 1);
        assert_eq!(table.index_of("SKINNED").unwrap(), 0);
        assert_eq!(table.name(1), Some("ALPHA_CUTOUT"));
        assert_eq!(table.name(2), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_shader_define_overflow() {
        let mut table = NameTable::shader_defines();
        for i in 0..MAX_SHADER_DEFINES {
            table.index_of(&format!("D{i}")).unwrap();
        }
        // Existing names still resolve when full
        assert_eq!(table.index_of("D3").unwrap(), 3);
        assert_eq!(
            table.index_of("ONE_TOO_MANY"),
            Err(CapacityError::ShaderDefinesExhausted {
                name: "ONE_TOO_MANY".into(),
                capacity: MAX_SHADER_DEFINES
            })
        );
    }

    #[test]
    fn test_layer_overflow_kind() {
        let mut table = NameTable::new(NameKind::Layer, 1);
        table.index_of("default").unwrap();
        assert!(matches!(
            table.index_of("water"),
            Err(CapacityError::LayersExhausted { .. })
        ));
    }

    #[test]
    fn test_semantic_defines() {
        let mut defines = SemanticDefines::new();
        let block = defines
            .get(&[AttributeSemantic::Position, AttributeSemantic::TexCoord0])
            .to_string();
        assert_eq!(block, "#define _HAS_ATTR0\n#define _HAS_ATTR8\n");

        defines.get(&[AttributeSemantic::Position, AttributeSemantic::TexCoord0]);
        assert_eq!(defines.cached(), 1);
        assert_eq!(defines.get(&[]), "");
    }
}
