//! Shader program descriptors and vertex attribute semantics.

/// Meaning of a vertex attribute, used to build shader define blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AttributeSemantic {
    Position,
    Normal,
    Tangent,
    Bitangent,
    Color0,
    Color1,
    Indices,
    Weights,
    TexCoord0,
    TexCoord1,
    /// Per-instance attributes.
    Instance0,
    Instance1,
    Instance2,
}

impl AttributeSemantic {
    /// Stable numeric id used in generated `_HAS_ATTR<n>` defines.
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Everything needed to compile one shader program variant.
///
/// Two equal descriptors always produce the same program, which is what
/// program compilation is deduplicated by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProgramDesc {
    /// Debug label of the program.
    pub name: String,
    pub vertex_source: String,
    pub fragment_source: String,
    /// Bitmask of enabled shader defines, by define index.
    pub defines: u32,
    /// Vertex attributes the program is compiled against.
    pub attributes: Vec<AttributeSemantic>,
}

impl ProgramDesc {
    pub fn new(
        name: impl Into<String>,
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            ..Self::default()
        }
    }

    /// Enable the shader define with the given index.
    pub fn with_define(mut self, define_index: u8) -> Self {
        self.defines |= 1 << define_index;
        self
    }

    pub fn with_attributes(mut self, attributes: &[AttributeSemantic]) -> Self {
        self.attributes = attributes.to_vec();
        self
    }
}
