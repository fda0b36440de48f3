//! Buffer flags and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Creation flags for device buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u32 {
        /// Buffer is bound as a uniform block.
        const UNIFORM_BUFFER = 1 << 0;
        /// Buffer is bound as a shader storage buffer.
        const SHADER_BUFFER = 1 << 1;
        /// Buffer contents are rewritten from the CPU every frame.
        const MAPPABLE = 1 << 2;
        /// Buffer is read by indirect draw/dispatch calls.
        const INDIRECT = 1 << 3;
    }
}

impl Default for BufferFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u32,
    /// Creation flags.
    pub flags: BufferFlags,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u32, flags: BufferFlags) -> Self {
        Self {
            label: None,
            size,
            flags,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_descriptor() {
        let desc = BufferDescriptor::new(256, BufferFlags::UNIFORM_BUFFER).with_label("materials");
        assert_eq!(desc.size, 256);
        assert!(desc.flags.contains(BufferFlags::UNIFORM_BUFFER));
        assert_eq!(desc.label.as_deref(), Some("materials"));
    }
}
