//! Texture formats, flags and descriptors.

use bitflags::bitflags;

use super::Extent2d;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 32-bit red channel, float.
    R32Float,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 11/11/10-bit packed float.
    Rg11b10Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32Float)
    }

    /// Returns the size in bytes per pixel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R32Float
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Rg11b10Float
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Creation flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        /// Texture can be bound as a framebuffer attachment.
        const RENDER_TARGET = 1 << 0;
        /// Texture has a single mip level.
        const NO_MIPS = 1 << 1;
        /// Texture is writable from compute shaders.
        const COMPUTE_WRITE = 1 << 2;
        /// Texture is sampled as sRGB.
        const SRGB = 1 << 3;
        /// Texture can be read back to the CPU.
        const READBACK = 1 << 4;
        /// Texture is a 3D volume.
        const IS_3D = 1 << 5;
    }
}

impl Default for TextureFlags {
    /// Render targets without mips, the common case for transient buffers.
    fn default() -> Self {
        Self::RENDER_TARGET | Self::NO_MIPS
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Width and height in pixels.
    pub size: Extent2d,
    /// Depth (1 for 2D textures).
    pub depth: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Creation flags.
    pub flags: TextureFlags,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, flags: TextureFlags) -> Self {
        Self {
            label: None,
            size: Extent2d::new(width, height),
            depth: 1,
            format,
            flags,
        }
    }

    /// Set the depth (layer count or volume depth).
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Size in bytes of the top mip level.
    pub fn byte_size(&self) -> u64 {
        self.size.width as u64 * self.size.height as u64 * self.depth as u64
            * self.format.block_size() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_formats() {
        assert!(TextureFormat::Depth32Float.is_depth_stencil());
        assert!(!TextureFormat::Rgba16Float.is_depth_stencil());
    }

    #[test]
    fn test_default_flags() {
        let flags = TextureFlags::default();
        assert!(flags.contains(TextureFlags::RENDER_TARGET));
        assert!(flags.contains(TextureFlags::NO_MIPS));
    }

    #[test]
    fn test_byte_size() {
        let desc = TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba16Float, TextureFlags::empty());
        assert_eq!(desc.byte_size(), 128);
    }
}
