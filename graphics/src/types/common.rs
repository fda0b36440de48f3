//! Common types shared across the graphics system.

use bitflags::bitflags;

/// Two-dimensional size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Rectangular region of the framebuffer that will be rendered to.
///
/// Origin is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Viewport covering a whole render target.
    pub fn full(size: Extent2d) -> Self {
        Self::new(0, 0, size.width, size.height)
    }
}

bitflags! {
    /// Flags applied when binding a framebuffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FramebufferFlags: u32 {
        /// The depth attachment is bound for reading only.
        const READONLY_DEPTH = 1 << 0;
        /// The depth attachment is bound for stencil reads only.
        const READONLY_STENCIL = 1 << 1;
        /// Attachments are sRGB encoded.
        const SRGB = 1 << 2;
    }
}

bitflags! {
    /// Attachments cleared by a clear command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}
