//! Command records stored in a [`DrawStream`](super::DrawStream).

use crate::types::{
    BufferHandle, ClearFlags, FramebufferFlags, ProgramHandle, TextureHandle, Viewport,
};

use super::{MemorySlot, ScratchSpan};

/// Maximum number of color attachments in one framebuffer.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// A single recorded GPU command.
///
/// Commands only reference device objects through opaque handles. Variable-size
/// payloads (buffer updates) live in the owning stream's scratch memory and are
/// referenced through a [`ScratchSpan`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    /// Bind color and depth attachments.
    SetFramebuffer {
        attachments: [TextureHandle; MAX_COLOR_ATTACHMENTS],
        count: u8,
        depth: TextureHandle,
        flags: FramebufferFlags,
    },
    Viewport(Viewport),
    Clear {
        flags: ClearFlags,
        color: [f32; 4],
        depth: f32,
        stencil: u8,
    },
    UseProgram(ProgramHandle),
    BindUniformBuffer {
        slot: u32,
        buffer: BufferHandle,
        offset: u32,
        size: u32,
    },
    BindVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
        offset: u32,
        stride: u32,
    },
    BindIndexBuffer {
        buffer: BufferHandle,
        offset: u32,
    },
    BindTexture {
        slot: u32,
        texture: TextureHandle,
    },
    DrawArrays {
        first: u32,
        count: u32,
    },
    DrawIndexed {
        first: u32,
        count: u32,
        instances: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    /// Copy scratch bytes into a device buffer at `offset`.
    UpdateBuffer {
        buffer: BufferHandle,
        offset: u32,
        data: ScratchSpan,
    },
    /// Copy a [`MemRef`](super::MemRef) owned by the stream into a device buffer.
    UploadMemory {
        buffer: BufferHandle,
        offset: u32,
        memory: MemorySlot,
    },
    BeginProfileBlock {
        name: &'static str,
        link: i64,
        stats: bool,
    },
    EndProfileBlock,
}

impl DrawCommand {
    /// Build a framebuffer command from a list of color attachments.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_COLOR_ATTACHMENTS`] attachments are given.
    pub fn framebuffer(
        color: &[TextureHandle],
        depth: TextureHandle,
        flags: FramebufferFlags,
    ) -> Self {
        assert!(
            color.len() <= MAX_COLOR_ATTACHMENTS,
            "Too many color attachments: {} (max {})",
            color.len(),
            MAX_COLOR_ATTACHMENTS
        );

        let mut attachments = [TextureHandle::INVALID; MAX_COLOR_ATTACHMENTS];
        attachments[..color.len()].copy_from_slice(color);
        Self::SetFramebuffer {
            attachments,
            count: color.len() as u8,
            depth,
            flags,
        }
    }

    /// Whether this command opens or closes a profile block.
    pub fn is_profile_marker(&self) -> bool {
        matches!(
            self,
            Self::BeginProfileBlock { .. } | Self::EndProfileBlock
        )
    }
}
