//! # Kiln Graphics
//!
//! Frame-pipelined render command scheduling.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`DrawStream`] - Command recording with sub-streams that are spliced back
//!   at their creation point, whichever thread records them
//! - [`Renderer`] - The frame loop: setup barriers, job completion, stream
//!   merge and hand-off to execution
//! - [`resources`] - Handle pools for renderbuffers, sort keys, shader
//!   defines, layers, material constants and per-frame transient memory
//! - [`plugin`] - Render plugins dispatched at fixed pipeline stages
//! - [`backend`] - The [`GpuDevice`] boundary and a [`DummyDevice`] for tests
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use kiln_graphics::{DummyDevice, Renderer, RendererConfig};
//!
//! let device = Arc::new(DummyDevice::new());
//! let mut renderer = Renderer::new(device.clone(), RendererConfig::default()).unwrap();
//!
//! for _ in 0..3 {
//!     renderer.wait_can_setup();
//!     renderer.push_job(Some("opaque"), |stream| stream.draw_arrays(0, 3));
//!     renderer.frame();
//! }
//! assert_eq!(device.executed_frames(), 3);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod jobs;
pub mod plugin;
pub mod profiling;
pub mod renderer;
pub mod resources;
pub mod scheduler;
pub mod stream;
pub mod types;

// Re-export main types for convenience
pub use backend::{DummyDevice, GpuDevice};
pub use config::{CapacityPolicy, ExecutionMode, RendererConfig};
pub use error::{CapacityError, DeviceError, GraphicsError, HandleError, StreamError};
pub use plugin::{Pipeline, PipelineContext, PluginStage, RenderPlugin};
pub use renderer::Renderer;
pub use resources::{
    INVALID_RENDERBUFFER, MaterialIndex, RenderBufferDesc, RenderBufferHandle, SortKey,
    TransientSlice,
};
pub use stream::{DrawCommand, DrawStream, MemRef, MergedStream, Substream};
pub use types::{
    BufferDescriptor, BufferFlags, BufferHandle, ProgramDesc, ProgramHandle, TextureDescriptor,
    TextureFlags, TextureFormat, TextureHandle, Viewport,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
pub fn init() {
    log::info!("Kiln Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_device() {
        let device = DummyDevice::new();
        assert_eq!(device.name(), "Dummy");
    }
}
