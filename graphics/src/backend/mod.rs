//! GPU device boundary.
//!
//! The scheduling core talks to the GPU exclusively through [`GpuDevice`]: it
//! creates and destroys opaque resources and hands finalized
//! [`MergedStream`]s over for execution. It never inspects backend state.
//!
//! # Contract
//!
//! - A resource is created before the first merged stream that references it
//!   is executed.
//! - A resource is not destroyed while an unexecuted stream still references
//!   it. The renderer guarantees this by deferring destruction past the frames
//!   in flight.
//!
//! # Available Backends
//!
//! - [`DummyDevice`]: no GPU work, records every call for inspection in tests.

pub mod dummy;

pub use dummy::DummyDevice;

use crate::error::DeviceError;
use crate::stream::MergedStream;
use crate::types::{BufferDescriptor, BufferHandle, ProgramDesc, ProgramHandle, TextureDescriptor, TextureHandle};

/// Opaque, handle-based GPU device.
///
/// Implementations must be callable from the logic thread (resource creation)
/// and the render thread (execution) at the same time.
pub trait GpuDevice: Send + Sync + 'static {
    /// Human readable backend name.
    fn name(&self) -> &'static str;

    /// Create a buffer, optionally filled with initial data.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        data: Option<&[u8]>,
    ) -> Result<BufferHandle, DeviceError>;

    fn destroy_buffer(&self, buffer: BufferHandle);

    /// Create a texture, optionally filled with initial data for the top mip.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<TextureHandle, DeviceError>;

    fn destroy_texture(&self, texture: TextureHandle);

    /// Compile a shader program.
    fn create_program(&self, descriptor: &ProgramDesc) -> Result<ProgramHandle, DeviceError>;

    /// Translate and execute one frame's merged command stream.
    fn execute(&self, stream: &MergedStream) -> Result<(), DeviceError>;
}
