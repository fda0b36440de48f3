//! Common types and descriptors shared by the scheduling core and the device boundary.
//!
//! This module contains format enums, flag sets, descriptor structs and the
//! opaque device handle types.

mod buffer;
mod common;
mod handles;
mod program;
mod texture;

pub use buffer::{BufferDescriptor, BufferFlags};
pub use common::{ClearFlags, Extent2d, FramebufferFlags, Viewport};
pub use handles::{BufferHandle, ProgramHandle, TextureHandle};
pub use program::{AttributeSemantic, ProgramDesc};
pub use texture::{TextureDescriptor, TextureFlags, TextureFormat};
