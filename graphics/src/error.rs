//! Graphics error types.
//!
//! Every failure at this layer is a programming or configuration error. Pools and
//! streams report them as values; the [`Renderer`](crate::Renderer) decides
//! whether to stop hard or degrade according to its
//! [`CapacityPolicy`](crate::config::CapacityPolicy).

use thiserror::Error;

/// A fixed-capacity resource space ran out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("sort key pool exhausted (capacity {capacity})")]
    SortKeysExhausted { capacity: u32 },
    #[error("shader define table full (capacity {capacity}) while adding `{name}`")]
    ShaderDefinesExhausted { name: String, capacity: usize },
    #[error("layer table full (capacity {capacity}) while adding `{name}`")]
    LayersExhausted { name: String, capacity: usize },
    #[error("{pool} pool exhausted: requested {requested} bytes, {remaining} remaining")]
    TransientPoolExhausted {
        pool: &'static str,
        requested: u32,
        remaining: u32,
    },
    #[error("material uniform buffer exhausted: requested {requested} bytes")]
    MaterialBufferExhausted { requested: u32 },
    #[error("renderbuffer table exhausted (capacity {capacity})")]
    RenderbuffersExhausted { capacity: u32 },
    #[error("stream scratch memory exhausted: requested {requested} bytes with {used} in use")]
    ScratchExhausted { requested: usize, used: usize },
}

/// A draw stream is malformed and cannot be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("draw stream has {open} unclosed profile block(s), innermost `{innermost}`")]
    UnbalancedProfileBlocks { open: usize, innermost: &'static str },
    #[error("end_profile_block called without a matching begin_profile_block")]
    UnmatchedEndProfileBlock,
    #[error("sub-stream is still being recorded at finalize")]
    SubstreamStillRecording,
}

/// A handle was used outside of its valid lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("renderbuffer handle {0:#x} is stale or was never created")]
    StaleRenderbuffer(u32),
    #[error("material slot {0} is not live")]
    InvalidMaterial(u32),
    #[error(
        "material write of {len} bytes at offset {offset} exceeds reserved size {reserved}"
    )]
    MaterialWriteOutOfBounds { offset: u32, len: u32, reserved: u32 },
    #[error("transient slice from generation {slice} used in generation {current}")]
    StaleTransientSlice { slice: u32, current: u32 },
    #[error("transient write of {len} bytes at offset {offset} exceeds slice size {size}")]
    TransientWriteOutOfBounds { offset: u32, len: u32, size: u32 },
}

/// Failure reported by the GPU device boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("out of GPU memory")]
    OutOfMemory,
}

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Handle(#[from] HandleError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("invalid renderer configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(String),
}
