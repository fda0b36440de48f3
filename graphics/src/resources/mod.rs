//! Handle pools and per-frame allocators owned by the renderer.
//!
//! | Pool | Reuse policy |
//! |------|--------------|
//! | [`RenderBufferPool`] | frame-scoped handles, physical textures aliased first-fit |
//! | [`SortKeyPool`] | bounded, shared per hash, reuse before grow |
//! | [`NameTable`] | append-only, index-stable for the process lifetime |
//! | [`MaterialConstants`] | power-of-two size classes with free lists |
//! | [`UniformPool`] / [`TransientPool`] | linear, reset every frame |

mod material;
mod name_table;
mod renderbuffer;
mod sort_key;
mod transient;

pub use material::{MIN_CLASS_SIZE, MaterialConstants, MaterialIndex};
pub use name_table::{MAX_LAYERS, MAX_SHADER_DEFINES, NameKind, NameTable, SemanticDefines};
pub use renderbuffer::{
    INVALID_RENDERBUFFER, MAX_RENDERBUFFERS, RenderBufferDesc, RenderBufferHandle,
    RenderBufferPool,
};
pub use sort_key::{SortKey, SortKeyPool};
pub use transient::{LinearPool, LinearPoolDesc, TransientPool, TransientSlice, UniformPool};
