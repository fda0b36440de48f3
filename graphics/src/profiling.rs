//! Profiling support via Tracy.
//!
//! Re-exports CPU profiling from [`kiln_core::profiling`]. Enable the
//! `profiling` feature of this crate to turn the macros on:
//!
//! ```toml
//! [dependencies]
//! kiln-graphics = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! Stream profile blocks recorded with
//! [`DrawStream::begin_profile_block`](crate::stream::DrawStream::begin_profile_block)
//! carry a link id from [`create_link_id`] so the CPU scope of the job that
//! recorded them can be matched with their execution.

pub use kiln_core::profiling::*;
