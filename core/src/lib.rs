//! # Kiln Core
//!
//! Engine-agnostic utilities shared by the Kiln renderer crates:
//!
//! - [`pool`] - reuse-before-grow index allocation with generation counters
//! - [`profiling`] - Tracy instrumentation macros and profiler link ids

pub mod pool;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
