//! Profiling support via Tracy.
//!
//! Optional CPU instrumentation using the [Tracy profiler](https://github.com/wolfpld/tracy),
//! enabled through the `profiling` Cargo feature. With the feature disabled every
//! macro below compiles to nothing.
//!
//! ```ignore
//! use kiln_core::profiling::{profile_scope, profile_function};
//!
//! fn record_shadows() {
//!     profile_function!();
//!
//!     {
//!         profile_scope!("cull");
//!         // ...
//!     }
//! }
//! ```
//!
//! # Link ids
//!
//! Work that is recorded on one thread and executed on another (a job filling a
//! draw sub-stream, later replayed on the render thread) is correlated through a
//! link id. [`create_link_id`] mints a process-unique id; the recording side tags
//! its CPU scope with it and the stream stores it next to the matching profile
//! block so both timelines can be joined.

use std::sync::atomic::{AtomicI64, Ordering};

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, Span, frame_mark as tracy_frame_mark, plot as tracy_plot, span};

static NEXT_LINK_ID: AtomicI64 = AtomicI64::new(1);

/// Mint a new, process-unique profiler link id.
///
/// Ids are strictly increasing and never zero.
pub fn create_link_id() -> i64 {
    NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Mark the end of a frame for Tracy's frame analysis.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Create a profiling span for the current scope.
///
/// The span ends when the scope exits. The name must be a string literal.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span for the entire function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a profiling span for function (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Create a profiling span with a runtime-determined name.
///
/// Heap-allocates the span name, so prefer [`profile_scope!`] for literals.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _profile_span = $crate::profiling::Client::running()
            .map(|c| c.span_alloc(Some($name), "", file!(), line!(), 0));
    };
}

/// Create a profiling span with a dynamic name (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _ = $name;
    };
}

/// Plot a value over time in Tracy.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

/// Set the name of the current thread for Tracy.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! set_thread_name {
    ($name:expr) => {
        $crate::profiling::tracy_client::set_thread_name!($name)
    };
}

/// Set thread name (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! set_thread_name {
    ($name:expr) => {};
}

pub use frame_mark;
pub use profile_function;
pub use profile_plot;
pub use profile_scope;
pub use profile_scope_dynamic;
pub use set_thread_name;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        frame_mark!();
        profile_scope!("test_scope");
        profile_scope_dynamic!("dynamic_scope");
        profile_function!();
        profile_plot!("test_value", 42.0);
        set_thread_name!("test_thread");
    }

    #[test]
    fn test_link_ids_increase() {
        let a = create_link_id();
        let b = create_link_id();
        assert!(a > 0);
        assert!(b > a);
    }

    #[test]
    fn test_link_ids_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| create_link_id()).collect::<Vec<_>>()))
            .collect();

        let mut ids: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
