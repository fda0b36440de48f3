//! Opaque handles issued by the GPU device.
//!
//! The scheduling core never inspects these beyond equality; their values are
//! chosen by the [`GpuDevice`](crate::backend::GpuDevice) implementation.

use static_assertions::assert_eq_size;

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel for "no resource".
            pub const INVALID: Self = Self(u32::MAX);

            /// Wrap a raw device value.
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw device value.
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Check whether this is a real resource.
            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }
    };
}

device_handle!(
    /// Handle to a device buffer.
    BufferHandle
);
device_handle!(
    /// Handle to a device texture.
    TextureHandle
);
device_handle!(
    /// Handle to a compiled shader program.
    ProgramHandle
);

assert_eq_size!(BufferHandle, u32);
assert_eq_size!(TextureHandle, u32);
assert_eq_size!(ProgramHandle, u32);
