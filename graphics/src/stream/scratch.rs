//! Stream-owned scratch memory.
//!
//! Every [`DrawStream`](super::DrawStream) owns one [`ScratchArena`]. Allocations
//! are bump-allocated and never freed individually; the whole arena goes away
//! with the stream (or with the [`MergedStream`](super::MergedStream) it was
//! merged into). Allocations are addressed by offset, so they stay valid while
//! the arena grows. Offsets are 32-bit, which bounds one arena to 4 GiB.

use crate::error::CapacityError;

/// Alignment of every scratch allocation.
pub const SCRATCH_ALIGNMENT: u32 = 16;

/// A region inside a [`ScratchArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScratchSpan {
    pub offset: u32,
    pub len: u32,
}

impl ScratchSpan {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..(self.offset + self.len) as usize
    }
}

/// Bump allocator backing a stream's user allocations.
#[derive(Debug, Default)]
pub struct ScratchArena {
    bytes: Vec<u8>,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `size` zeroed bytes.
    pub fn alloc(&mut self, size: u32) -> Result<ScratchSpan, CapacityError> {
        self.reserve(size as usize)
    }

    /// Reserve space for `data` and copy it in.
    pub fn copy(&mut self, data: &[u8]) -> Result<ScratchSpan, CapacityError> {
        let span = self.reserve(data.len())?;
        self.bytes[span.range()].copy_from_slice(data);
        Ok(span)
    }

    fn reserve(&mut self, size: usize) -> Result<ScratchSpan, CapacityError> {
        let exhausted = || CapacityError::ScratchExhausted {
            requested: size,
            used: self.bytes.len(),
        };
        let offset = align_up(self.bytes.len(), SCRATCH_ALIGNMENT as usize);
        let end = offset.checked_add(size).ok_or_else(exhausted)?;
        let (Ok(offset), Ok(len), Ok(_)) = (
            u32::try_from(offset),
            u32::try_from(size),
            u32::try_from(end),
        ) else {
            return Err(exhausted());
        };

        self.bytes.resize(end, 0);
        Ok(ScratchSpan { offset, len })
    }

    /// Bytes of an allocation.
    ///
    /// # Panics
    ///
    /// Panics if the span does not belong to this arena.
    pub fn get(&self, span: ScratchSpan) -> &[u8] {
        &self.bytes[span.range()]
    }

    /// Mutable bytes of an allocation.
    pub fn get_mut(&mut self, span: ScratchSpan) -> &mut [u8] {
        &mut self.bytes[span.range()]
    }

    /// Total bytes used, including alignment padding.
    pub fn used(&self) -> usize {
        self.bytes.len()
    }
}

#[inline]
fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}
