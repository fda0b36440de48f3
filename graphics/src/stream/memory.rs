//! CPU memory handed over for uploads executed with a frame.
//!
//! A [`MemRef`] is either owned (allocated or copied through the
//! [`Renderer`](crate::Renderer)) or a view of `'static` data. Recording an
//! upload moves the `MemRef` into the [`DrawStream`](super::DrawStream); from
//! there it travels with the frame's [`MergedStream`](super::MergedStream) and
//! is released when that stream is dropped after execution.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
enum Bytes {
    Owned(Box<[u8]>),
    Static(&'static [u8]),
}

/// Index of a [`MemRef`] attached to the stream that recorded a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemorySlot(pub(super) u32);

/// A block of upload memory.
#[derive(Debug)]
pub struct MemRef {
    bytes: Bytes,
    /// Live-byte counter of the renderer that allocated the block.
    tracker: Option<Arc<AtomicUsize>>,
}

impl MemRef {
    /// Reference `'static` data without copying or owning it.
    pub fn from_static(data: &'static [u8]) -> Self {
        Self {
            bytes: Bytes::Static(data),
            tracker: None,
        }
    }

    pub(crate) fn owned(bytes: Box<[u8]>, tracker: &Arc<AtomicUsize>) -> Self {
        tracker.fetch_add(bytes.len(), Ordering::AcqRel);
        Self {
            bytes: Bytes::Owned(bytes),
            tracker: Some(Arc::clone(tracker)),
        }
    }

    /// Whether the block is owned, as opposed to borrowed `'static` data.
    pub fn is_owned(&self) -> bool {
        matches!(self.bytes, Bytes::Owned(_))
    }

    /// Writable view of owned memory; `None` for `'static` data.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match &mut self.bytes {
            Bytes::Owned(bytes) => Some(bytes),
            Bytes::Static(_) => None,
        }
    }
}

impl Deref for MemRef {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.bytes {
            Bytes::Owned(bytes) => bytes,
            Bytes::Static(bytes) => bytes,
        }
    }
}

impl Drop for MemRef {
    fn drop(&mut self) {
        if let (Some(tracker), Bytes::Owned(bytes)) = (&self.tracker, &self.bytes) {
            tracker.fetch_sub(bytes.len(), Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_memory_is_tracked_until_dropped() {
        let tracker = Arc::new(AtomicUsize::new(0));
        let mut memory = MemRef::owned(vec![0; 12].into_boxed_slice(), &tracker);
        assert!(memory.is_owned());
        assert_eq!(tracker.load(Ordering::Acquire), 12);

        memory.as_mut_slice().unwrap()[0] = 5;
        assert_eq!(memory[0], 5);

        drop(memory);
        assert_eq!(tracker.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_static_memory_is_read_only() {
        static DATA: [u8; 3] = [1, 2, 3];
        let mut memory = MemRef::from_static(&DATA);
        assert!(!memory.is_owned());
        assert!(memory.as_mut_slice().is_none());
        assert_eq!(&*memory, &[1, 2, 3]);
    }
}
