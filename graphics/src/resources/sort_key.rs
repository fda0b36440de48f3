//! Bounded space of draw-call sort keys.
//!
//! Keys are dense indices from a [`IndexPool`] so they can be used directly to
//! bucket draw calls. Every live key is distinct. The caller hash (typically of
//! the material and shader) only seeds the allocation and is kept for
//! diagnostics. Freed keys are reissued before the pool grows.

use kiln_core::pool::IndexPool;

use crate::error::CapacityError;

/// A draw-call sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SortKey(u32);

static_assertions::assert_eq_size!(SortKey, u32);

impl SortKey {
    /// Returned instead of a key when the pool is exhausted and the renderer
    /// degrades gracefully.
    pub const INVALID: Self = Self(u32::MAX);

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Allocator of unique sort keys.
#[derive(Debug)]
pub struct SortKeyPool {
    indices: IndexPool,
    hashes: Vec<u64>,
}

impl SortKeyPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            indices: IndexPool::new(capacity),
            hashes: Vec::new(),
        }
    }

    /// Allocate a fresh key for the state identified by `hash`.
    pub fn alloc(&mut self, hash: u64) -> Result<SortKey, CapacityError> {
        let index = self
            .indices
            .alloc()
            .ok_or(CapacityError::SortKeysExhausted {
                capacity: self.indices.capacity(),
            })?;

        let slot = index as usize;
        if self.hashes.len() <= slot {
            self.hashes.resize(slot + 1, 0);
        }
        self.hashes[slot] = hash;
        Ok(SortKey(index))
    }

    /// Return `key` to the pool. Returns `false` if the key is not live.
    pub fn free(&mut self, key: SortKey) -> bool {
        if !self.indices.is_live(key.0) {
            log::warn!("Freeing sort key {} which is not live", key.0);
            return false;
        }
        self.indices.free(key.0)
    }

    /// Hash a live key was allocated for.
    pub fn hash(&self, key: SortKey) -> Option<u64> {
        self.is_live(key).then(|| self.hashes[key.0 as usize])
    }

    /// One past the largest key value handed out so far.
    pub fn max_sort_key(&self) -> u32 {
        self.indices.high_water()
    }

    /// Upper bound (exclusive) of key values.
    pub fn capacity(&self) -> u32 {
        self.indices.capacity()
    }

    /// Number of live keys.
    pub fn live_count(&self) -> u32 {
        self.indices.live_count()
    }

    pub fn is_live(&self, key: SortKey) -> bool {
        self.indices.is_live(key.0)
    }
}
