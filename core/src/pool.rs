//! Dense index allocation with reuse-before-grow semantics.
//!
//! [`IndexPool`] hands out `u32` indices from a bounded space. Freed indices go
//! onto a LIFO free list and are always reissued before the high-water mark
//! grows, which keeps the live set compact and makes reuse deterministic.
//!
//! Every slot also carries an 8-bit generation that is bumped on free. Handle
//! types built on top of the pool pack `(index, generation)` together so that a
//! stale handle can be told apart from a reissued one in debug validation.
//!
//! # Example
//!
//! ```
//! use kiln_core::pool::IndexPool;
//!
//! let mut pool = IndexPool::new(2);
//! let a = pool.alloc().unwrap();
//! let b = pool.alloc().unwrap();
//! assert_ne!(a, b);
//! assert!(pool.alloc().is_none()); // exhausted
//!
//! pool.free(a);
//! assert_eq!(pool.alloc(), Some(a)); // reused before growing
//! ```

/// Bounded allocator of dense `u32` indices.
#[derive(Debug, Clone)]
pub struct IndexPool {
    capacity: u32,
    /// Indices below this value have been issued at least once.
    high_water: u32,
    /// Freed indices, reissued last-in first-out.
    free: Vec<u32>,
    /// Per-slot generation, bumped every time the slot is freed.
    generations: Vec<u8>,
    /// Per-slot liveness flag.
    live: Vec<bool>,
    live_count: u32,
}

impl IndexPool {
    /// Create a pool that can hold at most `capacity` live indices.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            high_water: 0,
            free: Vec::new(),
            generations: Vec::new(),
            live: Vec::new(),
            live_count: 0,
        }
    }

    /// Allocate an index.
    ///
    /// Returns `None` when `capacity` indices are already live.
    pub fn alloc(&mut self) -> Option<u32> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.high_water >= self.capacity {
                    log::debug!("IndexPool exhausted at capacity {}", self.capacity);
                    return None;
                }
                let index = self.high_water;
                self.high_water += 1;
                self.generations.push(0);
                self.live.push(false);
                index
            }
        };

        self.live[index as usize] = true;
        self.live_count += 1;
        Some(index)
    }

    /// Return an index to the pool.
    ///
    /// Returns `false` (and does nothing) if the index is not currently live,
    /// which catches double frees.
    pub fn free(&mut self, index: u32) -> bool {
        if !self.is_live(index) {
            log::warn!("IndexPool: free of index {} that is not live", index);
            return false;
        }

        let slot = index as usize;
        self.live[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.live_count -= 1;
        self.free.push(index);
        true
    }

    /// Check whether an index is currently allocated.
    pub fn is_live(&self, index: u32) -> bool {
        self.live.get(index as usize).copied().unwrap_or(false)
    }

    /// Current generation of a slot (0 for slots never issued).
    pub fn generation(&self, index: u32) -> u8 {
        self.generations.get(index as usize).copied().unwrap_or(0)
    }

    /// Number of live indices.
    pub fn live_count(&self) -> u32 {
        self.live_count
    }

    /// Maximum number of simultaneously live indices.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of distinct indices issued so far.
    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Iterate over all live indices in ascending order.
    pub fn iter_live(&self) -> impl Iterator<Item = u32> + '_ {
        self.live
            .iter()
            .enumerate()
            .filter(|(_, live)| **live)
            .map(|(index, _)| index as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_dense() {
        let mut pool = IndexPool::new(8);
        assert_eq!(pool.alloc(), Some(0));
        assert_eq!(pool.alloc(), Some(1));
        assert_eq!(pool.alloc(), Some(2));
        assert_eq!(pool.live_count(), 3);
        assert_eq!(pool.high_water(), 3);
    }

    #[test]
    fn test_exhaustion() {
        let mut pool = IndexPool::new(4);
        let issued: Vec<u32> = (0..4).map(|_| pool.alloc().unwrap()).collect();
        assert_eq!(issued, vec![0, 1, 2, 3]);
        assert!(pool.alloc().is_none());
        assert_eq!(pool.live_count(), 4);
    }

    #[test]
    fn test_reuse_before_grow() {
        let mut pool = IndexPool::new(16);
        for _ in 0..4 {
            pool.alloc();
        }
        pool.free(1);
        pool.free(3);

        // LIFO: most recently freed first, then the high-water mark grows
        assert_eq!(pool.alloc(), Some(3));
        assert_eq!(pool.alloc(), Some(1));
        assert_eq!(pool.alloc(), Some(4));
        assert_eq!(pool.high_water(), 5);
    }

    #[test]
    fn test_double_free_is_rejected() {
        let mut pool = IndexPool::new(4);
        let index = pool.alloc().unwrap();
        assert!(pool.free(index));
        assert!(!pool.free(index));
        assert!(!pool.free(42));
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_generation_bumps_on_free() {
        let mut pool = IndexPool::new(4);
        let index = pool.alloc().unwrap();
        assert_eq!(pool.generation(index), 0);

        pool.free(index);
        assert_eq!(pool.generation(index), 1);

        let again = pool.alloc().unwrap();
        assert_eq!(again, index);
        assert_eq!(pool.generation(again), 1);
    }

    #[test]
    fn test_iter_live() {
        let mut pool = IndexPool::new(8);
        for _ in 0..5 {
            pool.alloc();
        }
        pool.free(0);
        pool.free(2);
        assert_eq!(pool.iter_live().collect::<Vec<_>>(), vec![1, 3, 4]);
    }

    #[test]
    fn test_zero_capacity() {
        let mut pool = IndexPool::new(0);
        assert!(pool.alloc().is_none());
        assert!(!pool.is_live(0));
    }
}
