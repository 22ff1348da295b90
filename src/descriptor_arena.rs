//! Non-shader-visible descriptor arena.
//!
//! Used for staging descriptors (RTVs, DSVs, and CPU-only copy sources)
//! that never need bindless indices. There is no per-descriptor free: the
//! whole arena resets at once, once per frame, after the frame's fence has
//! retired. This mirrors the CPU-visible descriptor heaps in the underlying
//! API, which are populated fresh every frame and never partially reclaimed.

use crate::error::RhiError;

/// A monotonic bump allocator over a fixed range of descriptor indices.
pub struct DescriptorArena {
    capacity: u32,
    at: u32,
}

impl DescriptorArena {
    pub fn new(capacity: u32) -> Self {
        DescriptorArena { capacity, at: 0 }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of descriptors allocated since the last reset.
    pub fn len(&self) -> u32 {
        self.at
    }

    pub fn is_empty(&self) -> bool {
        self.at == 0
    }

    /// Allocates a single descriptor index.
    pub fn allocate(&mut self) -> Result<u32, RhiError> {
        self.allocate_range(1)
    }

    /// Allocates `count` contiguous descriptor indices. Fails if the arena
    /// would overflow its capacity.
    pub fn allocate_range(&mut self, count: u32) -> Result<u32, RhiError> {
        let base = self.at;
        let end = base
            .checked_add(count)
            .filter(|&end| end <= self.capacity)
            .ok_or(RhiError::OutOfCapacity {
                subsystem: "DescriptorArena",
                capacity: self.capacity,
            })?;
        self.at = end;
        Ok(base)
    }

    /// Resets the whole arena. Called once per frame, after the frame that
    /// last referenced these descriptors has retired.
    pub fn reset(&mut self) {
        self.at = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_contiguous_and_bump_forward() {
        let mut arena = DescriptorArena::new(16);
        assert_eq!(arena.allocate_range(4).unwrap(), 0);
        assert_eq!(arena.allocate_range(4).unwrap(), 4);
        assert_eq!(arena.len(), 8);
    }

    #[test]
    fn single_allocate_advances_by_one() {
        let mut arena = DescriptorArena::new(4);
        assert_eq!(arena.allocate().unwrap(), 0);
        assert_eq!(arena.allocate().unwrap(), 1);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn allocation_past_capacity_fails() {
        let mut arena = DescriptorArena::new(4);
        assert!(arena.allocate_range(4).is_ok());
        assert!(arena.allocate().is_err());
    }

    #[test]
    fn reset_reclaims_whole_arena() {
        let mut arena = DescriptorArena::new(4);
        arena.allocate_range(4).unwrap();
        arena.reset();
        assert_eq!(arena.len(), 0);
        assert_eq!(arena.allocate_range(4).unwrap(), 0);
    }
}
