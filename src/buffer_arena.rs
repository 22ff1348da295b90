//! Per-frame transient buffer sub-allocator.
//!
//! Backed by one persistently-mapped upload-heap buffer per frame in
//! flight. Allocation is a lock-free CAS loop on a bump cursor: load `at`,
//! compute the aligned offset from that load, and CAS `at` from the old
//! value to `aligned_offset + size`, retrying on contention rather than
//! restarting from zero. The arena is reset by the
//! frame scheduler exactly once per frame, after the GPU has finished with
//! that frame's transient data — never concurrently with an in-flight
//! `alloc`.

use std::sync::atomic::{AtomicU32, Ordering};

/// One sub-allocation out of a [`BufferArena`].
#[derive(Copy, Clone, Debug)]
pub struct BufferAllocation {
    /// Byte offset of the allocation within the arena's backing buffer.
    pub offset: u32,
    pub size: u32,
}

fn align_up(value: u32, alignment: u32) -> Option<u32> {
    debug_assert!(alignment.is_power_of_two());
    value.checked_add(alignment - 1).map(|v| v & !(alignment - 1))
}

/// A lock-free bump allocator over one frame's transient buffer.
pub struct BufferArena {
    capacity: u32,
    at: AtomicU32,
}

impl BufferArena {
    pub fn new(capacity: u32) -> Self {
        BufferArena {
            capacity,
            at: AtomicU32::new(0),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Sub-allocates `size` bytes aligned to `alignment`. Returns `None` on
    /// overflow; callers treat this as a (debug) assertion failure, since
    /// arenas are sized so this shouldn't happen in normal operation.
    pub fn alloc(&self, size: u32, alignment: u32) -> Option<BufferAllocation> {
        let mut current = self.at.load(Ordering::Acquire);
        loop {
            let aligned = align_up(current, alignment)?;
            let end = aligned.checked_add(size)?;
            if end > self.capacity {
                return None;
            }
            match self.at.compare_exchange_weak(
                current,
                end,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(BufferAllocation { offset: aligned, size }),
                Err(observed) => current = observed,
            }
        }
    }

    /// Number of bytes allocated since the last reset.
    pub fn used(&self) -> u32 {
        self.at.load(Ordering::Acquire)
    }

    /// Reclaims the whole arena. Called once per frame by the frame
    /// scheduler, after the GPU has retired the frame that last used this
    /// arena's backing buffer. Not safe to call concurrently with `alloc`.
    pub fn reset(&mut self) {
        *self.at.get_mut() = 0;
    }
}
