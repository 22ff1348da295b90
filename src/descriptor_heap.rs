//! Shader-visible bindless descriptor heap.
//!
//! Every descriptor a shader can fetch through `ResourceDescriptorHeap[idx]`
//! lives in one heap, indexed by a plain `u32`. Index 0 is a reserved
//! null-descriptor sentinel, never allocated. The heap tracks exactly one
//! lifetime class: persistent allocation/free. A transient, bulk-released
//! variant isn't implemented here; every allocation in this heap is
//! persistent.
//!
//! Persistent indices partition `[1..capacity)` into three disjoint sets at
//! all times: `live`, `pending-free` (freed this frame or a recent one, not
//! yet safe to reuse), and `free`. Freeing never moves an index directly to
//! `free` — it tags it with the frame index it was freed in and waits for
//! [`DescriptorHeap::flush_pending_frees`] to confirm the GPU has moved past
//! that frame. The pending list is drained as a prefix in enqueue order,
//! since frame tags only ever increase.

use parking_lot::Mutex;
use std::collections::VecDeque;

struct Inner {
    /// Indices `[1..capacity)` not yet handed out, LIFO order.
    free: Vec<u32>,
    /// `(index, frame_index)` pairs freed but not yet safe to reuse.
    /// FIFO: flush drains a prefix, since frame tags only increase.
    pending: VecDeque<(u32, u64)>,
    live_count: u32,
}

/// A shader-visible bindless descriptor table.
pub struct DescriptorHeap {
    capacity: u32,
    inner: Mutex<Inner>,
}

impl DescriptorHeap {
    /// `capacity` includes the reserved null slot at index 0; the usable
    /// range is `[1..capacity)`.
    pub fn new(capacity: u32) -> Self {
        let free = (1..capacity).rev().collect();
        DescriptorHeap {
            capacity,
            inner: Mutex::new(Inner {
                free,
                pending: VecDeque::new(),
                live_count: 0,
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Allocates a persistent descriptor index. Returns `None` if the free
    /// list and the pending-free list are both exhausted; this is an
    /// out-of-capacity condition callers treat as fatal.
    pub fn alloc_persistent(&self) -> Option<u32> {
        let mut inner = self.inner.lock();
        let Some(index) = inner.free.pop() else {
            log::error!(
                "descriptor heap exhausted: capacity {} fully live or pending-free",
                self.capacity
            );
            return None;
        };
        inner.live_count += 1;
        Some(index)
    }

    /// Frees a persistent index. It does not become reallocatable until
    /// [`flush_pending_frees`](Self::flush_pending_frees) observes a
    /// completed frame at or past `frame_index`.
    pub fn free_persistent(&self, index: u32, frame_index: u64) {
        debug_assert!(index != 0 && index < self.capacity, "index out of range");
        let mut inner = self.inner.lock();
        inner.live_count -= 1;
        inner.pending.push_back((index, frame_index));
    }

    /// Moves every pending-free entry tagged with a frame at or before
    /// `completed_frame_index` into the real free list. Stops at the first
    /// entry still tagged with a later frame, since entries are enqueued in
    /// non-decreasing frame-tag order.
    pub fn flush_pending_frees(&self, completed_frame_index: u64) {
        let mut inner = self.inner.lock();
        let mut flushed = 0u32;
        while let Some(&(index, frame_index)) = inner.pending.front() {
            if frame_index > completed_frame_index {
                break;
            }
            inner.pending.pop_front();
            inner.free.push(index);
            flushed += 1;
        }
        if flushed > 0 {
            log::trace!("descriptor heap: flushed {flushed} pending frees through frame {completed_frame_index}");
        }
    }

    /// Number of indices available for immediate allocation.
    pub fn free_count(&self) -> u32 {
        self.inner.lock().free.len() as u32
    }

    /// Number of indices freed but still waiting on a GPU fence.
    pub fn pending_free_count(&self) -> u32 {
        self.inner.lock().pending.len() as u32
    }

    /// Number of indices currently handed out to callers.
    pub fn live_count(&self) -> u32 {
        self.inner.lock().live_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_index_is_never_allocated() {
        let heap = DescriptorHeap::new(4);
        for _ in 0..3 {
            assert_ne!(heap.alloc_persistent().unwrap(), 0);
        }
        assert!(heap.alloc_persistent().is_none());
    }

    #[test]
    fn freed_index_is_not_immediately_reusable() {
        let heap = DescriptorHeap::new(2);
        let a = heap.alloc_persistent().unwrap();
        heap.free_persistent(a, 10);
        assert_eq!(heap.free_count(), 0);
        assert_eq!(heap.pending_free_count(), 1);
    }

    #[test]
    fn flush_releases_only_completed_frames() {
        let heap = DescriptorHeap::new(2);
        let a = heap.alloc_persistent().unwrap();
        heap.free_persistent(a, 10);
        heap.flush_pending_frees(9);
        assert_eq!(heap.pending_free_count(), 1);
        heap.flush_pending_frees(10);
        assert_eq!(heap.pending_free_count(), 0);
        assert_eq!(heap.free_count(), 1);
    }

    #[test]
    fn sets_partition_the_capacity_range() {
        let heap = DescriptorHeap::new(100);
        let mut live = Vec::new();
        for _ in 0..50 {
            live.push(heap.alloc_persistent().unwrap());
        }
        for (frame, &index) in live.iter().enumerate() {
            heap.free_persistent(index, frame as u64);
        }
        heap.flush_pending_frees(20);
        let total =
            heap.free_count() + heap.pending_free_count() + heap.live_count();
        assert_eq!(total, 99);
    }

    proptest::proptest! {
        #[test]
        fn stress_never_double_allocates(ops in proptest::collection::vec(0u8..3, 0..500)) {
            let heap = DescriptorHeap::new(64);
            let mut live: Vec<u32> = Vec::new();
            let mut frame = 0u64;
            for op in ops {
                match op {
                    0 => {
                        if let Some(idx) = heap.alloc_persistent() {
                            proptest::prop_assert!(!live.contains(&idx));
                            live.push(idx);
                        }
                    }
                    1 => {
                        if !live.is_empty() {
                            let idx = live.remove(0);
                            heap.free_persistent(idx, frame);
                        }
                    }
                    _ => {
                        frame += 1;
                        heap.flush_pending_frees(frame);
                    }
                }
                let total = heap.free_count() + heap.pending_free_count() + heap.live_count();
                proptest::prop_assert_eq!(total, 63);
            }
        }
    }
}
