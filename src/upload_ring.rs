//! Asynchronous copy-queue upload ring.
//!
//! Stages data into GPU-only resources over a dedicated copy queue without
//! stalling the graphics queue. A power-of-two mapped byte ring is shared by
//! a bounded number of in-flight submissions; producers on any thread call
//! [`UploadRing::upload_begin`] to reserve a contiguous byte range and
//! [`UploadRing::upload_end`] to hand it off to the copy queue.
//!
//! One mutex guards both the byte-ring counters (`head`/`tail`) and the
//! submission-ring counters (`submission_head`/`submission_tail`): the
//! critical section is short and the contiguous-bytes check is subtle
//! enough that a lock-free version isn't worth the risk here. Blocking on a
//! fence happens with the lock held —
//! other producers also block, which is the documented tradeoff, not a bug.

use crate::device::{GpuDevice, Queue};
use parking_lot::Mutex;
use std::sync::Arc;

fn align_up(value: u64, alignment: u32) -> u64 {
    let alignment = alignment as u64;
    (value + alignment - 1) & !(alignment - 1)
}

#[derive(Copy, Clone)]
struct Submission {
    /// Monotonic (unmasked) byte offset at which this submission starts.
    logical_offset: u64,
    size: u32,
    fence_value: u64,
}

struct Inner {
    /// Monotonic byte cursors; physical ring offset is `value & (capacity-1)`.
    head: u64,
    tail: u64,
    /// Fixed-size ring of submission slots, indexed by counter % capacity.
    submissions: Vec<Option<Submission>>,
    submission_head: u64,
    submission_tail: u64,
}

/// A context returned by [`UploadRing::upload_begin`], naming the reserved
/// byte range the caller should memcpy staging data into.
pub struct UploadContext {
    /// Physical byte offset into the ring's mapped buffer.
    pub offset: u32,
    pub size: u32,
    logical_offset: u64,
}

/// The asynchronous staging ring.
pub struct UploadRing<D: GpuDevice> {
    device: Arc<D>,
    capacity: u32,
    max_submissions: u32,
    inner: Mutex<Inner>,
}

impl<D: GpuDevice> UploadRing<D> {
    /// `capacity` and `max_submissions` must both be powers of two, matching
    /// `RhiConfig::upload_ring_capacity`/`upload_max_submissions`.
    pub fn new(device: Arc<D>, capacity: u32, max_submissions: u32) -> Self {
        debug_assert!(capacity.is_power_of_two());
        debug_assert!(max_submissions.is_power_of_two());
        UploadRing {
            device,
            capacity,
            max_submissions,
            inner: Mutex::new(Inner {
                head: 0,
                tail: 0,
                submissions: vec![None; max_submissions as usize],
                submission_head: 0,
                submission_tail: 0,
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Reserves `size` bytes aligned to `alignment`, blocking on the copy
    /// fence if the ring or the submission table is currently full.
    ///
    /// Panics if `size` exceeds the ring's total capacity — no amount of
    /// retirement could ever satisfy it.
    pub fn upload_begin(&self, size: u32, alignment: u32) -> UploadContext {
        assert!(
            size <= self.capacity,
            "upload of {size} bytes exceeds ring capacity {}",
            self.capacity
        );
        let mut inner = self.inner.lock();
        loop {
            let aligned_head = align_up(inner.head, alignment);
            let physical = (aligned_head & (self.capacity as u64 - 1)) as u32;

            if physical + size > self.capacity {
                // Straddles the wrap boundary: waste to the next boundary
                // so the next attempt starts at physical offset 0.
                inner.head = (aligned_head / self.capacity as u64 + 1) * self.capacity as u64;
                continue;
            }

            let slot_free =
                inner.submission_head - inner.submission_tail < self.max_submissions as u64;
            let fits = aligned_head + size as u64 <= inner.tail + self.capacity as u64;

            if slot_free && fits {
                inner.head = aligned_head + size as u64;
                let slot_index = (inner.submission_head % self.max_submissions as u64) as usize;
                inner.submissions[slot_index] = Some(Submission {
                    logical_offset: aligned_head,
                    size,
                    fence_value: 0,
                });
                inner.submission_head += 1;
                return UploadContext {
                    offset: physical,
                    size,
                    logical_offset: aligned_head,
                };
            }

            self.retire_oldest(&mut inner);
        }
    }

    /// Closes and submits the copy work for `ctx`, recording the fence
    /// value the copy queue was signaled with so later retirement knows
    /// when the reserved bytes become safe to overwrite again.
    pub fn upload_end(&self, ctx: UploadContext) -> u64 {
        let fence_value = self.device.signal_fence(Queue::Copy);
        let mut inner = self.inner.lock();
        let slot_index = inner
            .submissions
            .iter()
            .position(|s| matches!(s, Some(s) if s.logical_offset == ctx.logical_offset))
            .expect("upload_end called with a context not currently reserved");
        inner.submissions[slot_index].as_mut().unwrap().fence_value = fence_value;
        fence_value
    }

    /// Blocks until every outstanding submission has retired. Used at
    /// teardown to guarantee no copy work is still in flight.
    pub fn flush_ring_buffer_uploads(&self) {
        let mut inner = self.inner.lock();
        while inner.submission_tail < inner.submission_head {
            self.retire_oldest(&mut inner);
        }
    }

    /// Waits on the oldest in-flight submission's fence (if it has one
    /// assigned yet — `upload_end` may not have run if the caller is still
    /// populating it, in which case this is a caller-ordering bug) and
    /// retires it, freeing its bytes and its submission slot.
    fn retire_oldest(&self, inner: &mut Inner) {
        let slot_index = (inner.submission_tail % self.max_submissions as u64) as usize;
        let submission = inner.submissions[slot_index]
            .expect("retire_oldest called with no in-flight submission");

        if self.device.completed_fence(Queue::Copy) < submission.fence_value {
            log::warn!(
                "upload ring stalling: waiting on copy fence {} to free a submission slot",
                submission.fence_value
            );
            self.device.wait_fence(Queue::Copy, submission.fence_value);
        }

        inner.tail = submission.logical_offset + submission.size as u64;
        inner.submissions[slot_index] = None;
        inner.submission_tail += 1;
    }

    /// `submission_head - submission_tail`, useful for tests asserting
    /// the invariant that at any point `submission_head - submission_tail
    /// <= max_submissions`.
    pub fn outstanding_submissions(&self) -> u64 {
        let inner = self.inner.lock();
        inner.submission_head - inner.submission_tail
    }

    /// `head - tail` in bytes, for the analogous ring-occupancy invariant.
    pub fn outstanding_bytes(&self) -> u64 {
        let inner = self.inner.lock();
        inner.head - inner.tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::TestDevice;

    #[test]
    fn sequential_uploads_never_exceed_submission_cap() {
        let device = Arc::new(TestDevice::new());
        let ring = UploadRing::new(device, 1024, 4);
        for _ in 0..16 {
            let ctx = ring.upload_begin(64, 16);
            ring.upload_end(ctx);
            assert!(ring.outstanding_submissions() <= 4);
        }
    }

    #[test]
    fn saturation_does_not_deadlock_with_auto_completing_device() {
        // A 64 KiB ring, 4 submission slots, 16 consecutive 32 KiB uploads
        // with no external frame progress.
        // With an auto-completing device, retirement always makes progress.
        let device = Arc::new(TestDevice::new());
        let ring = UploadRing::new(device, 64 * 1024, 4);
        for _ in 0..16 {
            let ctx = ring.upload_begin(32 * 1024, 16);
            ring.upload_end(ctx);
        }
        assert_eq!(ring.outstanding_submissions(), 0);
    }

    #[test]
    fn allocation_respects_wrap_boundary() {
        let device = Arc::new(TestDevice::new());
        let ring = UploadRing::new(device, 128, 4);
        let a = ring.upload_begin(100, 4);
        assert_eq!(a.offset, 0);
        ring.upload_end(a);
        // A second 100-byte request can't fit contiguously after offset
        // 100 (only 28 bytes remain before the 128-byte wrap), so it must
        // wrap to offset 0 rather than straddle the boundary.
        let b = ring.upload_begin(100, 4);
        assert_eq!(b.offset, 0);
        ring.upload_end(b);
    }

    #[test]
    fn flush_drains_all_outstanding_submissions() {
        let device = Arc::new(TestDevice::new());
        device.set_auto_complete(false);
        let ring = UploadRing::new(device.clone(), 1024, 4);
        let ctx = ring.upload_begin(64, 16);
        let fence = ring.upload_end(ctx);
        assert_eq!(ring.outstanding_submissions(), 1);

        let device_for_thread = device.clone();
        let completer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            device_for_thread.complete_through(Queue::Copy, fence);
        });
        ring.flush_ring_buffer_uploads();
        completer.join().unwrap();
        assert_eq!(ring.outstanding_submissions(), 0);
    }
}
