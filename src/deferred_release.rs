//! MPMC-enqueue / single-consumer deferred release queue.
//!
//! GPU resources cannot be destroyed the instant a caller says "destroy
//! this" — the GPU may still be reading them from a frame still in flight.
//! Destruction is fence-gated, not reference-counted: the only lifetime
//! signal this layer trusts is "the GPU reported completion of fence value
//! X". Deliberately no refcounting here — it would complicate the
//! "safe to destroy at fence X" contract for no benefit.
//!
//! `defer_release` may be called from any thread and only takes a lock
//! briefly to push. `flush_deferred_releases` is only ever called from the
//! frame scheduler (single-threaded), and relies on entries being in
//! nondecreasing fence-value order — guaranteed because `fence_value` only
//! advances on the render thread.

use parking_lot::Mutex;
use std::collections::VecDeque;

struct Entry<T> {
    fence_value: u64,
    object: T,
}

/// A FIFO of objects awaiting fence-gated destruction.
pub struct DeferredReleaseQueue<T> {
    entries: Mutex<VecDeque<Entry<T>>>,
}

impl<T> DeferredReleaseQueue<T> {
    pub fn new() -> Self {
        DeferredReleaseQueue {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues `object` for release once the GPU reports completion of
    /// `fence_value` (typically the fence value assigned to the frame in
    /// which the caller requested destruction).
    pub fn defer_release(&self, object: T, fence_value: u64) {
        self.entries.lock().push_back(Entry { fence_value, object });
    }

    /// Number of objects still waiting on a fence.
    pub fn pending_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Releases every entry whose fence value is at or before
    /// `completed_fence_value`, in FIFO (and thus fence-ascending) order,
    /// stopping at the first entry not yet safe to release. Returns the
    /// released objects so the caller can run destructors / drop them.
    pub fn flush_deferred_releases(&self, completed_fence_value: u64) -> Vec<T> {
        let mut entries = self.entries.lock();
        let mut released = Vec::new();
        while let Some(front) = entries.front() {
            if front.fence_value > completed_fence_value {
                break;
            }
            released.push(entries.pop_front().unwrap().object);
        }
        if !released.is_empty() {
            log::trace!(
                "deferred release queue: released {} objects through fence {completed_fence_value}",
                released.len()
            );
        }
        released
    }
}

impl<T> Default for DeferredReleaseQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
