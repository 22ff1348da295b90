//! The single concrete API boundary.
//!
//! Portable cross-API abstraction is an explicit non-goal of this RHI, so
//! this crate does not generalize over a `dyn Trait` zoo of backends.
//! Instead it names one narrow [`GpuDevice`] trait standing in for "the one
//! low-level bindless API": a concrete implementation wraps whatever the
//! deployment actually talks to, and [`TestDevice`] is a deterministic
//! in-process double used by this crate's own tests so the scheduler,
//! upload ring, and deferred release queue can be exercised without real
//! hardware.
//!
//! Two independent GPU timelines are modeled: a dedicated copy queue
//! ([`Queue::Copy`]) and the graphics frame fence ([`Queue::Graphics`]).
//! Each has its own monotonically increasing fence value.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

/// One of the two GPU timelines the RHI schedules work against.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Queue {
    Graphics,
    Copy,
}

/// The one low-level bindless GPU API this crate talks to.
///
/// Every method here is expected to be cheap and non-reentrant-safe to call
/// from multiple threads except where documented; the RHI's own components
/// (upload ring, frame scheduler) serialize access to the parts that need
/// it with their own locks.
pub trait GpuDevice: Send + Sync {
    /// Increments the given queue's fence and returns the new value. The
    /// device is expected to arrange for `completed_fence` to eventually
    /// reach this value once prior submitted work retires.
    fn signal_fence(&self, queue: Queue) -> u64;

    /// Highest fence value the GPU has reported complete on this queue.
    fn completed_fence(&self, queue: Queue) -> u64;

    /// Blocks the calling thread until `completed_fence(queue) >= value`.
    /// There is no timeout here: callers that need to time-box a wait do so
    /// above this layer.
    fn wait_fence(&self, queue: Queue, value: u64);
}

/// A deterministic, in-process [`GpuDevice`] for tests.
///
/// Completion can be driven two ways: `auto_complete(true)` (the default)
/// makes every signal immediately visible as completed, which is enough to
/// exercise the common path without ever blocking. Tests that need to
/// assert on frame-latency behavior set `auto_complete(false)` and call
/// [`TestDevice::complete_through`] explicitly to simulate the GPU catching
/// up.
pub struct TestDevice {
    graphics: Timeline,
    copy: Timeline,
    auto_complete: std::sync::atomic::AtomicBool,
}

struct Timeline {
    signaled: AtomicU64,
    completed: Mutex<u64>,
    completed_changed: Condvar,
}

impl Timeline {
    fn new() -> Self {
        Timeline {
            signaled: AtomicU64::new(0),
            completed: Mutex::new(0),
            completed_changed: Condvar::new(),
        }
    }
}

impl TestDevice {
    pub fn new() -> Self {
        TestDevice {
            graphics: Timeline::new(),
            copy: Timeline::new(),
            auto_complete: std::sync::atomic::AtomicBool::new(true),
        }
    }

    /// Controls whether `signal_fence` is immediately visible to
    /// `completed_fence`/`wait_fence`. See struct docs.
    pub fn set_auto_complete(&self, auto: bool) {
        self.auto_complete.store(auto, Ordering::SeqCst);
    }

    fn timeline(&self, queue: Queue) -> &Timeline {
        match queue {
            Queue::Graphics => &self.graphics,
            Queue::Copy => &self.copy,
        }
    }

    /// Advances `queue`'s completed fence to `value`, simulating the GPU
    /// catching up to a previously signaled value. No-op if `value` is not
    /// greater than the current completed value. Wakes any thread blocked
    /// in `wait_fence`.
    pub fn complete_through(&self, queue: Queue, value: u64) {
        let timeline = self.timeline(queue);
        let mut completed = timeline.completed.lock();
        if value > *completed {
            *completed = value;
            timeline.completed_changed.notify_all();
        }
    }
}

impl Default for TestDevice {
    fn default() -> Self {
        TestDevice::new()
    }
}

impl GpuDevice for TestDevice {
    fn signal_fence(&self, queue: Queue) -> u64 {
        let timeline = self.timeline(queue);
        let value = timeline.signaled.fetch_add(1, Ordering::SeqCst) + 1;
        if self.auto_complete.load(Ordering::SeqCst) {
            self.complete_through(queue, value);
        }
        value
    }

    fn completed_fence(&self, queue: Queue) -> u64 {
        *self.timeline(queue).completed.lock()
    }

    fn wait_fence(&self, queue: Queue, value: u64) {
        let timeline = self.timeline(queue);
        let mut completed = timeline.completed.lock();
        while *completed < value {
            timeline.completed_changed.wait(&mut completed);
        }
    }
}
