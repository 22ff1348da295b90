//! Frame scheduler.
//!
//! Drives the per-frame loop in seven steps: wait for
//! the GPU to retire frame `current - N`, advance the frame index, flush
//! deferred releases and pending descriptor frees up through that retired
//! frame, reset that frame-in-flight slot's transient state, let the caller
//! record into it, submit, signal the frame fence, and present.
//!
//! `N` (`frame_latency`) frame-in-flight slots exist; slot `frame_index %
//! N` is always the one whose GPU work is guaranteed complete by the time
//! it's reused, because step 1 waited for exactly that.

use crate::buffer_arena::BufferArena;
use crate::command::{CommandList, CommandListState};
use crate::deferred_release::DeferredReleaseQueue;
use crate::descriptor_heap::DescriptorHeap;
use crate::device::{GpuDevice, Queue};
use crate::resource::DeviceResourceId;
use crate::swapchain::Swapchain;
use std::sync::Arc;

/// Per-frame-in-flight state.
pub struct FrameSlot {
    pub command_lists: Vec<CommandList>,
    pub buffer_arena: BufferArena,
    /// Fence value this frame will have completed at, once submitted.
    /// `None` until `FrameScheduler::end_frame` signals it.
    pub fence_value: Option<u64>,
}

impl FrameSlot {
    fn new(buffer_arena_capacity: u32) -> Self {
        FrameSlot {
            command_lists: Vec::new(),
            buffer_arena: BufferArena::new(buffer_arena_capacity),
            fence_value: None,
        }
    }
}

/// Owns the per-frame-in-flight slots and advances the graphics timeline.
pub struct FrameScheduler<D: GpuDevice> {
    device: Arc<D>,
    descriptor_heap: Arc<DescriptorHeap>,
    deferred_releases: Arc<DeferredReleaseQueue<DeviceResourceId>>,
    frame_latency: u32,
    /// Monotonically increasing frame counter, starting at 0.
    frame_index: u64,
    /// Last fence value signaled on the graphics queue.
    fence_value: u64,
    slots: Vec<FrameSlot>,
}

impl<D: GpuDevice> FrameScheduler<D> {
    pub fn new(
        device: Arc<D>,
        descriptor_heap: Arc<DescriptorHeap>,
        deferred_releases: Arc<DeferredReleaseQueue<DeviceResourceId>>,
        frame_latency: u32,
        buffer_arena_capacity: u32,
    ) -> Self {
        assert!((1..=3).contains(&frame_latency), "frame_latency must be 1..=3");
        let slots = (0..frame_latency)
            .map(|_| FrameSlot::new(buffer_arena_capacity))
            .collect();
        FrameScheduler {
            device,
            descriptor_heap,
            deferred_releases,
            frame_latency,
            frame_index: 0,
            fence_value: 0,
            slots,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn frame_latency(&self) -> u32 {
        self.frame_latency
    }

    /// Releases objects whose destruction was deferred. Exposed so a caller
    /// (or the resource registry, via physical-resource destructors) can
    /// actually free device memory for each object `flush_deferred_releases`
    /// returns as safe to release.
    pub fn deferred_releases(&self) -> &DeferredReleaseQueue<DeviceResourceId> {
        &self.deferred_releases
    }

    /// Runs one full frame: waits for `frame - N` to retire, advances the
    /// frame index, flushes deferred state, lets `record` fill in command
    /// lists against the now-safe-to-reuse slot, then submits, signals, and
    /// presents. Returns the objects whose deferred release is now safe
    /// (step 3) and the fence value this frame was signaled with (step 6).
    pub fn run_frame(
        &mut self,
        swapchain: &mut impl Swapchain,
        record: impl FnOnce(&mut FrameSlot, crate::resource::TextureHandle),
    ) -> (Vec<DeviceResourceId>, u64) {
        // Step 2 (advance first): the slot this call is about to reuse is
        // `frame_index % N` of the *post*-increment frame index — the same
        // index step 4 resets below. Step 1's wait has to check that exact
        // slot's fence, not the previous one, or it waits on the wrong
        // frame's work and can let a reused slot's arena/allocator get reset
        // while the GPU is still reading it.
        self.frame_index += 1;
        let slot_index = (self.frame_index % self.frame_latency as u64) as usize;

        // Step 1: wait for the frame that last used this slot (frame
        // `current - N`) to complete. A slot that hasn't been used yet
        // carries no fence value, so the first N frames wait on nothing.
        if let Some(fence_value) = self.slots[slot_index].fence_value {
            if self.device.completed_fence(Queue::Graphics) < fence_value {
                log::trace!(
                    "frame {}: waiting on graphics fence {fence_value} before reusing its frame slot",
                    self.frame_index
                );
            }
            self.device.wait_fence(Queue::Graphics, fence_value);
        }

        // Step 3: flush deferred releases and pending descriptor frees up
        // through the frame that just retired.
        let completed_frame = self.frame_index.saturating_sub(self.frame_latency as u64);
        let completed_fence_value = self.device.completed_fence(Queue::Graphics);
        let released = self.deferred_releases.flush_deferred_releases(completed_fence_value);
        self.descriptor_heap.flush_pending_frees(completed_frame);

        // Step 4: reset this frame's command allocators and buffer arena.
        let slot = &mut self.slots[slot_index];
        slot.command_lists.clear();
        slot.buffer_arena.reset();
        slot.fence_value = None;

        // Step 5: yield to the caller to record. Backbuffer acquisition
        // happens exactly once per frame.
        let backbuffer = swapchain.acquire_backbuffer();
        record(slot, backbuffer);

        // Step 6: submit, signal the frame fence. A caller may have already
        // closed a list itself (e.g. to capture its recorded ops before
        // submission); only close the ones it left open.
        for list in &mut slot.command_lists {
            if list.state() == CommandListState::Recording {
                list.close();
            }
        }
        self.fence_value += 1;
        let signaled = self.device.signal_fence(Queue::Graphics);
        debug_assert_eq!(signaled, self.fence_value, "fence values must stay in lockstep");
        for list in &mut slot.command_lists {
            list.mark_in_flight(self.fence_value);
        }
        slot.fence_value = Some(self.fence_value);

        // Step 7: present.
        swapchain.present();

        (released, self.fence_value)
    }
}
