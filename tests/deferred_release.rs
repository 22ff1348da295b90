//! End-to-end "deferred release" scenario: destroy 1000 textures in frame
//! 100 with `frame_latency=2`. At frame 101 the underlying descriptor
//! indices are still pending-free (the GPU hasn't yet reported frame 100
//! complete). At the start of frame 102, exactly those 1000 indices have
//! moved to the free set and the textures are destroyed.

use rhi::deferred_release::DeferredReleaseQueue;
use rhi::descriptor_heap::DescriptorHeap;
use rhi::device::TestDevice;
use rhi::format::PixelFormat;
use rhi::frame::FrameScheduler;
use rhi::handle::HandlePool;
use rhi::resource::{
    DeviceResourceId, ResourceRegistry, TextureDesc, TextureDimension, TextureResource,
    TextureViews,
};
use rhi::swapchain::TestSwapchain;
use std::sync::Arc;

fn texture_desc() -> TextureDesc {
    TextureDesc {
        dimension: TextureDimension::Tex2d { width: 256, height: 256 },
        mip_count: 1,
        sample_count: 1,
        format: PixelFormat::R8G8B8A8Unorm,
    }
}

#[test]
fn thousand_textures_destroyed_exactly_at_frame_latency_boundary() {
    let heap = Arc::new(DescriptorHeap::new(4096));
    let mut registry = ResourceRegistry::new(16, 2048, 16);

    let device = Arc::new(TestDevice::new());
    device.set_auto_complete(false);
    let releases: Arc<DeferredReleaseQueue<DeviceResourceId>> =
        Arc::new(DeferredReleaseQueue::new());
    let mut scheduler = FrameScheduler::new(device.clone(), heap.clone(), releases, 2, 64 * 1024);

    let mut backbuffer_pool: HandlePool<TextureResource> = HandlePool::with_capacity(1);
    let (backbuffer, _) = backbuffer_pool
        .allocate(TextureResource {
            desc: texture_desc(),
            instance: 0,
            views: TextureViews::default(),
        })
        .unwrap();
    let mut swapchain = TestSwapchain::new(vec![backbuffer]);

    // Drive the scheduler to frame 100, creating and then destroying 1000
    // textures (each with an SRV index) at that frame. Each warm-up frame's
    // fence is completed immediately so `wait_fence` in step 1 never blocks.
    let mut handles = Vec::with_capacity(1000);
    for _ in 0..99 {
        let (_, fence) = scheduler.run_frame(&mut swapchain, |_, _| {});
        device.complete_through(rhi::device::Queue::Graphics, fence);
    }

    for i in 0..1000u32 {
        let srv = heap.alloc_persistent().unwrap();
        let handle = registry
            .create_texture(
                texture_desc(),
                i as DeviceResourceId,
                TextureViews { srv: Some(srv), ..Default::default() },
            )
            .unwrap();
        handles.push(handle);
    }

    // Frame 100: destroy all 1000 textures. `destroy_texture` tags their
    // descriptor indices with the *current* frame index.
    let (_, frame_100_fence) = scheduler.run_frame(&mut swapchain, |_, _| {});
    assert_eq!(scheduler.frame_index(), 100);
    for &handle in &handles {
        registry.destroy_texture(&heap, handle, scheduler.frame_index());
    }
    assert_eq!(heap.pending_free_count(), 1000);
    assert_eq!(heap.free_count(), 4096 - 1 - 1000);

    device.complete_through(rhi::device::Queue::Graphics, frame_100_fence);

    // Frame 101: still within frame_latency=2 of frame 100, so the indices
    // must remain pending (not yet safe to reuse).
    scheduler.run_frame(&mut swapchain, |_, _| {});
    assert_eq!(scheduler.frame_index(), 101);
    assert_eq!(heap.pending_free_count(), 1000);

    // Frame 102: the scheduler's step 1 now waits for frame (102 - 2) = 100
    // to retire, which it already has, so step 3's flush releases exactly
    // those 1000 indices.
    scheduler.run_frame(&mut swapchain, |_, _| {});
    assert_eq!(scheduler.frame_index(), 102);
    assert_eq!(heap.pending_free_count(), 0);
    assert_eq!(heap.free_count(), 4096 - 1);

    for &handle in &handles {
        assert!(registry.texture(handle).is_none());
    }
}
