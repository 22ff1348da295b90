//! End-to-end "draw a triangle" scenario: three structured buffers
//! (positions/colors/uvs) with SRVs, one graphics PSO, a pass to the
//! backbuffer with a clear color, pass parameters naming the three SRVs,
//! draw parameters naming a texture SRV, and a single `draw(3)`.

use rhi::command::{
    ColorAttachment, CommandList, GraphicsPassDesc, LoadOp, ParamSlot, PrimitiveTopology,
    RecordedOp, ScissorRect, Viewport,
};
use rhi::descriptor_heap::DescriptorHeap;
use rhi::deferred_release::DeferredReleaseQueue;
use rhi::device::TestDevice;
use rhi::frame::FrameScheduler;
use rhi::handle::HandlePool;
use rhi::format::PixelFormat;
use rhi::resource::{
    BufferDesc, BufferUsage, BufferViewDesc, PsoResource, ResourceRegistry, TextureDesc,
    TextureDimension, TextureResource, TextureViews,
};
use rhi::swapchain::TestSwapchain;
use std::sync::Arc;

fn structured_buffer(
    registry: &mut ResourceRegistry,
    heap: &DescriptorHeap,
    element_count: u32,
    element_stride: u32,
) -> rhi::resource::BufferHandle {
    let desc = BufferDesc {
        size: (element_count * element_stride) as u64,
        usage: BufferUsage::STRUCTURED,
        srv: Some(BufferViewDesc {
            first_element: 0,
            element_count,
            element_stride,
            raw: false,
        }),
        uav: None,
        dynamic: false,
    };
    registry.create_buffer(heap, desc, vec![1]).unwrap()
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PassParams {
    positions_srv: u32,
    colors_srv: u32,
    uvs_srv: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawParams {
    offset: [f32; 4],
    color: [f32; 4],
    albedo_srv: u32,
    _pad: [u32; 3],
}

#[test]
fn triangle_scenario_records_the_expected_op_sequence() {
    let heap = Arc::new(DescriptorHeap::new(64));
    let mut registry = ResourceRegistry::new(16, 16, 16);

    let positions = structured_buffer(&mut registry, &heap, 3, 12); // vec3
    let colors = structured_buffer(&mut registry, &heap, 3, 16); // vec4
    let uvs = structured_buffer(&mut registry, &heap, 3, 8); // vec2

    let albedo_desc = BufferDesc {
        size: 4,
        usage: BufferUsage::STRUCTURED,
        srv: Some(BufferViewDesc { first_element: 0, element_count: 1, element_stride: 4, raw: false }),
        uav: None,
        dynamic: false,
    };
    let albedo = registry.create_buffer(&heap, albedo_desc, vec![2]).unwrap();

    let pso = registry
        .create_pso(PsoResource {
            debug_name: "triangle".to_string(),
            root_constant_dwords: [8, 4, 0],
        })
        .unwrap();

    let mut backbuffer_pool: HandlePool<TextureResource> = HandlePool::with_capacity(2);
    let (backbuffer, _) = backbuffer_pool
        .allocate(TextureResource {
            desc: TextureDesc {
                dimension: TextureDimension::Tex2d { width: 1920, height: 1080 },
                mip_count: 1,
                sample_count: 1,
                format: PixelFormat::R8G8B8A8Unorm,
            },
            instance: 1,
            views: TextureViews::default(),
        })
        .unwrap();

    let device = Arc::new(TestDevice::new());
    let releases = Arc::new(DeferredReleaseQueue::new());
    let mut scheduler = FrameScheduler::new(device, heap.clone(), releases, 2, 64 * 1024);
    let mut swapchain = TestSwapchain::new(vec![backbuffer]);

    let mut captured_ops: Vec<RecordedOp> = Vec::new();
    let (_, fence) = scheduler.run_frame(&mut swapchain, |slot, backbuffer| {
        let mut list = CommandList::new();
        list.begin();

        list.begin_graphics_pass(GraphicsPassDesc {
            render_targets: smallvec::smallvec![ColorAttachment {
                texture: backbuffer,
                load_op: LoadOp::Clear,
                clear_color: [0.15, 0.25, 0.15, 1.0],
            }],
            depth_stencil: None,
            viewport: Viewport { x: 0.0, y: 0.0, width: 1920.0, height: 1080.0, min_depth: 0.0, max_depth: 1.0 },
            scissor: ScissorRect { x: 0, y: 0, width: 1920, height: 1080 },
            topology: PrimitiveTopology::TriangleList,
        });

        list.set_pso(pso);

        let pass_params = PassParams {
            positions_srv: registry.get_buffer_srv(positions).unwrap(),
            colors_srv: registry.get_buffer_srv(colors).unwrap(),
            uvs_srv: registry.get_buffer_srv(uvs).unwrap(),
            _pad: 0,
        };
        list.set_parameters(ParamSlot::Pass, bytemuck::bytes_of(&pass_params));

        let draw_params = DrawParams {
            offset: [0.0, 0.0, 0.0, 0.0],
            color: [1.0, 1.0, 1.0, 1.0],
            albedo_srv: registry.get_buffer_srv(albedo).unwrap(),
            _pad: [0; 3],
        };
        list.set_parameters(ParamSlot::Draw, bytemuck::bytes_of(&draw_params));

        list.draw(3, 0);
        list.end_graphics_pass();
        captured_ops = list.recorded_ops().to_vec();
        list.close();
        slot.command_lists.push(list);
    });

    assert!(fence > 0);

    let ops = captured_ops;
    assert!(matches!(ops[0], RecordedOp::Barrier { .. } | RecordedOp::BeginGraphicsPass(_)));
    assert!(ops.iter().any(|op| matches!(op, RecordedOp::SetPso(_))));
    assert!(ops
        .iter()
        .any(|op| matches!(op, RecordedOp::SetParameters { slot: ParamSlot::Pass, .. })));
    assert!(ops
        .iter()
        .any(|op| matches!(op, RecordedOp::SetParameters { slot: ParamSlot::Draw, .. })));
    assert!(ops
        .iter()
        .any(|op| matches!(op, RecordedOp::Draw { vertex_count: 3, vertex_offset: 0 })));
    assert!(ops.iter().any(|op| matches!(op, RecordedOp::EndGraphicsPass)));
}
