//! Command list recorder.
//!
//! A [`CommandList`] moves through `idle → recording → closed → in-flight →
//! idle`. Recording appends [`RecordedOp`]s to an in-memory log rather than
//! calling into a concrete device immediately — the concrete `GpuDevice`
//! implementation (or, in tests, nothing at all) walks the log at submission
//! time, deferring state-change commands into a buffer rather than issuing
//! them eagerly.
//!
//! Barrier insertion is implicit: the recorder tracks a "current declared
//! state" per resource touched in the list (keyed by buffer/texture handle
//! index) and emits a transition barrier only when a new usage conflicts
//! with it. Split barriers and aliasing are out of scope.

use crate::buffer_arena::{BufferAllocation, BufferArena};
use crate::resource::{BufferHandle, PsoHandle, TextureHandle};
use crate::upload_ring::{UploadContext, UploadRing};
use fxhash::FxHashMap;

/// Which of the three fixed parameter blocks a `set_parameters` call binds.
/// Setting a higher slot never invalidates a lower one bound in the same
/// pass, and vice versa.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ParamSlot {
    Draw = 0,
    Pass = 1,
    View = 2,
}

/// Root-constant budget per parameter block: 60 dwords (240 B).
pub const MAX_ROOT_CONSTANT_DWORDS: usize = 60;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoadOp {
    Load,
    Clear,
    Discard,
}

#[derive(Copy, Clone, Debug)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Copy, Clone, Debug)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

#[derive(Copy, Clone, Debug)]
pub struct ColorAttachment {
    pub texture: TextureHandle,
    pub load_op: LoadOp,
    pub clear_color: [f32; 4],
}

#[derive(Copy, Clone, Debug)]
pub struct DepthStencilAttachment {
    pub texture: TextureHandle,
    pub load_op: LoadOp,
    pub clear_depth: f32,
    pub clear_stencil: u8,
}

#[derive(Clone, Debug)]
pub struct GraphicsPassDesc {
    pub render_targets: smallvec::SmallVec<[ColorAttachment; 4]>,
    pub depth_stencil: Option<DepthStencilAttachment>,
    pub viewport: Viewport,
    pub scissor: ScissorRect,
    pub topology: PrimitiveTopology,
}

/// A single recorded operation. The concrete `GpuDevice` translates these
/// into real API calls at submission time; the deterministic test device
/// simply inspects the log.
#[derive(Clone, Debug)]
pub enum RecordedOp {
    BeginGraphicsPass(GraphicsPassDesc),
    EndGraphicsPass,
    SetPso(PsoHandle),
    SetParameters { slot: ParamSlot, dwords: Vec<u32> },
    Draw { vertex_count: u32, vertex_offset: u32 },
    DrawIndexed {
        index_buffer: BufferHandle,
        index_count: u32,
        index_offset: u32,
        vertex_offset: i32,
    },
    /// Indexed draw whose arguments (index count, instance count, etc.) are
    /// read from `indirect_args_buffer` at `indirect_args_offset` rather
    /// than passed as immediates — what the draw stream issues, since its
    /// packets name an indirect-args buffer rather than literal counts.
    DrawIndexedIndirect {
        index_buffer: BufferHandle,
        indirect_args_buffer: BufferHandle,
        indirect_args_offset: u32,
    },
    Dispatch { x: u32, y: u32, z: u32 },
    Barrier { resource: ResourceKey, before: ResourceState, after: ResourceState },
    CopyBufferUpload {
        buffer: BufferHandle,
        dst_offset: u64,
        size: u32,
        src: BufferWriteDest,
    },
}

/// Whether `begin_buffer_upload` draws from this frame's transient arena
/// or the asynchronous copy-queue ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UploadFrequency {
    /// Single-frame lifetime: sourced from the frame's [`BufferArena`].
    Frame,
    /// Staged via the copy queue: sourced from the [`UploadRing`].
    Async,
}

/// Where `begin_buffer_upload` reserved the write destination, returned to
/// the caller so it knows which staging area to `memcpy` into. The
/// concrete `GpuDevice` resolves this into an actual mapped CPU pointer;
/// this in-memory recorder only tracks the reservation through to
/// `end_buffer_upload`.
#[derive(Copy, Clone, Debug)]
pub enum BufferWriteDest {
    Frame(BufferAllocation),
    Async { offset: u32, size: u32 },
}

enum OpenUpload {
    Frame(BufferAllocation),
    Async(UploadContext),
}

/// Identifies a resource touched by this command list, for barrier
/// tracking purposes only (not a handle generation check — the registry is
/// the source of truth for liveness).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceKey {
    Buffer(u32),
    Texture(u32),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceState {
    Common,
    RenderTarget,
    DepthWrite,
    ShaderResource,
    CopyDest,
    CopySource,
    UnorderedAccess,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandListState {
    Idle,
    Recording,
    Closed,
    InFlight,
}

/// A recordable batch of GPU work, bound to one command allocator.
pub struct CommandList {
    state: CommandListState,
    ops: Vec<RecordedOp>,
    pass_open: bool,
    resource_states: FxHashMap<ResourceKey, ResourceState>,
    /// Fence value assigned at submission; only meaningful in `InFlight`.
    fence_value: Option<u64>,
    /// Uploads reserved via `begin_buffer_upload` awaiting their matching
    /// `end_buffer_upload`, keyed by target buffer handle slot index.
    open_uploads: FxHashMap<u32, OpenUpload>,
}

impl CommandList {
    pub fn new() -> Self {
        CommandList {
            state: CommandListState::Idle,
            ops: Vec::new(),
            pass_open: false,
            resource_states: FxHashMap::default(),
            fence_value: None,
            open_uploads: FxHashMap::default(),
        }
    }

    pub fn state(&self) -> CommandListState {
        self.state
    }

    /// Transitions `idle → recording`, clearing any prior log.
    pub fn begin(&mut self) {
        assert_eq!(
            self.state,
            CommandListState::Idle,
            "begin() called on a command list that isn't idle"
        );
        self.ops.clear();
        self.resource_states.clear();
        self.open_uploads.clear();
        self.state = CommandListState::Recording;
    }

    fn require_recording(&self, op: &'static str) {
        assert_eq!(
            self.state,
            CommandListState::Recording,
            "{op} requires the command list to be in the recording state"
        );
    }

    /// Declares the state a resource must be in before further recorded
    /// work and emits a transition barrier if it conflicts with the last
    /// declared state. Exposed for callers that need an explicit barrier at
    /// a seam the implicit tracker can't see.
    pub fn transition(&mut self, resource: ResourceKey, after: ResourceState) {
        let before = self
            .resource_states
            .get(&resource)
            .copied()
            .unwrap_or(ResourceState::Common);
        if before != after {
            self.ops.push(RecordedOp::Barrier { resource, before, after });
        }
        self.resource_states.insert(resource, after);
    }

    /// Opens a graphics pass. At most one pass may be open at a time;
    /// opening a second is state misuse and panics.
    pub fn begin_graphics_pass(&mut self, desc: GraphicsPassDesc) {
        self.require_recording("begin_graphics_pass");
        assert!(!self.pass_open, "two passes open on one command list");
        for rt in &desc.render_targets {
            self.transition(ResourceKey::Texture(rt.texture.index()), ResourceState::RenderTarget);
        }
        if let Some(ds) = &desc.depth_stencil {
            self.transition(ResourceKey::Texture(ds.texture.index()), ResourceState::DepthWrite);
        }
        self.pass_open = true;
        self.ops.push(RecordedOp::BeginGraphicsPass(desc));
    }

    /// Closes the open pass, transitioning render targets back to their
    /// declared post-pass state. MSAA resolve is a concrete-device concern,
    /// out of scope for this in-memory recorder.
    pub fn end_graphics_pass(&mut self) {
        self.require_recording("end_graphics_pass");
        assert!(self.pass_open, "end_graphics_pass with no open pass");
        self.pass_open = false;
        self.ops.push(RecordedOp::EndGraphicsPass);
    }

    pub fn set_pso(&mut self, pso: PsoHandle) {
        self.require_recording("set_pso");
        self.ops.push(RecordedOp::SetPso(pso));
    }

    /// Writes `bytes.len() / 4` root constants at `slot`. `bytes.len()` must
    /// be a multiple of 4 and at most `MAX_ROOT_CONSTANT_DWORDS * 4`:
    /// exceeding the budget is state misuse and panics.
    pub fn set_parameters(&mut self, slot: ParamSlot, bytes: &[u8]) {
        self.require_recording("set_parameters");
        assert_eq!(bytes.len() % 4, 0, "parameter block must be dword-sized");
        let dwords: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert!(
            dwords.len() <= MAX_ROOT_CONSTANT_DWORDS,
            "parameter block of {} dwords exceeds the {} dword root-constant budget",
            dwords.len(),
            MAX_ROOT_CONSTANT_DWORDS
        );
        self.ops.push(RecordedOp::SetParameters { slot, dwords });
    }

    pub fn draw(&mut self, vertex_count: u32, vertex_offset: u32) {
        self.require_recording("draw");
        self.ops.push(RecordedOp::Draw { vertex_count, vertex_offset });
    }

    pub fn draw_indexed(
        &mut self,
        index_buffer: BufferHandle,
        index_count: u32,
        index_offset: u32,
        vertex_offset: i32,
    ) {
        self.require_recording("draw_indexed");
        self.transition(ResourceKey::Buffer(index_buffer.index()), ResourceState::Common);
        self.ops.push(RecordedOp::DrawIndexed {
            index_buffer,
            index_count,
            index_offset,
            vertex_offset,
        });
    }

    /// Draws indexed geometry with arguments sourced from an indirect-args
    /// buffer instead of literal counts — what the sort-key draw stream
    /// uses so it never has to know per-packet vertex/index counts.
    pub fn draw_indexed_indirect(
        &mut self,
        index_buffer: BufferHandle,
        indirect_args_buffer: BufferHandle,
        indirect_args_offset: u32,
    ) {
        self.require_recording("draw_indexed_indirect");
        self.transition(ResourceKey::Buffer(index_buffer.index()), ResourceState::Common);
        self.ops.push(RecordedOp::DrawIndexedIndirect {
            index_buffer,
            indirect_args_buffer,
            indirect_args_offset,
        });
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.require_recording("dispatch");
        self.ops.push(RecordedOp::Dispatch { x, y, z });
    }

    /// Reserves a write destination for `size` bytes headed to `handle` at
    /// `offset`, sourced from this frame's [`BufferArena`] (`frequency ==
    /// Frame`) or the asynchronous [`UploadRing`] (`frequency == Async`).
    /// Panics if a prior `begin_buffer_upload` for the same buffer is still
    /// open (state misuse: two uploads to one buffer without an
    /// intervening `end_buffer_upload`).
    pub fn begin_buffer_upload<D: crate::device::GpuDevice>(
        &mut self,
        handle: BufferHandle,
        size: u32,
        alignment: u32,
        frequency: UploadFrequency,
        frame_arena: &BufferArena,
        upload_ring: &UploadRing<D>,
    ) -> BufferWriteDest {
        self.require_recording("begin_buffer_upload");
        let key = handle.index();
        assert!(
            !self.open_uploads.contains_key(&key),
            "begin_buffer_upload called twice for the same buffer without an intervening end_buffer_upload"
        );
        match frequency {
            UploadFrequency::Frame => {
                let allocation = frame_arena
                    .alloc(size, alignment)
                    .expect("frame buffer arena exhausted for a per-frame upload");
                self.open_uploads.insert(key, OpenUpload::Frame(allocation));
                BufferWriteDest::Frame(allocation)
            }
            UploadFrequency::Async => {
                let ctx = upload_ring.upload_begin(size, alignment);
                let dest = BufferWriteDest::Async { offset: ctx.offset, size: ctx.size };
                self.open_uploads.insert(key, OpenUpload::Async(ctx));
                dest
            }
        }
    }

    /// Emits the copy command for the upload reserved by
    /// `begin_buffer_upload` against `handle` at `dst_offset`. For an async
    /// upload this also closes and submits the ring's copy command list.
    /// Panics if no upload is open for `handle`.
    pub fn end_buffer_upload<D: crate::device::GpuDevice>(
        &mut self,
        handle: BufferHandle,
        dst_offset: u64,
        upload_ring: &UploadRing<D>,
    ) {
        self.require_recording("end_buffer_upload");
        let key = handle.index();
        let open = self
            .open_uploads
            .remove(&key)
            .expect("end_buffer_upload called with no matching begin_buffer_upload");
        let (src, size) = match open {
            OpenUpload::Frame(allocation) => (BufferWriteDest::Frame(allocation), allocation.size),
            OpenUpload::Async(ctx) => {
                let size = ctx.size;
                let offset = ctx.offset;
                upload_ring.upload_end(ctx);
                (BufferWriteDest::Async { offset, size }, size)
            }
        };
        self.ops.push(RecordedOp::CopyBufferUpload { buffer: handle, dst_offset, size, src });
    }

    /// Closes the list for submission. Panics if a pass is still open.
    pub fn close(&mut self) {
        self.require_recording("close");
        assert!(!self.pass_open, "close() with an unclosed graphics pass");
        self.state = CommandListState::Closed;
    }

    /// Marks the list submitted, recording the fence value it will
    /// complete at. Only the frame scheduler calls this.
    pub(crate) fn mark_in_flight(&mut self, fence_value: u64) {
        assert_eq!(self.state, CommandListState::Closed, "submit requires a closed list");
        self.state = CommandListState::InFlight;
        self.fence_value = Some(fence_value);
    }

    /// Returns the list to `idle` once its fence value has retired, ready
    /// to be recorded into again.
    pub(crate) fn reset_to_idle(&mut self) {
        self.state = CommandListState::Idle;
        self.fence_value = None;
    }

    pub fn recorded_ops(&self) -> &[RecordedOp] {
        &self.ops
    }
}

impl Default for CommandList {
    fn default() -> Self {
        Self::new()
    }
}
