//! Buffer/texture/PSO objects and bindless view creation.
//!
//! The registry owns one [`HandlePool`] per object kind and is the only
//! place that reaches into the [`DescriptorHeap`] to mint SRV/UAV indices.
//! Handles are the façade callers hold; this module is where a handle
//! resolves to the bookkeeping needed to feed a shader (a descriptor index)
//! or to destroy the backing GPU resource later.

use crate::descriptor_heap::DescriptorHeap;
use crate::error::{RhiError, Result};
use crate::format::PixelFormat;
use crate::handle::{Handle, HandlePool};
use bitflags::bitflags;

bitflags! {
    /// Usage flags for a [`Buffer`].
    pub struct BufferUsage: u32 {
        const VERTEX     = 1 << 0;
        const INDEX      = 1 << 1;
        const STRUCTURED = 1 << 2;
        const RAW        = 1 << 3;
        /// CPU-writable, persistently mapped (upload-heap backed).
        const UPLOAD     = 1 << 4;
    }
}

/// Dimensionality of a [`Texture`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    Tex1d { width: u32 },
    Tex2d { width: u32, height: u32 },
    Tex3d { width: u32, height: u32, depth: u32 },
    Cube { size: u32 },
    Array2d { width: u32, height: u32, array_layers: u32 },
}

/// A buffer view descriptor: first element, element count, element stride,
/// and whether the view is a raw byte-address view.
#[derive(Copy, Clone, Debug)]
pub struct BufferViewDesc {
    pub first_element: u32,
    pub element_count: u32,
    pub element_stride: u32,
    pub raw: bool,
}

/// CPU description used at creation time; the registry turns this into the
/// physical resource count (1, or `frame_latency` if `dynamic`) and any
/// requested descriptor views.
#[derive(Clone, Debug)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: BufferUsage,
    pub srv: Option<BufferViewDesc>,
    pub uav: Option<BufferViewDesc>,
    /// When set, this buffer has one physical instance per frame in
    /// flight, rotating implicitly with the frame index. Its contents are
    /// only valid for the frame that wrote them.
    pub dynamic: bool,
}

#[derive(Clone, Debug)]
pub struct TextureDesc {
    pub dimension: TextureDimension,
    pub mip_count: u32,
    pub sample_count: u32,
    pub format: PixelFormat,
}

/// Views requested at texture creation time. At most one mutable view of a
/// kind may exist per (mip, slice); this registry does not itself enforce
/// that beyond tracking the index it minted.
#[derive(Default, Clone, Debug)]
pub struct TextureViews {
    pub srv: Option<u32>,
    pub uav_per_mip: Vec<u32>,
    pub rtv_per_mip_slice: Vec<u32>,
    pub dsv: Option<u32>,
}

/// Opaque stand-in for a physical device-side resource. The concrete
/// `GpuDevice` implementation is responsible for the real allocation; the
/// registry only needs something to hand back to the device on destroy.
pub type DeviceResourceId = u64;

pub struct BufferResource {
    pub desc: BufferDesc,
    /// One entry, or `frame_latency` entries if `desc.dynamic`.
    pub instances: Vec<DeviceResourceId>,
    pub srv_index: Option<u32>,
    pub uav_index: Option<u32>,
}

pub struct TextureResource {
    pub desc: TextureDesc,
    pub instance: DeviceResourceId,
    pub views: TextureViews,
}

pub struct PsoResource {
    pub debug_name: String,
    /// Number of root-constant dwords the root signature expects, per
    /// parameter block (draw/pass/view) — see `command::ParamSlot`.
    pub root_constant_dwords: [u32; 3],
}

pub type BufferHandle = Handle<BufferResource>;
pub type TextureHandle = Handle<TextureResource>;
pub type PsoHandle = Handle<PsoResource>;

/// Owns the handle pools for buffers/textures/PSOs and is the only
/// component that mints bindless descriptor indices for them.
pub struct ResourceRegistry {
    buffers: HandlePool<BufferResource>,
    textures: HandlePool<TextureResource>,
    psos: HandlePool<PsoResource>,
}

impl ResourceRegistry {
    pub fn new(buffer_capacity: u32, texture_capacity: u32, pso_capacity: u32) -> Self {
        ResourceRegistry {
            buffers: HandlePool::with_capacity(buffer_capacity),
            textures: HandlePool::with_capacity(texture_capacity),
            psos: HandlePool::with_capacity(pso_capacity),
        }
    }

    /// Registers a buffer created elsewhere (the concrete device owns
    /// actual allocation) and mints SRV/UAV descriptor indices for any
    /// views the descriptor requested.
    pub fn create_buffer(
        &mut self,
        heap: &DescriptorHeap,
        desc: BufferDesc,
        instances: Vec<DeviceResourceId>,
    ) -> Result<BufferHandle> {
        let srv_index = desc
            .srv
            .is_some()
            .then(|| heap.alloc_persistent())
            .flatten();
        if desc.srv.is_some() && srv_index.is_none() {
            return Err(RhiError::OutOfCapacity {
                subsystem: "DescriptorHeap (buffer SRV)",
                capacity: heap.capacity(),
            });
        }
        let uav_index = desc
            .uav
            .is_some()
            .then(|| heap.alloc_persistent())
            .flatten();
        if desc.uav.is_some() && uav_index.is_none() {
            return Err(RhiError::OutOfCapacity {
                subsystem: "DescriptorHeap (buffer UAV)",
                capacity: heap.capacity(),
            });
        }

        let resource = BufferResource {
            desc,
            instances,
            srv_index,
            uav_index,
        };
        let (handle, _) = self.buffers.allocate(resource).ok_or(RhiError::OutOfCapacity {
            subsystem: "ResourceRegistry (buffers)",
            capacity: self.buffers.capacity(),
        })?;
        Ok(handle)
    }

    pub fn create_texture(
        &mut self,
        desc: TextureDesc,
        instance: DeviceResourceId,
        views: TextureViews,
    ) -> Result<TextureHandle> {
        let resource = TextureResource { desc, instance, views };
        let (handle, _) = self
            .textures
            .allocate(resource)
            .ok_or(RhiError::OutOfCapacity {
                subsystem: "ResourceRegistry (textures)",
                capacity: self.textures.capacity(),
            })?;
        Ok(handle)
    }

    pub fn create_pso(&mut self, resource: PsoResource) -> Result<PsoHandle> {
        let (handle, _) = self.psos.allocate(resource).ok_or(RhiError::OutOfCapacity {
            subsystem: "ResourceRegistry (PSOs)",
            capacity: self.psos.capacity(),
        })?;
        Ok(handle)
    }

    /// Frees the handle slot. The caller is responsible for having already
    /// enqueued the physical resource(s) into the deferred release queue;
    /// this module only tracks bookkeeping, not destruction timing.
    pub fn destroy_buffer(&mut self, heap: &DescriptorHeap, handle: BufferHandle, frame_index: u64) {
        if let Some(resource) = self.buffers.get(handle) {
            if let Some(idx) = resource.srv_index {
                heap.free_persistent(idx, frame_index);
            }
            if let Some(idx) = resource.uav_index {
                heap.free_persistent(idx, frame_index);
            }
        }
        self.buffers.free(handle);
    }

    pub fn destroy_texture(&mut self, heap: &DescriptorHeap, handle: TextureHandle, frame_index: u64) {
        if let Some(resource) = self.textures.get(handle) {
            for idx in resource
                .views
                .srv
                .into_iter()
                .chain(resource.views.uav_per_mip.iter().copied())
                .chain(resource.views.rtv_per_mip_slice.iter().copied())
                .chain(resource.views.dsv)
            {
                heap.free_persistent(idx, frame_index);
            }
        }
        self.textures.free(handle);
    }

    pub fn destroy_pso(&mut self, handle: PsoHandle) {
        self.psos.free(handle);
    }

    pub fn get_buffer_srv(&self, handle: BufferHandle) -> Option<u32> {
        self.buffers.get(handle)?.srv_index
    }

    pub fn get_buffer_uav(&self, handle: BufferHandle) -> Option<u32> {
        self.buffers.get(handle)?.uav_index
    }

    pub fn get_texture_srv(&self, handle: TextureHandle) -> Option<u32> {
        self.textures.get(handle)?.views.srv
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&BufferResource> {
        self.buffers.get(handle)
    }

    /// Resolves the physical resource a dynamic buffer rotates to for
    /// `frame_index`. A non-dynamic buffer always resolves to its single
    /// instance regardless of `frame_index`. This is the one place the
    /// `N` in "N frames in flight" leaks out of a handle: everywhere else,
    /// callers just hold the `BufferHandle` and this resolves which
    /// physical instance backs it right now.
    pub fn buffer_instance(&self, handle: BufferHandle, frame_index: u64) -> Option<DeviceResourceId> {
        let resource = self.buffers.get(handle)?;
        let slot = if resource.desc.dynamic {
            frame_index as usize % resource.instances.len()
        } else {
            0
        };
        resource.instances.get(slot).copied()
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureResource> {
        self.textures.get(handle)
    }

    pub fn pso(&self, handle: PsoHandle) -> Option<&PsoResource> {
        self.psos.get(handle)
    }

    /// Debug-only check that `handle` is live and carries an SRV. Fatal
    /// (panics) when it fails, naming `ctx` for invalid-handle misuse in
    /// debug builds.
    pub fn validate_buffer_srv(&self, handle: BufferHandle, ctx: &'static str) {
        if cfg!(debug_assertions) {
            match self.buffer(handle) {
                None => panic!("{ctx}: buffer handle is not live"),
                Some(resource) if resource.srv_index.is_none() => {
                    panic!("{ctx}: buffer has no SRV")
                }
                Some(_) => {}
            }
        }
    }

    pub fn validate_texture_srv(&self, handle: TextureHandle, ctx: &'static str) {
        if cfg!(debug_assertions) {
            match self.texture(handle) {
                None => panic!("{ctx}: texture handle is not live"),
                Some(resource) if resource.views.srv.is_none() => {
                    panic!("{ctx}: texture has no SRV")
                }
                Some(_) => {}
            }
        }
    }
}
