//! Sort-key ordered draw-packet buffer for batch submission.
//!
//! Scenes with thousands of opaque meshes pay per-draw state-change
//! overhead if submitted as isolated `draw` calls. Instead, callers fill a
//! flat array of fixed-size packets plus a parallel array of `u32` sort
//! keys; [`submit`] radix-sorts the keys, walks the resulting order, and
//! only rebinds PSO/parameter state when it differs from the previous
//! packet. Draws themselves are indirect: each packet names an
//! indirect-args buffer and offset rather than literal vertex/index counts,
//! so the GPU reads per-draw counts out of a buffer the caller already
//! populated (e.g. from a culling compute pass) instead of the CPU needing
//! to know them.

use crate::command::{CommandList, ParamSlot};
use crate::resource::{BufferHandle, PsoHandle};

/// One instruction: "draw this with these parameters".
#[derive(Copy, Clone, Debug)]
pub struct DrawPacket {
    pub pso: PsoHandle,
    pub indirect_args_buffer: BufferHandle,
    pub indirect_args_offset: u32,
    pub index_buffer: BufferHandle,
    /// Byte offset into the frame's per-draw push-constant storage (the
    /// buffer arena), distinct from `param_block_indices`: this carries the
    /// literal per-draw constant payload itself rather than an index into a
    /// separately-uploaded parameter buffer.
    pub push_constant_offset: u32,
    /// Indices into a caller-supplied parameter buffer, one per parameter
    /// block (draw/pass/view in that order).
    pub param_block_indices: [u32; 3],
}

/// 8-bit LSD radix sort over `keys`, permuting `indices` (initially
/// `0..keys.len()`) in lockstep. Stable, so packets sharing a key keep
/// their relative submission order.
pub(crate) fn radix_sort_u32(keys: &mut [u32], indices: &mut [u32]) {
    let len = keys.len();
    if len <= 1 {
        return;
    }
    let mut key_scratch = vec![0u32; len];
    let mut index_scratch = vec![0u32; len];

    for pass in 0..4 {
        let shift = pass * 8;
        let mut counts = [0u32; 256];
        for &k in keys.iter() {
            counts[((k >> shift) & 0xFF) as usize] += 1;
        }
        let mut offsets = [0u32; 256];
        let mut sum = 0u32;
        for bucket in 0..256 {
            offsets[bucket] = sum;
            sum += counts[bucket];
        }
        for i in 0..len {
            let k = keys[i];
            let bucket = ((k >> shift) & 0xFF) as usize;
            let dest = offsets[bucket] as usize;
            key_scratch[dest] = k;
            index_scratch[dest] = indices[i];
            offsets[bucket] += 1;
        }
        keys.copy_from_slice(&key_scratch);
        indices.copy_from_slice(&index_scratch);
    }
}

/// Sorts `packets` by `keys` via radix sort and records one
/// `draw_indexed_indirect`/state-rebind sequence per packet into `list`,
/// caching state so only actual changes from the previous packet re-bind.
pub fn submit(list: &mut CommandList, packets: &[DrawPacket], keys: &[u32]) {
    assert_eq!(packets.len(), keys.len());
    if packets.is_empty() {
        return;
    }

    let mut sorted_keys = keys.to_vec();
    let mut order: Vec<u32> = (0..packets.len() as u32).collect();
    radix_sort_u32(&mut sorted_keys, &mut order);

    let mut bound_pso: Option<PsoHandle> = None;
    let mut bound_params: Option<[u32; 4]> = None;

    for &i in &order {
        let packet = &packets[i as usize];

        if bound_pso != Some(packet.pso) {
            list.set_pso(packet.pso);
            bound_pso = Some(packet.pso);
        }
        let params = [
            packet.param_block_indices[0],
            packet.param_block_indices[1],
            packet.param_block_indices[2],
            packet.push_constant_offset,
        ];
        if bound_params != Some(params) {
            let bytes: Vec<u8> = params.iter().flat_map(|i| i.to_ne_bytes()).collect();
            list.set_parameters(ParamSlot::Draw, &bytes);
            bound_params = Some(params);
        }

        list.draw_indexed_indirect(
            packet.index_buffer,
            packet.indirect_args_buffer,
            packet.indirect_args_offset,
        );
    }
}
