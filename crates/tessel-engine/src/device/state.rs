//! Context-global binding state and the host-side rules the wgpu backend
//! applies before touching the device.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::api::{AttributePointer, AttributeSlot, BufferId, BufferUsage, ProgramId, TextureId};
use super::linked::VertexStream;

/// Smallest allocation for a streamed vertex buffer.
pub(crate) const MIN_STREAM_CAPACITY: u64 = 256;

#[derive(Debug, Default)]
pub(crate) struct BindState {
    pub program: Option<ProgramId>,
    pub units: HashMap<u32, TextureId>,
    pub pointers: BTreeMap<AttributeSlot, (BufferId, AttributePointer)>,
    pub enabled: BTreeSet<AttributeSlot>,
}

impl BindState {
    /// Groups enabled attribute pointers by source buffer, in slot order.
    ///
    /// Every enabled slot needs a pointer, and all attributes read from one
    /// buffer must agree on its stride.
    pub fn vertex_streams(&self) -> Result<Vec<VertexStream>, String> {
        let mut streams: Vec<VertexStream> = Vec::new();
        for slot in &self.enabled {
            let Some((buffer, pointer)) = self.pointers.get(slot) else {
                return Err(format!("attribute {} is enabled without a pointer", slot.0));
            };
            match streams.iter_mut().find(|s| s.buffer == *buffer) {
                Some(stream) if stream.stride != pointer.stride => {
                    return Err(format!(
                        "attribute {} uses stride {} but buffer {} is already read with stride {}",
                        slot.0,
                        pointer.stride,
                        buffer.raw(),
                        stream.stride
                    ));
                }
                Some(stream) => stream
                    .attributes
                    .push((*slot, pointer.format, pointer.offset)),
                None => streams.push(VertexStream {
                    buffer: *buffer,
                    stride: pointer.stride,
                    attributes: vec![(*slot, pointer.format, pointer.offset)],
                }),
            }
        }
        Ok(streams)
    }

    /// Drops every pointer into `buffer`.
    pub fn forget_buffer(&mut self, buffer: BufferId) {
        self.pointers.retain(|_, (b, _)| *b != buffer);
    }

    pub fn forget_texture(&mut self, texture: TextureId) {
        self.units.retain(|_, t| *t != texture);
    }
}

/// Upload size rounded up to the copy alignment.
pub(crate) fn padded_len(len: usize) -> u64 {
    (len as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
}

/// New capacity for a buffer receiving `padded` bytes, or `None` when the
/// current allocation already fits.
///
/// Dynamic buffers are sized exactly; streamed ones grow to the next power
/// of two so per-frame uploads settle on one allocation.
pub(crate) fn grown_capacity(capacity: u64, padded: u64, usage: BufferUsage) -> Option<u64> {
    if padded <= capacity {
        return None;
    }
    Some(match usage {
        BufferUsage::Dynamic => padded,
        BufferUsage::Stream => padded.next_power_of_two().max(MIN_STREAM_CAPACITY),
    })
}

/// Bytes a draw of `count` 16-bit indices reads from a buffer holding
/// `available` bytes.
pub(crate) fn index_bytes(available: u64, count: u32, buffer: BufferId) -> Result<u64, String> {
    let needed = u64::from(count) * 2;
    if needed > available {
        return Err(format!(
            "draw of {count} indices reads past the {available} bytes in buffer {}",
            buffer.raw()
        ));
    }
    Ok(needed)
}
