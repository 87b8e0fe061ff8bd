use crate::value::ValueKind;
use bytemuck::{Pod, Zeroable};

const FLOATS_PER_CHUNK: usize = 16;

/// Raw slot storage backing a result buffer.
///
/// This container provides a few guarantees:
/// 1. The buffer is aligned to 64 bytes and padded to a multiple of
///    64 bytes, so a matrix slot never straddles more cache lines than
///    necessary.
/// 2. All values are initialized to zero, including padding. A slot
///    still reads as unwritten until `write` is called for it.
#[derive(Debug, Default)]
pub struct Storage {
    buffer: Vec<PaddedChunk>,
    slots: Vec<SlotInfo>,
    /// Number of floats in use, excluding padding.
    len: usize,
}

#[derive(Copy, Clone, Debug)]
pub struct SlotInfo {
    pub kind: ValueKind,
    offset: usize,
    written: bool,
}

impl Storage {
    pub fn new(layout: &[ValueKind]) -> Self {
        let mut storage = Self::default();
        for &kind in layout {
            storage.push_slot(kind);
        }
        storage
    }

    /// Appends a slot of the given kind, returning its index.
    pub fn push_slot(&mut self, kind: ValueKind) -> u32 {
        let index = u32::try_from(self.slots.len()).expect("too many slots in one buffer");
        self.slots.push(SlotInfo {
            kind,
            offset: self.len,
            written: false,
        });
        self.len += kind.width();

        let num_chunks = self.len.div_ceil(FLOATS_PER_CHUNK);
        if num_chunks > self.buffer.len() {
            self.buffer.resize(num_chunks, PaddedChunk::zeroed());
        }
        index
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, slot: u32) -> Option<&SlotInfo> {
        self.slots.get(slot as usize)
    }

    /// Returns the contents of a slot, or `None` if it
    /// has not been written yet.
    ///
    /// # Panics
    /// Panics if the slot does not exist.
    pub fn read(&self, slot: u32) -> Option<&[f32]> {
        let info = self.slots[slot as usize];
        info.written
            .then(|| &self.as_f32()[info.offset..info.offset + info.kind.width()])
    }

    /// # Panics
    /// Panics if the slot does not exist or `values` does not
    /// match the width of the slot.
    pub fn write(&mut self, slot: u32, values: &[f32]) {
        let info = &mut self.slots[slot as usize];
        assert_eq!(
            values.len(),
            info.kind.width(),
            "value of width {} written to {:?} slot",
            values.len(),
            info.kind
        );
        info.written = true;
        let range = info.offset..info.offset + values.len();
        self.as_f32_mut()[range].copy_from_slice(values);
    }

    pub fn is_written(&self, slot: u32) -> bool {
        self.slots[slot as usize].written
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_f32(&self) -> &[f32] {
        bytemuck::cast_slice(&self.buffer)
    }

    fn as_f32_mut(&mut self) -> &mut [f32] {
        bytemuck::cast_slice_mut(&mut self.buffer)
    }
}

#[derive(Copy, Clone, Debug, Zeroable, Pod)]
#[repr(C, align(64))]
pub struct PaddedChunk(pub [f32; FLOATS_PER_CHUNK]);
