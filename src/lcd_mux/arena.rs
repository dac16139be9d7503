//! The shared DMA region: a descriptor chain followed by the encoded payload.
//!
//! ```text
//! region  | descriptor 0 | descriptor 1 | ... | pad (0..=3) | payload ............ |
//!                |               |                           ^
//!                +---------------|---- buffer_offset --------+
//!                                +---- buffer_offset --------------> segment 1
//! ```
//!
//! Descriptors are stored in the hardware's 12-byte layout. Buffer and link fields hold byte
//! offsets from the start of the region; the peripheral adds the region's base address when it
//! hands the chain to the engine.

use core::ops::Range;

use super::bus_size::BusSize;
use super::registry::LaneId;

/// Largest segment one descriptor may cover: the 12-bit length field's 4095, rounded down to a
/// multiple of 4.
pub const MAX_SEGMENT_LEN: usize = 4092;

/// Bytes per descriptor in the region.
pub const DESCRIPTOR_SIZE: usize = 12;

/// Alignment of the payload start.
pub const PAYLOAD_ALIGN: usize = 4;

/// Who may touch the segment a descriptor points at.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DescriptorOwner {
    /// The CPU may write the segment.
    Cpu,
    /// The DMA engine may read the segment.
    Dma,
}

/// One link of the descriptor chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaDescriptor {
    /// Buffer size in bytes (12 bits).
    pub size: u16,
    /// Valid bytes in the buffer (12 bits).
    pub length: u16,
    /// Set on the last descriptor of the chain.
    pub suc_eof: bool,
    /// Owner of the segment.
    pub owner: DescriptorOwner,
    /// Region offset of the segment this descriptor covers.
    pub buffer_offset: u32,
    /// Region offset of the next descriptor, or `0` at the end of the chain.
    pub next_offset: u32,
}

impl DmaDescriptor {
    const FIELD_MASK: u32 = 0x0FFF;

    /// First word in the hardware layout: size, length, `suc_eof`, owner.
    #[must_use]
    pub fn control_word(&self) -> u32 {
        let owner: u32 = match self.owner {
            DescriptorOwner::Cpu => 0,
            DescriptorOwner::Dma => 1,
        };
        (u32::from(self.size) & Self::FIELD_MASK)
            | (u32::from(self.length) & Self::FIELD_MASK).wrapping_shl(12)
            | u32::from(self.suc_eof).wrapping_shl(30)
            | owner.wrapping_shl(31)
    }

    /// Index of the next descriptor in the table, or `None` at the end of the chain.
    #[must_use]
    pub fn next_index(&self) -> Option<usize> {
        if self.next_offset == 0 {
            return None;
        }
        usize::try_from(self.next_offset)
            .ok()?
            .checked_div(DESCRIPTOR_SIZE)
    }

    /// The descriptor as the engine reads it: three little-endian words.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut bytes = [0_u8; DESCRIPTOR_SIZE];
        let words = [self.control_word(), self.buffer_offset, self.next_offset];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// Inverse of [`to_bytes`](Self::to_bytes).
    #[must_use]
    pub fn from_bytes(bytes: [u8; DESCRIPTOR_SIZE]) -> Self {
        let mut words = [0_u32; 3];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            let mut le = [0_u8; 4];
            le.copy_from_slice(chunk);
            *word = u32::from_le_bytes(le);
        }
        let [control, buffer_offset, next_offset] = words;
        Self {
            size: twelve_bits(control),
            length: twelve_bits(control.wrapping_shr(12)),
            suc_eof: control.wrapping_shr(30) & 1 == 1,
            owner: if control.wrapping_shr(31) == 1 {
                DescriptorOwner::Dma
            } else {
                DescriptorOwner::Cpu
            },
            buffer_offset,
            next_offset,
        }
    }
}

/// Sizes of the shared region for a given payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArenaLayout {
    payload_len: usize,
    descriptor_count: usize,
}

impl ArenaLayout {
    /// Layout for `payload_len` payload bytes. Always at least one descriptor.
    #[must_use]
    pub const fn for_payload(payload_len: usize) -> Self {
        let descriptor_count = payload_len.div_ceil(MAX_SEGMENT_LEN);
        Self {
            payload_len,
            descriptor_count: if descriptor_count == 0 {
                1
            } else {
                descriptor_count
            },
        }
    }

    /// Layout for a bus of class `B` whose largest lane sends `max_lane_data_size` bytes.
    #[must_use]
    pub const fn for_lane_data<B: BusSize>(max_lane_data_size: usize) -> Self {
        Self::for_payload(
            max_lane_data_size
                .saturating_mul(8)
                .saturating_mul(B::BYTES_PER_BIT),
        )
    }

    /// Encoded payload bytes.
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Descriptors needed to cover the payload.
    #[must_use]
    pub const fn descriptor_count(&self) -> usize {
        self.descriptor_count
    }

    /// Bytes taken by the descriptor table at the start of the region.
    #[must_use]
    pub const fn descriptor_table_len(&self) -> usize {
        self.descriptor_count.saturating_mul(DESCRIPTOR_SIZE)
    }

    /// Bytes to request from the allocator, including worst-case alignment padding.
    #[must_use]
    pub const fn alloc_size(&self) -> usize {
        self.descriptor_table_len()
            .saturating_add(self.payload_len)
            .saturating_add(PAYLOAD_ALIGN.saturating_sub(1))
    }

    /// Payload range covered by descriptor `index`.
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<Range<usize>> {
        if index >= self.descriptor_count {
            return None;
        }
        let start = index.saturating_mul(MAX_SEGMENT_LEN).min(self.payload_len);
        let end = start.saturating_add(MAX_SEGMENT_LEN).min(self.payload_len);
        Some(start..end)
    }
}

/// A DMA region holding a linked descriptor chain over a payload.
#[derive(Debug)]
pub struct DmaArena {
    region: &'static mut [u8],
    layout: ArenaLayout,
    payload_start: usize,
}

impl DmaArena {
    /// Lay out `region`: write the descriptor chain and zero everything else.
    ///
    /// # Errors
    ///
    /// Hands `region` back if it cannot hold `layout` after aligning the payload.
    pub fn new(region: &'static mut [u8], layout: ArenaLayout) -> Result<Self, &'static mut [u8]> {
        let table_len = layout.descriptor_table_len();
        let padding = region
            .get(table_len..)
            .map(|tail| tail.as_ptr().align_offset(PAYLOAD_ALIGN))
            .filter(|padding| *padding < PAYLOAD_ALIGN);
        let Some(payload_start) = padding.and_then(|padding| table_len.checked_add(padding))
        else {
            return Err(region);
        };
        if payload_start.saturating_add(layout.payload_len()) > region.len() {
            return Err(region);
        }

        region.fill(0);
        let mut arena = Self {
            region,
            layout,
            payload_start,
        };
        arena.write_chain();
        Ok(arena)
    }

    fn write_chain(&mut self) {
        let count = self.layout.descriptor_count();
        for index in 0..count {
            let Some(segment) = self.layout.segment(index) else {
                break;
            };
            let length = u16::try_from(segment.len()).unwrap_or(u16::MAX);
            let next = index.saturating_add(1);
            let last = next == count;
            let descriptor = DmaDescriptor {
                size: length,
                length,
                suc_eof: last,
                owner: DescriptorOwner::Dma,
                buffer_offset: region_offset(self.payload_start.saturating_add(segment.start)),
                next_offset: if last {
                    0
                } else {
                    region_offset(next.saturating_mul(DESCRIPTOR_SIZE))
                },
            };
            let slot = index.saturating_mul(DESCRIPTOR_SIZE)..next.saturating_mul(DESCRIPTOR_SIZE);
            if let Some(bytes) = self.region.get_mut(slot) {
                bytes.copy_from_slice(&descriptor.to_bytes());
            }
        }
    }

    /// Sizes this arena was built for.
    #[must_use]
    pub const fn layout(&self) -> &ArenaLayout {
        &self.layout
    }

    /// Address of the region start; add it to descriptor offsets to get bus addresses.
    #[must_use]
    pub fn base_address(&self) -> usize {
        self.region.as_ptr().addr()
    }

    /// Region range of the payload.
    #[must_use]
    pub const fn payload_range(&self) -> Range<usize> {
        self.payload_start..self.payload_start.saturating_add(self.layout.payload_len())
    }

    /// The encoded payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.region.get(self.payload_range()).unwrap_or_default()
    }

    /// The encoded payload, for the encoder to OR into.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let range = self.payload_range();
        self.region.get_mut(range).unwrap_or_default()
    }

    /// Zero the payload. The descriptor chain is left as is.
    pub fn clear_payload(&mut self) {
        self.payload_mut().fill(0);
    }

    /// Zero `lane`'s bit in every cell of the payload, leaving the other lanes' bits alone.
    ///
    /// Cells are `B::CELL_BYTES` little-endian bytes with lane `n` at bit `n`.
    pub fn clear_lane<B: BusSize>(&mut self, lane: LaneId) {
        if lane.index() >= B::LANES {
            return;
        }
        let byte = usize::from(lane.index().wrapping_shr(3));
        let keep = !1_u8.wrapping_shl(u32::from(lane.index() & 7));
        for cell in self.payload_mut().chunks_exact_mut(B::CELL_BYTES) {
            if let Some(bits) = cell.get_mut(byte) {
                *bits &= keep;
            }
        }
    }

    /// Descriptor `index` of the table, decoded.
    #[must_use]
    pub fn descriptor(&self, index: usize) -> Option<DmaDescriptor> {
        let start = index.checked_mul(DESCRIPTOR_SIZE)?;
        let bytes = self.region.get(start..start.checked_add(DESCRIPTOR_SIZE)?)?;
        let mut raw = [0_u8; DESCRIPTOR_SIZE];
        raw.copy_from_slice(bytes);
        Some(DmaDescriptor::from_bytes(raw))
    }

    /// Walk the chain from the first descriptor.
    pub fn descriptors(&self) -> impl Iterator<Item = DmaDescriptor> + '_ {
        let mut next = Some(0);
        let mut remaining = self.layout.descriptor_count();
        core::iter::from_fn(move || {
            remaining = remaining.checked_sub(1)?;
            let descriptor = self.descriptor(next?)?;
            next = descriptor.next_index();
            Some(descriptor)
        })
    }

    /// Bytes `descriptor` points at. Empty if it points outside the region.
    #[must_use]
    pub fn segment(&self, descriptor: &DmaDescriptor) -> &[u8] {
        let Ok(start) = usize::try_from(descriptor.buffer_offset) else {
            return &[];
        };
        self.region
            .get(start..start.saturating_add(usize::from(descriptor.length)))
            .unwrap_or_default()
    }

    /// Give the region back, for returning it to the allocator.
    #[must_use]
    pub fn into_region(self) -> &'static mut [u8] {
        self.region
    }
}

fn twelve_bits(word: u32) -> u16 {
    u16::try_from(word & DmaDescriptor::FIELD_MASK).unwrap_or(u16::MAX)
}

fn region_offset(offset: usize) -> u32 {
    u32::try_from(offset).unwrap_or(u32::MAX)
}
