//! Expands protocol bytes into lane bits of the shared DMA payload.
//!
//! Each source bit becomes [`CELLS_PER_BIT`] cells. A lane owns one bit position inside every
//! cell, so the encoder only ever ORs into the buffer: lanes filled in any order never disturb
//! each other, provided the buffer was cleared at the start of the cycle.

use super::bus_size::{BusSize, CELLS_PER_BIT};
use super::registry::LaneId;
use super::speed::Speed;

/// Per-bus encode tables for one speed class.
///
/// Patterns are held as the little-endian memory image of one bit's cells with the lane at
/// bit 0 of every cell. Shifting left by the lane index moves them to the lane's bit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BitEncoder {
    zero: u64,
    one: u64,
    lane_bits: u64,
    bytes_per_bit: usize,
    lanes: u8,
}

impl BitEncoder {
    /// Encoder for bus class `B` and speed class `S`.
    #[must_use]
    pub const fn new<B: BusSize, S: Speed>() -> Self {
        Self {
            zero: memory_image::<B>(S::ZERO_CELLS),
            one: memory_image::<B>(S::ONE_CELLS),
            lane_bits: memory_image::<B>([true; CELLS_PER_BIT]),
            bytes_per_bit: B::BYTES_PER_BIT,
            lanes: B::LANES,
        }
    }

    /// Memory image of a 0 bit on lane 0.
    #[must_use]
    pub const fn zero_pattern(&self) -> u64 {
        self.zero
    }

    /// Memory image of a 1 bit on lane 0.
    #[must_use]
    pub const fn one_pattern(&self) -> u64 {
        self.one
    }

    /// Payload bytes per source bit.
    #[must_use]
    pub const fn bytes_per_bit(&self) -> usize {
        self.bytes_per_bit
    }

    /// Payload bytes needed for `data_len` source bytes.
    #[must_use]
    pub const fn encoded_len(&self, data_len: usize) -> usize {
        data_len.saturating_mul(8).saturating_mul(self.bytes_per_bit)
    }

    /// OR `data` into `payload` on `lane`, starting at payload byte `offset`, MSB first.
    ///
    /// Returns the offset just past the encoded data. Cells falling outside `payload` are
    /// dropped, so the returned offset may exceed `payload.len()`. Lanes the bus does not have
    /// write nothing.
    pub fn encode(&self, payload: &mut [u8], offset: usize, data: &[u8], lane: LaneId) -> usize {
        let end = offset.saturating_add(self.encoded_len(data.len()));
        if lane.index() >= self.lanes {
            return end;
        }
        let shift = u32::from(lane.index());

        let mut position = offset;
        for &byte in data {
            for bit in (0..8_u32).rev() {
                let pattern = if byte.wrapping_shr(bit) & 1 == 0 { self.zero } else { self.one };
                let next = position.saturating_add(self.bytes_per_bit);
                if let Some(cells) = payload.get_mut(position..next) {
                    let lane_cells = pattern.wrapping_shl(shift).to_le_bytes();
                    for (cell, bits) in cells.iter_mut().zip(lane_cells) {
                        *cell |= bits;
                    }
                }
                position = next;
            }
        }
        end
    }

    /// Read back source byte `byte_index` of `lane` from `payload`.
    ///
    /// A bit reads as 1 only if its cells carry exactly the 1 pattern. Bytes past the end of
    /// `payload` read as 0.
    #[must_use]
    pub fn decode_byte(&self, payload: &[u8], byte_index: usize, lane: LaneId) -> u8 {
        if lane.index() >= self.lanes {
            return 0;
        }
        let shift = u32::from(lane.index());
        let start = byte_index.saturating_mul(8).saturating_mul(self.bytes_per_bit);

        let mut value = 0_u8;
        for bit in 0..8_usize {
            let from = start.saturating_add(bit.saturating_mul(self.bytes_per_bit));
            let Some(cells) = payload.get(from..from.saturating_add(self.bytes_per_bit)) else {
                return 0;
            };
            let mut image = [0_u8; 8];
            for (dst, src) in image.iter_mut().zip(cells) {
                *dst = *src;
            }
            let lane_image = u64::from_le_bytes(image).wrapping_shr(shift) & self.lane_bits;
            value = value.wrapping_shl(1) | u8::from(lane_image == self.one);
        }
        value
    }

    /// Read back `out.len()` source bytes of `lane`, starting with the first byte of the frame.
    pub fn decode(&self, payload: &[u8], lane: LaneId, out: &mut [u8]) {
        for (index, byte) in out.iter_mut().enumerate() {
            *byte = self.decode_byte(payload, index, lane);
        }
    }
}

/// Lane-0 memory image of one bit's cells, given in wire order.
#[expect(
    clippy::cast_possible_truncation,
    reason = "cell bit positions are below 64"
)]
const fn memory_image<B: BusSize>(cells: [bool; CELLS_PER_BIT]) -> u64 {
    let mut image = 0_u64;
    let mut cells: &[bool] = &cells;
    let mut slots: &[usize] = &B::WIRE_ORDER;
    while let ([high, rest_cells @ ..], [slot, rest_slots @ ..]) = (cells, slots) {
        if *high {
            let bit = slot.saturating_mul(B::CELL_BYTES).saturating_mul(8);
            if let Some(cell_bit) = 1_u64.checked_shl(bit as u32) {
                image |= cell_bit;
            }
        }
        cells = rest_cells;
        slots = rest_slots;
    }
    image
}
