//! Bus size classes: how many lanes a bus carries and how the peripheral orders its cells.

/// Number of cells each protocol bit expands to.
///
/// At a 2.4 MHz cell clock one cell lasts ~417 ns, so a bit spans the 1.25 µs slot of an
/// 800 kHz protocol.
pub const CELLS_PER_BIT: usize = 4;

/// A bus size class.
///
/// Implementations are zero-sized markers; everything the encoder needs is an associated
/// constant, so encode tables are fixed at compile time.
pub trait BusSize {
    /// Number of lanes (parallel data lines). Also the width of the lane bitmaps.
    const LANES: u8;

    /// Bytes in one cell. A cell holds one bit per lane.
    const CELL_BYTES: usize;

    /// Memory slot of each wire-order cell within a group of [`CELLS_PER_BIT`] cells.
    ///
    /// `WIRE_ORDER[k]` is where the cell the peripheral shifts out `k`-th is stored.
    const WIRE_ORDER: [usize; CELLS_PER_BIT];

    /// Payload bytes produced for each source bit.
    const BYTES_PER_BIT: usize = CELLS_PER_BIT.saturating_mul(Self::CELL_BYTES);
}

/// 8 lanes, one byte per cell, ESP32-S3 `LCD_CAM` ordering.
///
/// The FIFO pops 32-bit words and shifts out the upper half-word first:
///
/// ```text
/// memory bytes  0 1 2 3
/// wire order    2 3 0 1
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Mux8Bit;

impl BusSize for Mux8Bit {
    const LANES: u8 = 8;
    const CELL_BYTES: usize = 1;
    const WIRE_ORDER: [usize; CELLS_PER_BIT] = [2, 3, 0, 1];
}

/// 8 lanes, one byte per cell, bytes swapped inside each half-word (ESP32-S2 I2S ordering).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Mux8BitSwapped;

impl BusSize for Mux8BitSwapped {
    const LANES: u8 = 8;
    const CELL_BYTES: usize = 1;
    const WIRE_ORDER: [usize; CELLS_PER_BIT] = [1, 0, 3, 2];
}

/// 16 lanes, one half-word per cell.
///
/// Same FIFO behavior as [`Mux8Bit`]; with 2-byte cells the upper half-word of each word is
/// simply the next cell.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Mux16Bit;

impl BusSize for Mux16Bit {
    const LANES: u8 = 16;
    const CELL_BYTES: usize = 2;
    const WIRE_ORDER: [usize; CELLS_PER_BIT] = [1, 0, 3, 2];
}
