//! Protocol speed classes: bit waveforms and timing of the LED chips.

use super::bus_size::CELLS_PER_BIT;

/// A protocol speed class.
///
/// The cell patterns are given in wire (time) order; `true` drives the line high for that cell.
pub trait Speed {
    /// Time to send one byte, in microseconds.
    const BYTE_SEND_TIME_US: u16;

    /// Low time the chips need to latch a frame, in microseconds.
    const RESET_TIME_US: u16;

    /// Cell clock the peripheral must run at for the patterns below to meet the protocol timing.
    ///
    /// The clock is per bus: every strip on one context must share it.
    const CELL_CLOCK_HZ: u32 = 2_400_000;

    /// Waveform of a 0 bit: short high, long low.
    const ZERO_CELLS: [bool; CELLS_PER_BIT] = [true, false, false, false];

    /// Waveform of a 1 bit: long high, short low.
    const ONE_CELLS: [bool; CELLS_PER_BIT] = [true, true, true, false];

    /// Zero bytes appended to every lane's frame so the line stays low for the reset time.
    const RESET_PADDING_BYTES: usize =
        match Self::RESET_TIME_US.checked_div(Self::BYTE_SEND_TIME_US) {
            Some(bytes) => bytes as usize,
            None => 0,
        };
}

/// WS2812/WS2812B/WS2813 and compatibles (800 kHz, 300 µs latch).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Ws2812x;

impl Speed for Ws2812x {
    const BYTE_SEND_TIME_US: u16 = 10;
    const RESET_TIME_US: u16 = 300;
}

/// SK6812 (800 kHz, 80 µs latch).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Sk6812;

impl Speed for Sk6812 {
    const BYTE_SEND_TIME_US: u16 = 10;
    const RESET_TIME_US: u16 = 80;
}

/// WS2811 in 400 kHz mode. Runs the bus at half the usual cell rate, so it cannot share a bus
/// with the 800 kHz classes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Ws2811;

impl Speed for Ws2811 {
    const BYTE_SEND_TIME_US: u16 = 20;
    const RESET_TIME_US: u16 = 300;
    const CELL_CLOCK_HZ: u32 = 1_200_000;
}
