use derive_more::{Display, Error};

/// Errors reported by the mux engine and the strip drivers built on it.
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Every lane of the bus is already registered. The strip cannot be driven.
    #[display("all {capacity} lanes of the mux bus are in use")]
    LanesExhausted {
        /// Number of lanes the bus size class provides.
        capacity: u8,
    },

    /// DMA-capable memory for the shared transmit buffer could not be obtained.
    ///
    /// No transfer can run on this bus until memory is freed and
    /// [`MuxContext::construct`](crate::lcd_mux::MuxContext::construct) is retried.
    #[display("failed to allocate {size} bytes of DMA-capable memory")]
    DmaAllocation {
        /// Bytes requested.
        size: usize,
    },

    /// A strip needs a different cell clock than the strips already on the bus.
    ///
    /// The clock is shared by every lane, so speed classes with different clocks
    /// (such as [`Ws2811`](crate::lcd_mux::Ws2811) and [`Ws2812x`](crate::lcd_mux::Ws2812x))
    /// need separate buses.
    #[display("strip needs a {strip_hz} Hz cell clock but the bus runs at {bus_hz} Hz")]
    CellClockMismatch {
        /// Clock of the strips already registered.
        bus_hz: u32,
        /// Clock the refused strip needs.
        strip_hz: u32,
    },

    /// The strip was updated before [`MuxStrip::initialize`](crate::led_strip::MuxStrip::initialize).
    #[display("strip updated before initialize")]
    NotInitialized,

    /// A [`lcd_mux!`](crate::lcd_mux!) singleton was initialized more than once.
    #[display("mux context already initialized")]
    ContextAlreadyInitialized,
}

/// Result type used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
