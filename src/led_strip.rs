//! A device abstraction for NeoPixel-style (WS2812) LED strips sharing one mux bus.
//!
//! Each [`MuxStrip`] owns one lane of a [`MuxContext`]. Updating a strip waits until the bus is
//! ready for it, encodes its pixels into its lane, and reports whether it was the last strip
//! the shared transfer was waiting on.
//!
//! # Example: Two strips on one bus
//!
//! ```no_run
//! # use lcd_mux::lcd_mux::{DmaArena, LaneId};
//! # use lcd_mux::peripheral::LcdPeripheral;
//! # struct BoardLcd;
//! # impl LcdPeripheral for BoardLcd {
//! #     fn allocate_dma(&mut self, _size: usize) -> Option<&'static mut [u8]> { None }
//! #     fn set_cell_clock(&mut self, _hz: u32) {}
//! #     fn free_dma(&mut self, _region: &'static mut [u8]) {}
//! #     fn connect_lane(&mut self, _pin: u8, _lane: LaneId) {}
//! #     fn disconnect_lane(&mut self, _pin: u8) {}
//! #     fn start_transfer(&mut self, _arena: &DmaArena) {}
//! #     fn is_transfer_done(&self) -> bool { true }
//! # }
//! use lcd_mux::Result;
//! use lcd_mux::led_strip::{Frame1d, Grb, MuxStrip, NoSettings, NoShader, Ws2812x, colors};
//!
//! lcd_mux::lcd_mux! {
//!     Bus0 {
//!         peripheral: BoardLcd, // LCD_CAM in i8080 mode
//!         // bus_size defaults to Mux8Bit
//!     }
//! }
//!
//! async fn example() -> Result<()> {
//!     let context = Bus0::init(BoardLcd)?;
//!
//!     // Register every strip before initializing any, so the shared buffer fits them all.
//!     let mut left = MuxStrip::<Grb, Ws2812x, _, _>::new(context, 4, 48)?;
//!     let mut right = MuxStrip::<Grb, Ws2812x, _, _>::new(context, 5, 60)?;
//!     left.initialize()?;
//!     right.initialize()?;
//!
//!     let mut frame = Frame1d::<48>::new();
//!     for pixel_index in 0..Frame1d::<48>::LEN {
//!         frame[pixel_index] = [colors::BLUE, colors::GRAY][pixel_index % 2];
//!     }
//!     left.update(&frame[..], &NoSettings, &NoShader).await?;
//!     // The transfer carrying both strips starts once `right` has written too.
//!     right.update(&[colors::RED], &NoSettings, &NoShader).await?;
//!
//!     left.close().await;
//!     right.close().await;
//!     Ok(())
//! }
//! ```

mod color;

/// Predefined RGB color constants from the `smart_leds` crate.
///
/// Common colors include `RED`, `GREEN`, `BLUE`, `YELLOW`, `WHITE`, `BLACK`, `CYAN`, `MAGENTA`, `ORANGE`, `PURPLE`.
#[doc(inline)]
pub use smart_leds::colors;

pub use color::{
    ColorFeature, Frame1d, Grb, Grbw, NoSettings, NoShader, Rgb, SEND_DATA_CAPACITY, SendData,
    Shader, wrapped_pixel,
};
pub use crate::lcd_mux::{Sk6812, Speed, Ws2811, Ws2812x};

use core::marker::PhantomData;

use embassy_time::Duration;

use crate::lcd_mux::{BusSize, LaneId, MuxBus, MuxContext};
use crate::peripheral::LcdPeripheral;
use crate::{Error, Result};

// ============================================================================
// MuxStrip - one strip on one lane
// ============================================================================

/// Driver for one LED strip on a lane of a shared mux bus.
///
/// Type parameters: color feature `F`, speed class `S`, bus size class `B`, peripheral `P`.
/// `B` and `P` are usually inferred from the context.
///
/// See the [module documentation](mod@crate::led_strip) for usage.
pub struct MuxStrip<'c, F: ColorFeature, S: Speed, B: BusSize, P: LcdPeripheral> {
    bus: MuxBus<'c, B, P>,
    pin: u8,
    pixel_count: u16,
    strip_kind: PhantomData<fn() -> (F, S)>,
}

impl<'c, F: ColorFeature, S: Speed, B: BusSize, P: LcdPeripheral> MuxStrip<'c, F, S, B, P> {
    /// Bytes one frame of a `pixel_count`-pixel strip takes on its lane, reset time included.
    #[must_use]
    pub const fn data_size(pixel_count: u16) -> usize {
        (pixel_count as usize)
            .saturating_mul(F::PIXEL_SIZE)
            .saturating_add(F::SETTINGS_SIZE)
            .saturating_add(S::RESET_PADDING_BYTES)
    }

    /// Claim a lane on `context` for a strip of `pixel_count` pixels on output `pin`.
    ///
    /// Nothing touches the hardware until [`initialize`](Self::initialize). Create every strip
    /// of a bus before initializing any of them; the shared buffer is sized for the strips
    /// registered at that point.
    ///
    /// # Errors
    ///
    /// [`Error::LanesExhausted`] when the bus has no free lane.
    pub fn new(context: &'c MuxContext<B, P>, pin: u8, pixel_count: u16) -> Result<Self> {
        const {
            assert!(
                F::PIXEL_SIZE <= SEND_DATA_CAPACITY,
                "pixel size exceeds SEND_DATA_CAPACITY"
            );
            assert!(
                F::SETTINGS_SIZE <= SEND_DATA_CAPACITY,
                "settings size exceeds SEND_DATA_CAPACITY"
            );
        }
        let bus = MuxBus::register::<S>(context, Self::data_size(pixel_count))?;
        Ok(Self {
            bus,
            pin,
            pixel_count,
            strip_kind: PhantomData,
        })
    }

    /// Build the shared buffer if needed and connect the pin to this strip's lane.
    ///
    /// # Errors
    ///
    /// [`Error::DmaAllocation`] if the shared buffer cannot be allocated.
    pub fn initialize(&mut self) -> Result<()> {
        self.bus.initialize(self.pin)
    }

    /// Whether [`update`](Self::update) would start writing without waiting.
    #[must_use]
    pub fn is_ready_to_update(&self) -> bool {
        self.bus.is_write_done()
    }

    /// Write one frame.
    ///
    /// Waits until the bus is ready for this strip, then writes front settings, exactly
    /// `pixel_count` pixels (repeating `pixels` from the start if it is shorter; black if it is
    /// empty), each through `shader`, and back settings.
    ///
    /// Returns whether this update completed the cycle and started the shared transfer.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] before [`initialize`](Self::initialize).
    pub async fn update(
        &self,
        pixels: &[F::Color],
        settings: &F::Settings,
        shader: &impl Shader<F::Color>,
    ) -> Result<bool> {
        if !self.bus.is_initialized() {
            return Err(Error::NotInitialized);
        }
        self.bus.wait_write_done().await;

        let mut cursor = self.bus.begin_update();
        let mut send_data = SendData::new();

        F::apply_front_settings(&mut send_data, settings);
        if !send_data.is_empty() {
            self.bus.fill(&mut cursor, &send_data);
        }

        for pixel_index in 0..usize::from(self.pixel_count) {
            let color = shader.apply(wrapped_pixel(pixels, pixel_index, F::BLACK));
            send_data.clear();
            F::apply_pixel_color(&mut send_data, color);
            self.bus.fill(&mut cursor, &send_data);
        }

        send_data.clear();
        F::apply_back_settings(&mut send_data, settings);
        if !send_data.is_empty() {
            self.bus.fill(&mut cursor, &send_data);
        }

        Ok(self.bus.end_update())
    }

    /// Method-level settings. This method has none, so this does nothing.
    pub fn apply_settings(&mut self, _settings: &NoSettings) {}

    /// Time the wire needs for one frame of this strip, reset time included.
    #[must_use]
    pub fn frame_time(&self) -> Duration {
        let micros = Self::data_size(self.pixel_count)
            .saturating_mul(usize::from(S::BYTE_SEND_TIME_US));
        Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
    }

    /// Pixels on the strip.
    #[must_use]
    pub const fn pixel_count(&self) -> u16 {
        self.pixel_count
    }

    /// Output pin of the strip.
    #[must_use]
    pub const fn pin(&self) -> u8 {
        self.pin
    }

    /// Lane the strip was given.
    #[must_use]
    pub const fn lane(&self) -> LaneId {
        self.bus.lane()
    }

    /// Bytes this strip writes into its lane per frame, including reset padding.
    #[must_use]
    pub const fn frame_data_size(&self) -> usize {
        Self::data_size(self.pixel_count)
    }

    /// The lane handle underneath.
    #[must_use]
    pub const fn bus(&self) -> &MuxBus<'c, B, P> {
        &self.bus
    }

    /// Wait for any transfer in flight, then release the lane (and the shared buffer, if this
    /// was the last strip).
    pub async fn close(self) {
        self.bus.close().await;
    }
}
