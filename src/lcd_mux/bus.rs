//! Per-lane handle on a shared mux bus.

use embassy_futures::yield_now;

use super::bus_size::BusSize;
use super::context::MuxContext;
use super::encoder::BitEncoder;
use super::registry::LaneId;
use super::speed::Speed;
use crate::peripheral::LcdPeripheral;
use crate::Result;

/// Write position of one lane inside the shared payload, for one cycle.
///
/// Obtained from [`MuxBus::begin_update`] and advanced by [`MuxBus::fill`].
#[derive(Debug, Eq, PartialEq)]
pub struct FillCursor {
    position: usize,
}

impl FillCursor {
    /// Payload byte the next fill starts at.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }
}

/// One lane of a mux bus.
///
/// Registering claims the lane; dropping the bus waits for any transfer in flight, then gives
/// the lane back (and frees the shared buffer if it was the last lane). Prefer
/// [`close`](Self::close) in async code so the wait yields instead of spinning.
pub struct MuxBus<'c, B: BusSize, P: LcdPeripheral> {
    context: &'c MuxContext<B, P>,
    lane: LaneId,
    encoder: BitEncoder,
    pin: Option<u8>,
}

impl<'c, B: BusSize, P: LcdPeripheral> MuxBus<'c, B, P> {
    /// Claim a lane for a strip of speed class `S` that sends `data_size` bytes per frame.
    ///
    /// # Errors
    ///
    /// [`Error::LanesExhausted`](crate::Error::LanesExhausted) when every lane of the bus is in
    /// use, and [`Error::CellClockMismatch`](crate::Error::CellClockMismatch) when `S` needs a
    /// different cell clock than the lanes already registered.
    pub fn register<S: Speed>(context: &'c MuxContext<B, P>, data_size: usize) -> Result<Self> {
        let lane = context.register_lane(data_size, S::CELL_CLOCK_HZ)?;
        Ok(Self {
            context,
            lane,
            encoder: BitEncoder::new::<B, S>(),
            pin: None,
        })
    }

    /// Build the shared buffer (if no lane has yet) and route `pin` to this lane.
    ///
    /// # Errors
    ///
    /// [`Error::DmaAllocation`](crate::Error::DmaAllocation) if the shared buffer cannot be
    /// allocated. The pin stays unconnected.
    pub fn initialize(&mut self, pin: u8) -> Result<()> {
        self.context.construct()?;
        if let Some(old_pin) = self.pin.replace(pin) {
            self.context.with_peripheral(|lcd| lcd.disconnect_lane(old_pin));
        }
        self.context.connect_lane(pin, self.lane);
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has connected a pin.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.pin.is_some()
    }

    /// The lane this handle owns.
    #[must_use]
    pub const fn lane(&self) -> LaneId {
        self.lane
    }

    /// The connected output pin, once initialized.
    #[must_use]
    pub const fn pin(&self) -> Option<u8> {
        self.pin
    }

    /// Encode tables for this lane's speed class.
    #[must_use]
    pub const fn encoder(&self) -> &BitEncoder {
        &self.encoder
    }

    /// The shared context.
    #[must_use]
    pub const fn context(&self) -> &'c MuxContext<B, P> {
        self.context
    }

    /// Whether this lane may write its next frame.
    ///
    /// False while a transfer is in flight, and also while this lane has already written its
    /// frame and other lanes have not; filling again then would OR two frames together.
    #[must_use]
    pub fn is_write_done(&self) -> bool {
        self.context.is_lane_ready(self.lane)
    }

    /// Yield until [`is_write_done`](Self::is_write_done).
    pub async fn wait_write_done(&self) {
        while !self.is_write_done() {
            yield_now().await;
        }
    }

    /// Start writing this lane's frame for the current cycle.
    ///
    /// The first lane of a cycle clears the payload.
    pub fn begin_update(&self) -> FillCursor {
        self.context.reset_buffer_for_cycle();
        FillCursor { position: 0 }
    }

    /// Encode `data` into this lane at the cursor and advance it.
    pub fn fill(&self, cursor: &mut FillCursor, data: &[u8]) {
        cursor.position = self
            .context
            .fill(cursor.position, data, self.lane, &self.encoder);
    }

    /// Finish this lane's frame.
    ///
    /// Returns whether this was the last lane missing, so the transfer started.
    pub fn end_update(&self) -> bool {
        self.context.complete_lane(self.lane)
    }

    /// Wait for any transfer in flight, then release the lane.
    pub async fn close(self) {
        while !self.context.is_transfer_done() {
            yield_now().await;
        }
        // Drop finds the transfer done and releases without spinning.
    }
}

impl<B: BusSize, P: LcdPeripheral> Drop for MuxBus<'_, B, P> {
    fn drop(&mut self) {
        while !self.context.is_transfer_done() {
            core::hint::spin_loop();
        }
        self.context.release_lane(self.lane, self.pin.take());
    }
}
