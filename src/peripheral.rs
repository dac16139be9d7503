//! The hardware side of a mux bus.
//!
//! A [`LcdPeripheral`] owns everything chip specific: DMA-capable memory, routing output pins to
//! data lines, the pixel clock, and the transfer engine. The mux engine only asks it for
//! those services, which keeps the engine testable on the host with a recording mock.

use crate::lcd_mux::{DmaArena, LaneId};

/// A parallel peripheral that clocks N data lines from one DMA stream.
///
/// Implementations are expected to be configured for the bus width before they are handed to a
/// [`MuxContext`](crate::lcd_mux::MuxContext). The context sets the cell clock itself.
pub trait LcdPeripheral {
    /// Allocate `size` bytes of DMA-capable memory.
    ///
    /// Returns `None` when no such memory is left.
    fn allocate_dma(&mut self, size: usize) -> Option<&'static mut [u8]>;

    /// Clock the data lines at `hz` cells per second.
    ///
    /// Called before the shared buffer is built, with the clock of the strips' speed class.
    fn set_cell_clock(&mut self, hz: u32);

    /// Return memory obtained from [`allocate_dma`](Self::allocate_dma).
    fn free_dma(&mut self, region: &'static mut [u8]);

    /// Route output `pin` to data line `lane`.
    fn connect_lane(&mut self, pin: u8, lane: LaneId);

    /// Detach output `pin` from the bus.
    fn disconnect_lane(&mut self, pin: u8);

    /// Stream the arena's payload out by following its descriptor chain.
    ///
    /// Descriptor buffer and link fields are offsets from
    /// [`DmaArena::base_address`].
    fn start_transfer(&mut self, arena: &DmaArena);

    /// Whether no transfer is in flight.
    fn is_transfer_done(&self) -> bool;
}
