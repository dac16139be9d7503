//! Recording mock of the LCD peripheral, shared by the integration tests.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use lcd_mux::lcd_mux::{DmaArena, DmaDescriptor, LaneId};
use lcd_mux::peripheral::LcdPeripheral;

/// What the peripheral was asked to send.
#[derive(Clone, Debug)]
pub struct Transfer {
    pub payload: Vec<u8>,
    pub descriptors: Vec<DmaDescriptor>,
    /// Concatenation of the segments the descriptor chain points at.
    pub streamed: Vec<u8>,
}

/// Host stand-in for the LCD peripheral.
///
/// Memory comes from leaked boxes filled with `0xAA`, so anything the arena forgets to
/// initialize shows up. Transfers finish immediately unless the mock is built with
/// [`RecordingLcd::manual`].
#[derive(Debug, Default)]
pub struct RecordingLcd {
    pub allocation_limit: Option<usize>,
    pub short_by: usize,
    pub manual_completion: bool,
    pub busy: bool,
    pub cell_clock_hz: Option<u32>,
    pub allocations: Vec<usize>,
    pub freed: Vec<usize>,
    pub connected: Vec<(u8, LaneId)>,
    pub disconnected: Vec<u8>,
    pub transfers: Vec<Transfer>,
}

impl RecordingLcd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfers stay in flight until [`finish_transfer`](Self::finish_transfer).
    pub fn manual() -> Self {
        Self {
            manual_completion: true,
            ..Self::default()
        }
    }

    /// Refuses allocations larger than `limit` bytes.
    pub fn with_allocation_limit(limit: usize) -> Self {
        Self {
            allocation_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Hands out regions `short_by` bytes smaller than requested.
    pub fn short_regions(short_by: usize) -> Self {
        Self {
            short_by,
            ..Self::default()
        }
    }

    pub fn finish_transfer(&mut self) {
        self.busy = false;
    }

    pub fn last_transfer(&self) -> &Transfer {
        self.transfers.last().expect("a transfer was started")
    }
}

impl LcdPeripheral for RecordingLcd {
    fn allocate_dma(&mut self, size: usize) -> Option<&'static mut [u8]> {
        self.allocations.push(size);
        if self.allocation_limit.is_some_and(|limit| size > limit) {
            return None;
        }
        let len = size.saturating_sub(self.short_by);
        Some(Box::leak(vec![0xAA; len].into_boxed_slice()))
    }

    fn set_cell_clock(&mut self, hz: u32) {
        self.cell_clock_hz = Some(hz);
    }

    fn free_dma(&mut self, region: &'static mut [u8]) {
        self.freed.push(region.len());
    }

    fn connect_lane(&mut self, pin: u8, lane: LaneId) {
        self.connected.push((pin, lane));
    }

    fn disconnect_lane(&mut self, pin: u8) {
        self.connected.retain(|(connected_pin, _)| *connected_pin != pin);
        self.disconnected.push(pin);
    }

    fn start_transfer(&mut self, arena: &DmaArena) {
        assert!(!self.busy, "transfer started while another was in flight");
        let descriptors: Vec<DmaDescriptor> = arena.descriptors().collect();
        let streamed = descriptors
            .iter()
            .flat_map(|descriptor| arena.segment(descriptor).iter().copied())
            .collect();
        self.transfers.push(Transfer {
            payload: arena.payload().to_vec(),
            descriptors,
            streamed,
        });
        self.busy = self.manual_completion;
    }

    fn is_transfer_done(&self) -> bool {
        !self.busy
    }
}
