//! The per-bus shared state: lane registry, DMA arena and peripheral, behind one lock.

use core::cell::RefCell;
use core::marker::PhantomData;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};

use super::arena::{ArenaLayout, DmaArena};
use super::bus_size::BusSize;
use super::encoder::BitEncoder;
use super::registry::{LaneId, LaneRegistry};
use crate::peripheral::LcdPeripheral;
use crate::{Error, Result};

struct ContextState<P> {
    registry: LaneRegistry,
    cell_clock_hz: Option<u32>,
    arena: Option<DmaArena>,
    peripheral: P,
}

/// Shared transmit buffer manager for one bus.
///
/// Owns the lane registry, the DMA arena (while any lane is using it) and the peripheral. Each
/// [`MuxBus`](super::MuxBus) borrows the context; firmware usually gets a `&'static` one from
/// [`lcd_mux!`](crate::lcd_mux!).
///
/// Every method takes the lock for a short, non-suspending critical section.
pub struct MuxContext<B: BusSize, P: LcdPeripheral> {
    state: Mutex<CriticalSectionRawMutex, RefCell<ContextState<P>>>,
    bus_size: PhantomData<fn() -> B>,
}

impl<B: BusSize, P: LcdPeripheral> MuxContext<B, P> {
    /// Context for `peripheral` with no lanes and no buffer.
    #[must_use]
    pub const fn new(peripheral: P) -> Self {
        Self {
            state: Mutex::new(RefCell::new(ContextState {
                registry: LaneRegistry::for_bus::<B>(),
                cell_clock_hz: None,
                arena: None,
                peripheral,
            })),
            bus_size: PhantomData,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ContextState<P>) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Claim a lane for a strip sending `data_size` bytes per frame at `cell_clock_hz`.
    ///
    /// The first lane sets the bus clock; later lanes must match it. Must happen before
    /// [`construct`](Self::construct); a buffer built earlier is not grown.
    ///
    /// # Errors
    ///
    /// [`Error::CellClockMismatch`] if other lanes run at a different clock, and
    /// [`Error::LanesExhausted`] when every lane is in use.
    pub fn register_lane(&self, data_size: usize, cell_clock_hz: u32) -> Result<LaneId> {
        self.with_state(|state| {
            if state.registry.lane_count() == 0 {
                state.cell_clock_hz = None;
            }
            if let Some(bus_hz) = state.cell_clock_hz {
                if bus_hz != cell_clock_hz {
                    error!(
                        "lane refused: needs {} Hz, bus runs at {} Hz",
                        cell_clock_hz, bus_hz
                    );
                    return Err(Error::CellClockMismatch {
                        bus_hz,
                        strip_hz: cell_clock_hz,
                    });
                }
            }
            let lane = state
                .registry
                .register_lane(data_size)
                .ok_or(Error::LanesExhausted { capacity: B::LANES })?;
            state.cell_clock_hz = Some(cell_clock_hz);
            if let Some(arena) = &state.arena {
                let needed = ArenaLayout::for_lane_data::<B>(data_size).payload_len();
                if needed > arena.layout().payload_len() {
                    warn!(
                        "lane {} registered after the buffer was built; frame will be cut short",
                        lane.index()
                    );
                }
            }
            Ok(lane)
        })
    }

    /// Build the shared buffer, sized for the largest lane registered so far.
    ///
    /// Does nothing if the buffer already exists.
    ///
    /// # Errors
    ///
    /// [`Error::DmaAllocation`] if the peripheral cannot supply enough DMA-capable memory.
    pub fn construct(&self) -> Result<()> {
        self.with_state(|state| {
            if state.arena.is_some() {
                return Ok(());
            }
            let layout = ArenaLayout::for_lane_data::<B>(state.registry.max_lane_data_size());
            let size = layout.alloc_size();
            if let Some(hz) = state.cell_clock_hz {
                state.peripheral.set_cell_clock(hz);
            }
            let Some(region) = state.peripheral.allocate_dma(size) else {
                error!("send buffer memory allocation failure (size {})", size);
                return Err(Error::DmaAllocation { size });
            };
            match DmaArena::new(region, layout) {
                Ok(arena) => {
                    info!(
                        "send buffer built: {} payload bytes, {} descriptors",
                        layout.payload_len(),
                        layout.descriptor_count()
                    );
                    state.arena = Some(arena);
                    Ok(())
                }
                Err(region) => {
                    error!(
                        "send buffer too small ({} of {} bytes)",
                        region.len(),
                        size
                    );
                    state.peripheral.free_dma(region);
                    Err(Error::DmaAllocation { size })
                }
            }
        })
    }

    /// Free the shared buffer and forget every lane.
    ///
    /// Only valid once the last lane has been released; with lanes still registered this logs
    /// an error and changes nothing.
    pub fn destruct(&self) {
        self.with_state(|state| {
            if state.registry.lane_count() != 0 {
                error!(
                    "send buffer destruct with {} lanes registered",
                    state.registry.lane_count()
                );
                return;
            }
            if let Some(arena) = state.arena.take() {
                state.peripheral.free_dma(arena.into_region());
                info!("send buffer freed");
            }
            state.registry.reset();
            state.cell_clock_hz = None;
        });
    }

    /// Zero the payload if this is the first lane to fill in the current cycle.
    ///
    /// Returns whether the payload was cleared.
    pub fn reset_buffer_for_cycle(&self) -> bool {
        self.with_state(|state| {
            if !state.registry.no_lanes_complete() {
                return false;
            }
            state.arena.as_mut().is_some_and(|arena| {
                arena.clear_payload();
                true
            })
        })
    }

    /// OR `data` into the payload on `lane` at payload byte `offset`.
    ///
    /// Returns the offset just past the data. Data past the end of the payload is dropped.
    pub fn fill(&self, offset: usize, data: &[u8], lane: LaneId, encoder: &BitEncoder) -> usize {
        self.with_state(|state| {
            let Some(arena) = state.arena.as_mut() else {
                return offset.saturating_add(encoder.encoded_len(data.len()));
            };
            let payload = arena.payload_mut();
            let end = encoder.encode(payload, offset, data, lane);
            if end > payload.len() {
                warn!(
                    "lane {} fill past end of send buffer ({} > {})",
                    lane.index(),
                    end,
                    payload.len()
                );
            }
            end
        })
    }

    /// Start the transfer if every registered lane has filled the buffer.
    ///
    /// Returns whether a transfer was started.
    pub fn trigger_transfer_if_ready(&self) -> bool {
        self.with_state(Self::trigger_locked)
    }

    /// Mark `lane` as done filling and start the transfer if it was the last one missing.
    ///
    /// Returns whether a transfer was started.
    pub fn complete_lane(&self, lane: LaneId) -> bool {
        self.with_state(|state| {
            state.registry.mark_lane_complete(lane);
            Self::trigger_locked(state)
        })
    }

    fn trigger_locked(state: &mut ContextState<P>) -> bool {
        let ContextState {
            registry,
            arena,
            peripheral,
            ..
        } = state;
        if registry.lane_count() == 0 || !registry.all_lanes_complete() {
            return false;
        }
        registry.reset_completion();
        let Some(arena) = arena.as_ref() else {
            warn!("all lanes complete but no send buffer");
            return false;
        };
        peripheral.start_transfer(arena);
        trace!("transfer started ({} lanes)", registry.lane_count());
        true
    }

    /// Route `pin` to `lane`.
    pub fn connect_lane(&self, pin: u8, lane: LaneId) {
        self.with_state(|state| state.peripheral.connect_lane(pin, lane));
    }

    /// Give `lane` back, detaching `pin` if it was connected.
    ///
    /// Mid-cycle, the lane's bits are wiped from the payload so a strip that later gets the same
    /// lane starts from a clean line. Releasing the last lane frees the buffer. Otherwise, if
    /// every remaining lane was only waiting on this one, their transfer starts now.
    pub fn release_lane(&self, lane: LaneId, pin: Option<u8>) {
        let was_last = self.with_state(|state| {
            if let Some(pin) = pin {
                state.peripheral.disconnect_lane(pin);
            }
            if state.registry.is_lane_active(lane) && !state.registry.no_lanes_complete() {
                if let Some(arena) = state.arena.as_mut() {
                    arena.clear_lane::<B>(lane);
                }
            }
            let was_last = state.registry.deregister_lane(lane);
            if !was_last {
                Self::trigger_locked(state);
            }
            was_last
        });
        if was_last {
            self.destruct();
        }
    }

    /// Whether the hardware has no transfer in flight.
    #[must_use]
    pub fn is_transfer_done(&self) -> bool {
        self.with_state(|state| state.peripheral.is_transfer_done())
    }

    /// Whether `lane` may fill the buffer now: no transfer is in flight and the lane has not
    /// already filled for the pending cycle.
    #[must_use]
    pub fn is_lane_ready(&self, lane: LaneId) -> bool {
        self.with_state(|state| {
            state.peripheral.is_transfer_done() && !state.registry.is_lane_complete(lane)
        })
    }

    /// Whether the shared buffer exists.
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.with_state(|state| state.arena.is_some())
    }

    /// Bytes requested for the current buffer, or `0` without one.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.with_state(|state| {
            state
                .arena
                .as_ref()
                .map_or(0, |arena| arena.layout().alloc_size())
        })
    }

    /// Run `f` on the buffer, if there is one.
    pub fn with_arena<R>(&self, f: impl FnOnce(Option<&DmaArena>) -> R) -> R {
        self.with_state(|state| f(state.arena.as_ref()))
    }

    /// Run `f` on the lane registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&LaneRegistry) -> R) -> R {
        self.with_state(|state| f(&state.registry))
    }

    /// Run `f` on the peripheral.
    pub fn with_peripheral<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        self.with_state(|state| f(&mut state.peripheral))
    }
}
