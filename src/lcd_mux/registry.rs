//! Lane bookkeeping for one mux bus.
//!
//! Two bitmaps track the lanes: `active` (registered) and `complete` (finished filling the
//! shared buffer this cycle). `complete` is always a subset of `active`.

use super::bus_size::BusSize;

/// Widest lane bitmap supported.
pub const MAX_LANES: u8 = 32;

/// One lane of a mux bus.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LaneId(u8);

impl LaneId {
    /// Lane with the given index.
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Index of the lane on the bus. Also its bit position inside each cell.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Bitmap containing only this lane. Empty for indexes past [`MAX_LANES`].
    #[must_use]
    pub const fn mask(self) -> LaneMask {
        match 1_u32.checked_shl(self.0 as u32) {
            Some(bits) => LaneMask(bits),
            None => LaneMask::EMPTY,
        }
    }
}

/// A set of lanes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LaneMask(u32);

impl LaneMask {
    /// No lanes.
    pub const EMPTY: Self = Self(0);

    /// Raw bitmap; bit `k` is lane `k`.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether `lane` is in the set.
    #[must_use]
    pub const fn contains(self, lane: LaneId) -> bool {
        let bit = lane.mask().0;
        bit != 0 && self.0 & bit == bit
    }

    /// The set plus `lane`.
    #[must_use]
    pub const fn with(self, lane: LaneId) -> Self {
        Self(self.0 | lane.mask().0)
    }

    /// The set minus `lane`.
    #[must_use]
    pub const fn without(self, lane: LaneId) -> Self {
        Self(self.0 & !lane.mask().0)
    }

    /// Whether the set has no lanes.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of lanes in the set.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "a u32 has at most 32 ones")]
    pub const fn len(self) -> u8 {
        self.0.count_ones() as u8
    }
}

/// Registry of the lanes in use on one bus.
///
/// Pure bookkeeping. Callers serialize access (the [`MuxContext`](super::MuxContext) keeps it
/// behind its mutex).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaneRegistry {
    capacity: u8,
    active: LaneMask,
    complete: LaneMask,
    max_lane_data_size: usize,
}

impl LaneRegistry {
    /// Empty registry for a bus with `capacity` lanes (at most [`MAX_LANES`]).
    #[must_use]
    pub const fn new(capacity: u8) -> Self {
        let capacity = if capacity > MAX_LANES {
            MAX_LANES
        } else {
            capacity
        };
        Self {
            capacity,
            active: LaneMask::EMPTY,
            complete: LaneMask::EMPTY,
            max_lane_data_size: 0,
        }
    }

    /// Empty registry sized for bus class `B`.
    #[must_use]
    pub const fn for_bus<B: BusSize>() -> Self {
        Self::new(B::LANES)
    }

    /// Claim the lowest free lane for a strip that sends `data_size` bytes per frame.
    ///
    /// Grows the largest registered frame size, which sizes the shared buffer. Returns `None`
    /// when every lane is taken; nothing changes in that case.
    pub fn register_lane(&mut self, data_size: usize) -> Option<LaneId> {
        let Some(lane) = (0..self.capacity)
            .map(LaneId::new)
            .find(|lane| !self.active.contains(*lane))
        else {
            error!("no free lane ({} in use)", self.capacity);
            return None;
        };
        self.active = self.active.with(lane);
        self.max_lane_data_size = self.max_lane_data_size.max(data_size);
        debug!("lane {} registered ({} bytes)", lane.index(), data_size);
        Some(lane)
    }

    /// Release `lane`. Returns `true` when it was the last registered lane.
    ///
    /// The largest frame size is kept; the buffer does not shrink while other lanes remain.
    /// Releasing a lane that is not registered changes nothing and returns `false`.
    pub fn deregister_lane(&mut self, lane: LaneId) -> bool {
        if !self.active.contains(lane) {
            return false;
        }
        self.active = self.active.without(lane);
        self.complete = self.complete.without(lane);
        debug!("lane {} deregistered", lane.index());
        self.active.is_empty()
    }

    /// Record that `lane` has finished filling the buffer this cycle. Ignored for unregistered
    /// lanes.
    pub fn mark_lane_complete(&mut self, lane: LaneId) {
        if self.active.contains(lane) {
            self.complete = self.complete.with(lane);
        }
    }

    /// Whether every registered lane is complete. Vacuously true with no lanes.
    #[must_use]
    pub const fn all_lanes_complete(&self) -> bool {
        self.complete.0 == self.active.0
    }

    /// Whether no lane has completed this cycle, meaning the buffer is free to be cleared.
    #[must_use]
    pub const fn no_lanes_complete(&self) -> bool {
        self.complete.is_empty()
    }

    /// Whether `lane` is registered.
    #[must_use]
    pub const fn is_lane_active(&self, lane: LaneId) -> bool {
        self.active.contains(lane)
    }

    /// Whether `lane` has filled the buffer this cycle.
    #[must_use]
    pub const fn is_lane_complete(&self, lane: LaneId) -> bool {
        self.complete.contains(lane)
    }

    /// Start a new cycle.
    pub const fn reset_completion(&mut self) {
        self.complete = LaneMask::EMPTY;
    }

    /// Back to the freshly constructed state.
    pub const fn reset(&mut self) {
        self.active = LaneMask::EMPTY;
        self.complete = LaneMask::EMPTY;
        self.max_lane_data_size = 0;
    }

    /// Lanes the bus provides.
    #[must_use]
    pub const fn capacity(&self) -> u8 {
        self.capacity
    }

    /// Lanes currently registered.
    #[must_use]
    pub const fn lane_count(&self) -> u8 {
        self.active.len()
    }

    /// Registered lanes.
    #[must_use]
    pub const fn active_mask(&self) -> LaneMask {
        self.active
    }

    /// Lanes that have filled the buffer this cycle.
    #[must_use]
    pub const fn complete_mask(&self) -> LaneMask {
        self.complete
    }

    /// Largest frame size registered since the last [`reset`](Self::reset).
    #[must_use]
    pub const fn max_lane_data_size(&self) -> usize {
        self.max_lane_data_size
    }
}
