//! Cell types for the occupancy grid.
//!
//! Cells carry a semantic state plus elevation evidence so that surface
//! hazards (steps, curbs, drop-offs) stay distinguishable from plain
//! obstacles.

use serde::{Deserialize, Serialize};

/// Semantic state of one grid cell.
///
/// The numeric values are the wire encoding and must stay stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CellState {
    /// Never observed, or observations have fully decayed
    #[default]
    Unknown = 0,
    /// Traversable ground
    Free = 1,
    /// Solid obstacle at walking height
    Occupied = 2,
    /// Small vertical step (shallow stair, threshold)
    Step = 3,
    /// Curb-height edge
    Curb = 4,
    /// Gently sloped traversable surface
    Ramp = 5,
    /// Repeating staircase pattern
    Stairs = 6,
    /// Surface falls away dangerously
    Dropoff = 7,
}

impl CellState {
    /// Safe to walk over without a warning?
    #[inline]
    pub fn is_safe(self) -> bool {
        matches!(self, CellState::Free | CellState::Ramp | CellState::Step)
    }

    /// Hard stop for ray marching and clearance checks.
    #[inline]
    pub fn is_blocking(self) -> bool {
        matches!(self, CellState::Occupied | CellState::Curb | CellState::Dropoff)
    }

    #[inline]
    pub fn is_known(self) -> bool {
        self != CellState::Unknown
    }

    /// Convert from the wire encoding; anything out of range is Unknown.
    #[inline]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => CellState::Free,
            2 => CellState::Occupied,
            3 => CellState::Step,
            4 => CellState::Curb,
            5 => CellState::Ramp,
            6 => CellState::Stairs,
            7 => CellState::Dropoff,
            _ => CellState::Unknown,
        }
    }

    /// Single character representation for debug rendering
    pub fn as_char(self) -> char {
        match self {
            CellState::Unknown => '?',
            CellState::Free => '.',
            CellState::Occupied => '#',
            CellState::Step => '_',
            CellState::Curb => 'c',
            CellState::Ramp => '/',
            CellState::Stairs => '=',
            CellState::Dropoff => 'v',
        }
    }
}

/// One occupancy cell: semantic state plus height evidence and
/// temporal-confidence bookkeeping.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GridCell {
    pub state: CellState,
    /// Height of the cell surface relative to the estimated floor (meters)
    pub elevation: f32,
    /// Temporal confidence, decays between observations
    pub confidence: u8,
    pub hit_count: u16,
    /// Lowest observed height; +inf until floor evidence arrives
    pub min_height: f32,
    /// Highest observed height; -inf until obstacle evidence arrives
    pub max_height: f32,
}

impl Default for GridCell {
    fn default() -> Self {
        Self {
            state: CellState::Unknown,
            elevation: 0.0,
            confidence: 0,
            hit_count: 0,
            min_height: f32::INFINITY,
            max_height: f32::NEG_INFINITY,
        }
    }
}

impl GridCell {
    /// A cell is valid once it has accumulated enough observations.
    #[inline]
    pub fn is_valid(&self, min_hit_count: u16) -> bool {
        self.hit_count >= min_hit_count
    }

    /// Observed vertical extent; zero without any hits.
    #[inline]
    pub fn height_range(&self) -> f32 {
        if self.hit_count > 0 && self.min_height.is_finite() && self.max_height.is_finite() {
            (self.max_height - self.min_height).max(0.0)
        } else {
            0.0
        }
    }

    /// Forget everything about this cell.
    pub fn reset(&mut self) {
        *self = GridCell::default();
    }

    /// Count one observation and boost confidence, saturating at the
    /// configured ceiling.
    #[inline]
    pub fn observe(&mut self, boost: u8, max_confidence: u8) {
        self.hit_count = self.hit_count.saturating_add(1);
        self.confidence = self.confidence.saturating_add(boost).min(max_confidence);
    }
}
