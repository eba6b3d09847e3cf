//! Observation operations: how evidence from different sources lands in
//! the grid.
//!
//! Three sources feed cells:
//! - height samples (floor and obstacle points) carrying real elevations,
//! - scene projection marks carrying a semantic state but no heights,
//! - external detector boxes marking occupied strips.
//!
//! State marks follow a priority rule: an Occupied verdict is never
//! overwritten by weaker evidence, and fresh Free marks never clear a
//! hazard state. Decay is the only path that forgets.

use super::cell::CellState;
use super::OccupancyGrid;
use crate::core::WorldPoint;

impl OccupancyGrid {
    /// Record a floor height sample in a cell.
    ///
    /// A sample far from the recorded evidence replaces it (the surface
    /// under the cell changed) instead of widening the min/max envelope.
    pub fn add_floor_point(&mut self, ix: usize, iz: usize, y: f32) {
        if !y.is_finite() || ix >= self.grid_size() || iz >= self.grid_size() {
            return;
        }
        let boost = self.temporal().observation_boost;
        let max_confidence = self.temporal().max_confidence;
        let merge_threshold = self.processing().elevation_merge_threshold;
        let cell = self.cell_mut(ix, iz);

        if cell.min_height.is_finite() && (y - cell.min_height).abs() > merge_threshold {
            cell.min_height = y;
            cell.max_height = y;
        } else {
            cell.min_height = cell.min_height.min(y);
            if !cell.max_height.is_finite() {
                cell.max_height = y;
            }
        }
        cell.observe(boost, max_confidence);

        self.record_floor_sample(y);
    }

    /// Record an obstacle height sample in a cell.
    pub fn add_obstacle_point(&mut self, ix: usize, iz: usize, y: f32) {
        if !y.is_finite() || ix >= self.grid_size() || iz >= self.grid_size() {
            return;
        }
        let boost = self.temporal().observation_boost;
        let max_confidence = self.temporal().max_confidence;
        let cell = self.cell_mut(ix, iz);
        cell.max_height = cell.max_height.max(y);
        cell.observe(boost, max_confidence);
    }

    /// Fold one polar depth sample into the grid. The sample is anchored
    /// at the grid origin; ground samples land at the floor estimate,
    /// obstacle samples at obstacle height above it.
    pub fn update_from_depth_sample(&mut self, bearing: f32, distance: f32, is_ground: bool) {
        if !distance.is_finite() || distance < 0.0 || distance > self.max_distance() {
            return;
        }
        let point = self.origin().along_bearing(bearing, distance);
        if let Some((ix, iz)) = self.world_to_grid(point) {
            if is_ground {
                let y = self.floor_height();
                self.add_floor_point(ix, iz, y);
            } else {
                let y = self.floor_height() + self.elevation_settings().obstacle_height;
                self.add_obstacle_point(ix, iz, y);
            }
        }
    }

    /// Mark an external detection as an occupied strip perpendicular to
    /// its bearing. The confidence boost scales with the detector's own
    /// confidence; this never lowers a cell's confidence and never writes
    /// Unknown.
    pub fn update_from_detection(
        &mut self,
        bearing: f32,
        distance: f32,
        width: f32,
        confidence: f32,
    ) {
        if !distance.is_finite() || distance < 0.0 || distance > self.max_distance() {
            return;
        }
        let boost_base = self.temporal().observation_boost as f32;
        let boost = (boost_base * confidence.clamp(0.0, 1.0)).round() as u8;
        let max_confidence = self.temporal().max_confidence;

        let center = self.origin().along_bearing(bearing, distance);
        let perp = WorldPoint::new(bearing.cos(), -bearing.sin());
        let cell_size = self.cell_size();
        let half_width = (width * 0.5).max(0.0);
        let steps = ((half_width / cell_size).ceil() as i32).max(1);

        for i in -steps..=steps {
            let point = center + perp * (i as f32 * cell_size);
            if let Some((ix, iz)) = self.world_to_grid(point) {
                let cell = self.cell_mut(ix, iz);
                cell.state = CellState::Occupied;
                cell.observe(boost, max_confidence);
            }
        }
    }

    /// Mark the cell at `distance` along `bearing` from `from` with a
    /// projected state, respecting the priority rule. Every mark counts
    /// as an observation.
    pub fn observe_state_at(
        &mut self,
        from: WorldPoint,
        bearing: f32,
        distance: f32,
        state: CellState,
    ) {
        if !distance.is_finite() || distance < 0.0 {
            return;
        }
        let point = from.along_bearing(bearing, distance);
        if let Some((ix, iz)) = self.world_to_grid(point) {
            self.observe_state(ix, iz, state);
        }
    }

    /// Apply a projected state to a cell with the priority rule.
    pub fn observe_state(&mut self, ix: usize, iz: usize, state: CellState) {
        if ix >= self.grid_size() || iz >= self.grid_size() {
            return;
        }
        let boost = self.temporal().observation_boost;
        let max_confidence = self.temporal().max_confidence;
        let cell = self.cell_mut(ix, iz);

        let accept = match (cell.state, state) {
            // Obstacles are the strongest projected verdict
            (_, CellState::Occupied) => true,
            // Nothing weaker replaces an obstacle
            (CellState::Occupied, _) => false,
            // Free only refreshes unclaimed or already-free ground
            (CellState::Unknown | CellState::Free, CellState::Free) => true,
            (_, CellState::Free) => false,
            // Hazard states overwrite anything but obstacles
            _ => true,
        };
        if accept {
            cell.state = state;
        }
        cell.observe(boost, max_confidence);
    }

    /// Feed the floor estimator. Once enough samples accumulate, their
    /// median updates the estimate: adopted outright on first contact,
    /// blended when it stays inside the floor tolerance band, discarded
    /// as outlier noise otherwise.
    fn record_floor_sample(&mut self, y: f32) {
        self.floor_samples.push(y);
        if self.floor_samples.len() < self.processing().min_floor_samples {
            return;
        }

        let mut samples = std::mem::take(&mut self.floor_samples);
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = samples[samples.len() / 2];

        if !self.floor_initialized {
            self.floor_height = median;
            self.floor_initialized = true;
        } else if (median - self.floor_height).abs() <= self.elevation_settings().floor_tolerance {
            self.floor_height += 0.2 * (median - self.floor_height);
        }
        // An out-of-band median is dropped; a real floor change will keep
        // producing samples until decay retires the old evidence.
    }
}
