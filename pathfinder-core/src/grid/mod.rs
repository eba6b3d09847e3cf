//! Persistent top-down occupancy grid.
//!
//! Storage is world-aligned: cell indices are a translated world frame
//! and no rotation is ever baked in, so temporal persistence survives
//! user rotation. The user's heading is only applied on the output path
//! (snapshots). The grid scrolls under the user: when they approach the
//! edge, the whole window shifts by an integer number of cells and the
//! origin snaps to the new user position.
//!
//! Module layout:
//! - [`cell`]: cell state and per-cell bookkeeping
//! - [`update`]: observation operations (floor/obstacle points, detections)
//! - [`raycast`]: fixed-step ray marching for clearance queries
//! - [`snapshot`]: heading-aligned compact export

pub mod cell;
mod raycast;
mod snapshot;
mod update;

pub use cell::{CellState, GridCell};
pub use raycast::RayMarch;
pub use snapshot::decode_compact;

use crate::config::{
    ElevationSettings, GridSettings, PathfinderConfig, ProcessingSettings, TemporalSettings,
};
use crate::core::{normalize_angle, WorldPoint};
use crate::error::Result;

/// Cell statistics refreshed on classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridStats {
    pub valid_cells: usize,
    pub obstacle_cells: usize,
    pub step_cells: usize,
}

/// World-aligned 2D occupancy grid with temporal confidence decay.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    /// Row-major cells, z outer, x inner
    cells: Vec<GridCell>,
    grid: GridSettings,
    temporal: TemporalSettings,
    elevation: ElevationSettings,
    processing: ProcessingSettings,
    /// World coordinates of the grid center
    origin_x: f32,
    origin_z: f32,
    /// Applied only at output time (snapshots, raycast start vectors)
    user_heading: f32,
    /// Current floor elevation estimate (meters)
    floor_height: f32,
    floor_initialized: bool,
    floor_samples: Vec<f32>,
    stats: GridStats,
}

impl OccupancyGrid {
    /// Create a grid centered at the world origin.
    pub fn new(config: &PathfinderConfig) -> Result<Self> {
        config.validate()?;
        let size = config.grid.grid_size * config.grid.grid_size;
        Ok(Self {
            cells: vec![GridCell::default(); size],
            grid: config.grid.clone(),
            temporal: config.temporal.clone(),
            elevation: config.elevation.clone(),
            processing: config.processing.clone(),
            origin_x: 0.0,
            origin_z: 0.0,
            user_heading: 0.0,
            floor_height: 0.0,
            floor_initialized: false,
            floor_samples: Vec::new(),
            stats: GridStats::default(),
        })
    }

    #[inline]
    pub fn grid_size(&self) -> usize {
        self.grid.grid_size
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.grid.cell_size
    }

    /// Maximum mapping distance in meters
    #[inline]
    pub fn max_distance(&self) -> f32 {
        self.grid.max_distance
    }

    /// World coordinates of the grid center
    #[inline]
    pub fn origin(&self) -> WorldPoint {
        WorldPoint::new(self.origin_x, self.origin_z)
    }

    #[inline]
    pub fn user_heading(&self) -> f32 {
        self.user_heading
    }

    #[inline]
    pub fn floor_height(&self) -> f32 {
        self.floor_height
    }

    #[inline]
    pub fn stats(&self) -> GridStats {
        self.stats
    }

    #[inline]
    pub(crate) fn temporal(&self) -> &TemporalSettings {
        &self.temporal
    }

    #[inline]
    pub(crate) fn elevation_settings(&self) -> &ElevationSettings {
        &self.elevation
    }

    #[inline]
    pub(crate) fn processing(&self) -> &ProcessingSettings {
        &self.processing
    }

    #[inline]
    fn index(&self, ix: usize, iz: usize) -> usize {
        iz * self.grid.grid_size + ix
    }

    /// Convert world coordinates to cell indices; `None` outside the grid.
    #[inline]
    pub fn world_to_grid(&self, point: WorldPoint) -> Option<(usize, usize)> {
        let half = self.grid.grid_size as f32 / 2.0;
        let ix = ((point.x - self.origin_x) / self.grid.cell_size + half).floor();
        let iz = ((point.z - self.origin_z) / self.grid.cell_size + half).floor();
        if ix >= 0.0
            && iz >= 0.0
            && (ix as usize) < self.grid.grid_size
            && (iz as usize) < self.grid.grid_size
        {
            Some((ix as usize, iz as usize))
        } else {
            None
        }
    }

    /// World coordinates of a cell's center.
    #[inline]
    pub fn grid_to_world(&self, ix: usize, iz: usize) -> WorldPoint {
        let half = self.grid.grid_size as f32 / 2.0;
        WorldPoint::new(
            self.origin_x + (ix as f32 - half + 0.5) * self.grid.cell_size,
            self.origin_z + (iz as f32 - half + 0.5) * self.grid.cell_size,
        )
    }

    /// Cell at grid indices; `None` out of bounds.
    #[inline]
    pub fn cell(&self, ix: usize, iz: usize) -> Option<&GridCell> {
        if ix < self.grid.grid_size && iz < self.grid.grid_size {
            Some(&self.cells[self.index(ix, iz)])
        } else {
            None
        }
    }

    /// Cell covering a world point; `None` outside the grid.
    #[inline]
    pub fn cell_at(&self, point: WorldPoint) -> Option<&GridCell> {
        self.world_to_grid(point).map(|(ix, iz)| &self.cells[self.index(ix, iz)])
    }

    #[inline]
    pub(crate) fn cell_mut(&mut self, ix: usize, iz: usize) -> &mut GridCell {
        let idx = self.index(ix, iz);
        &mut self.cells[idx]
    }

    /// State at a world point; Unknown outside the grid.
    #[inline]
    pub fn state_at(&self, point: WorldPoint) -> CellState {
        self.cell_at(point).map(|c| c.state).unwrap_or(CellState::Unknown)
    }

    /// Can the user stand here? Unknown and out-of-grid are unsafe.
    #[inline]
    pub fn is_safe(&self, point: WorldPoint) -> bool {
        self.state_at(point).is_safe()
    }

    /// Record the user pose. Stores the heading for output-time rotation
    /// and recenters the grid when the user passes the edge margin.
    pub fn update_user_pose(&mut self, position: WorldPoint, heading: f32) {
        self.user_heading = normalize_angle(heading);

        let half_extent = self.grid.grid_size as f32 * self.grid.cell_size / 2.0;
        let threshold = half_extent * (1.0 - self.grid.recenter_edge_margin);
        let dx = (position.x - self.origin_x).abs();
        let dz = (position.z - self.origin_z).abs();
        if dx.max(dz) > threshold {
            self.recenter(position);
        }
    }

    /// Shift the cell window by an integer cell count so the given point
    /// becomes the new center. Cells scrolling off the window are lost;
    /// vacated cells start Unknown.
    fn recenter(&mut self, new_origin: WorldPoint) {
        let cs = self.grid.cell_size;
        let shift_x = ((new_origin.x - self.origin_x) / cs).round() as i32;
        let shift_z = ((new_origin.z - self.origin_z) / cs).round() as i32;

        if shift_x != 0 || shift_z != 0 {
            let n = self.grid.grid_size as i32;
            let mut next = vec![GridCell::default(); (n * n) as usize];
            for iz in 0..n {
                let src_z = iz + shift_z;
                if src_z < 0 || src_z >= n {
                    continue;
                }
                for ix in 0..n {
                    let src_x = ix + shift_x;
                    if src_x < 0 || src_x >= n {
                        continue;
                    }
                    next[(iz * n + ix) as usize] = self.cells[(src_z * n + src_x) as usize];
                }
            }
            self.cells = next;
            log::debug!(
                "grid recentered by ({}, {}) cells to ({:.2}, {:.2})",
                shift_x,
                shift_z,
                new_origin.x,
                new_origin.z
            );
        }

        self.origin_x = new_origin.x;
        self.origin_z = new_origin.z;
    }

    /// Decay every cell's confidence by the per-frame factor scaled to the
    /// elapsed time (the configured factor is per 60 Hz-equivalent frame).
    /// Cells falling below the confidence floor are forgotten entirely.
    pub fn apply_decay(&mut self, dt: f32) {
        if !(dt > 0.0) || !dt.is_finite() {
            return;
        }
        let factor = self.temporal.confidence_decay.powf(dt * 60.0);
        let min_confidence = self.temporal.min_confidence;
        for cell in &mut self.cells {
            if cell.hit_count == 0 && cell.confidence == 0 {
                continue;
            }
            let decayed = (cell.confidence as f32 * factor) as u8;
            if decayed < min_confidence {
                cell.reset();
            } else {
                cell.confidence = decayed;
            }
        }
    }

    /// Derive states from accumulated height evidence and refresh the
    /// cell statistics. Runs once per frame after all point additions.
    ///
    /// Only cells with floor evidence participate; cells marked purely by
    /// scene projection keep their projected state. An Occupied verdict is
    /// never downgraded here.
    pub fn classify(&mut self) {
        let obstacle_height = self.elevation.obstacle_height;
        let min_hits = self.processing.min_hit_count;
        let floor = self.floor_height;

        for cell in &mut self.cells {
            if !cell.is_valid(min_hits) || !cell.min_height.is_finite() {
                continue;
            }
            cell.elevation = cell.min_height - floor;
            let rise = cell.height_range();
            if rise > obstacle_height {
                cell.state = CellState::Occupied;
            } else if cell.state != CellState::Occupied {
                cell.state = CellState::Free;
            }
        }

        self.refresh_stats();
    }

    fn refresh_stats(&mut self) {
        let min_hits = self.processing.min_hit_count;
        let mut stats = GridStats::default();
        for cell in &self.cells {
            if cell.is_valid(min_hits) {
                stats.valid_cells += 1;
            }
            match cell.state {
                CellState::Occupied => stats.obstacle_cells += 1,
                CellState::Step => stats.step_cells += 1,
                _ => {}
            }
        }
        self.stats = stats;
    }

    /// Reset every cell to Unknown, keeping origin and floor state.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.reset();
        }
        self.stats = GridStats::default();
    }

    /// Multi-line ASCII rendering for logs and test failure output.
    /// Rows run far to near so the user's forward direction points up.
    pub fn render_ascii(&self) -> String {
        let n = self.grid.grid_size;
        let mut out = String::with_capacity((n + 1) * n);
        for iz in (0..n).rev() {
            for ix in 0..n {
                out.push(self.cells[self.index(ix, iz)].state.as_char());
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathfinderConfig;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};

    fn small_grid(grid_size: usize, cell_size: f32) -> OccupancyGrid {
        let mut config = PathfinderConfig::default();
        config.grid.grid_size = grid_size;
        config.grid.cell_size = cell_size;
        OccupancyGrid::new(&config).unwrap()
    }

    #[test]
    fn test_coordinate_round_trip_within_one_cell() {
        let grid = small_grid(200, 0.1);
        let points = [
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(1.234, -2.567),
            WorldPoint::new(-7.5, 7.5),
            WorldPoint::new(9.94, 9.94),
        ];
        for p in points {
            let (ix, iz) = grid.world_to_grid(p).unwrap();
            let back = grid.grid_to_world(ix, iz);
            assert!((back.x - p.x).abs() <= grid.cell_size());
            assert!((back.z - p.z).abs() <= grid.cell_size());
        }
    }

    #[test]
    fn test_outside_grid_is_none() {
        let grid = small_grid(20, 0.1);
        // Half extent is 1 m
        assert!(grid.world_to_grid(WorldPoint::new(1.05, 0.0)).is_none());
        assert!(grid.world_to_grid(WorldPoint::new(0.0, -1.05)).is_none());
        assert!(grid.world_to_grid(WorldPoint::new(0.95, -0.95)).is_some());
    }

    #[test]
    fn test_recenter_trigger_at_edge_margin() {
        // Half extent 1 m, margin 0.2 => trigger beyond 0.8 m
        let mut grid = small_grid(20, 0.1);

        grid.update_user_pose(WorldPoint::new(0.79, 0.0), 0.0);
        assert_relative_eq!(grid.origin().x, 0.0);

        grid.update_user_pose(WorldPoint::new(0.9, 0.0), 0.0);
        assert_relative_eq!(grid.origin().x, 0.9);
        assert_relative_eq!(grid.origin().z, 0.0);
    }

    #[test]
    fn test_recenter_preserves_cells_in_window() {
        let mut grid = small_grid(20, 0.1);
        let kept = WorldPoint::new(0.5, 0.5);
        let (ix, iz) = grid.world_to_grid(kept).unwrap();
        grid.cell_mut(ix, iz).state = CellState::Occupied;
        grid.cell_mut(ix, iz).observe(30, 255);

        grid.update_user_pose(WorldPoint::new(0.9, 0.0), 0.0);

        let cell = grid.cell_at(kept).expect("still inside the window");
        assert_eq!(cell.state, CellState::Occupied);
        assert_eq!(cell.hit_count, 1);
    }

    #[test]
    fn test_recenter_drops_scrolled_cells() {
        let mut grid = small_grid(20, 0.1);
        // Cell near the trailing edge falls off after the shift
        let dropped = WorldPoint::new(-0.95, 0.0);
        let (ix, iz) = grid.world_to_grid(dropped).unwrap();
        grid.cell_mut(ix, iz).state = CellState::Occupied;

        grid.update_user_pose(WorldPoint::new(0.9, 0.0), 0.0);

        // The old world position is now outside the window entirely
        assert!(grid.world_to_grid(dropped).is_none());
        // Vacated cells on the leading edge are Unknown
        let leading = grid.cell_at(WorldPoint::new(1.7, 0.0)).unwrap();
        assert_eq!(leading.state, CellState::Unknown);
    }

    #[test]
    fn test_decay_never_increases_confidence() {
        let mut grid = small_grid(10, 0.1);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..40 {
            let ix = rng.gen_range(0..10);
            let iz = rng.gen_range(0..10);
            let cell = grid.cell_mut(ix, iz);
            cell.state = CellState::Free;
            cell.confidence = rng.gen();
            cell.hit_count = rng.gen_range(1..10);
        }
        let before: Vec<u8> = (0..100)
            .map(|i| grid.cell(i % 10, i / 10).unwrap().confidence)
            .collect();

        grid.apply_decay(0.033);

        for i in 0..100 {
            let after = grid.cell(i % 10, i / 10).unwrap().confidence;
            assert!(after <= before[i]);
        }
    }

    #[test]
    fn test_decay_resets_below_floor() {
        let mut grid = small_grid(10, 0.1);
        let cell = grid.cell_mut(3, 3);
        cell.state = CellState::Occupied;
        cell.confidence = 21;
        cell.hit_count = 5;
        cell.min_height = 0.0;
        cell.max_height = 0.4;

        // One 30 Hz frame: 21 * 0.995^2 = 20.79 -> 20, stays
        grid.apply_decay(1.0 / 30.0);
        assert_eq!(grid.cell(3, 3).unwrap().confidence, 20);
        assert_eq!(grid.cell(3, 3).unwrap().state, CellState::Occupied);

        // Next frame crosses below min_confidence and forgets the cell
        grid.apply_decay(1.0 / 30.0);
        let cell = grid.cell(3, 3).unwrap();
        assert_eq!(cell.state, CellState::Unknown);
        assert_eq!(cell.confidence, 0);
        assert_eq!(cell.hit_count, 0);
        assert_eq!(cell.min_height, f32::INFINITY);
        assert_eq!(cell.max_height, f32::NEG_INFINITY);
    }

    #[test]
    fn test_decay_zero_dt_is_noop() {
        let mut grid = small_grid(10, 0.1);
        let cell = grid.cell_mut(2, 2);
        cell.state = CellState::Free;
        cell.confidence = 150;
        cell.hit_count = 4;

        grid.apply_decay(0.0);

        let cell = grid.cell(2, 2).unwrap();
        assert_eq!(cell.confidence, 150);
        assert_eq!(cell.state, CellState::Free);
    }

    #[test]
    fn test_classify_occupied_and_free() {
        let mut grid = small_grid(10, 0.1);

        // Tall height range: obstacle
        let cell = grid.cell_mut(1, 1);
        cell.min_height = 0.0;
        cell.max_height = 0.5;
        cell.hit_count = 5;
        cell.confidence = 100;

        // Flat floor evidence: free
        let cell = grid.cell_mut(2, 2);
        cell.min_height = 0.02;
        cell.max_height = 0.04;
        cell.hit_count = 5;
        cell.confidence = 100;

        // Not enough hits: untouched
        let cell = grid.cell_mut(3, 3);
        cell.min_height = 0.0;
        cell.max_height = 1.0;
        cell.hit_count = 1;

        grid.classify();

        assert_eq!(grid.cell(1, 1).unwrap().state, CellState::Occupied);
        assert_eq!(grid.cell(2, 2).unwrap().state, CellState::Free);
        assert_eq!(grid.cell(3, 3).unwrap().state, CellState::Unknown);

        let stats = grid.stats();
        assert_eq!(stats.obstacle_cells, 1);
        assert_eq!(stats.valid_cells, 2);
    }

    #[test]
    fn test_classify_never_downgrades_occupied() {
        let mut grid = small_grid(10, 0.1);
        let cell = grid.cell_mut(4, 4);
        cell.state = CellState::Occupied;
        cell.min_height = 0.0;
        cell.max_height = 0.05; // flat now, but stays occupied
        cell.hit_count = 5;

        grid.classify();
        assert_eq!(grid.cell(4, 4).unwrap().state, CellState::Occupied);
    }

    #[test]
    fn test_ascii_render_shape() {
        let mut grid = small_grid(4, 0.1);
        grid.cell_mut(0, 0).state = CellState::Occupied;
        let art = grid.render_ascii();
        let lines: Vec<&str> = art.lines().collect();
        assert_eq!(lines.len(), 4);
        // (0, 0) is the nearest row, rendered last
        assert_eq!(lines[3].chars().next().unwrap(), '#');
    }
}
