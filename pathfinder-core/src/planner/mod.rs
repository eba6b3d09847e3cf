//! Heading selection: project the scene into the grid, then ray-march
//! for the most open walkable direction.
//!
//! The planner is the grid's only writer during normal operation. Its
//! persistent state is just the previous suggested heading, kept for
//! exponential smoothing; everything else flows through per frame.
//!
//! A candidate ray must be supported by both evidence sources: the grid
//! march must stay clear past the safety margin, and the scene columns
//! covering the ray (the nearest column and its flanks, a corridor wide
//! enough for a person) must be traversable with no obstacle inside the
//! safety margin. Grid-only rejection is not enough: the grid cannot veto
//! directions the camera has just classified as non-walkable, and the
//! scene cannot remember hazards behind the user.

use crate::config::PlannerSettings;
use crate::core::{smooth_angle, WorldPoint};
use crate::grid::{CellState, OccupancyGrid};
use crate::scene::{SceneUnderstanding, StepDirection};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Normalized magnitude bands mapping a surface discontinuity to a cell
/// state.
const MAGNITUDE_CURB: f32 = 0.3;
const MAGNITUDE_DROPOFF: f32 = 0.6;

/// Guard against division blowup when converting relative depth.
const DEPTH_EPS: f32 = 1e-6;
const DISCONTINUITY_DEPTH_EPS: f32 = 1e-3;

/// The surface discontinuity nearest ahead of the user, with its
/// estimated metric distance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DiscontinuityAhead {
    pub bearing: f32,
    pub magnitude: f32,
    pub direction: StepDirection,
    /// Estimated distance in meters
    pub distance: f32,
}

/// Per-frame navigation decision.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavigationOutput {
    /// Smoothed world heading the user should walk
    pub suggested_heading: f32,
    /// Clearance along the chosen ray, meters
    pub clearance: f32,
    /// Distance to the nearest blocking cell in the forward fan; +inf
    /// when nothing threatens
    pub nearest_obstacle_distance: f32,
    /// Bearing of that threat relative to the user's forward direction
    pub nearest_obstacle_bearing: f32,
    pub discontinuity_ahead: Option<DiscontinuityAhead>,
    /// Mean column traversability, [0, 1]
    pub ground_confidence: f32,
    /// No candidate ray survived
    pub is_path_blocked: bool,
}

impl NavigationOutput {
    /// Pass-through output published when a frame carries no scene
    /// evidence (vision failure).
    pub fn degraded() -> Self {
        Self {
            suggested_heading: 0.0,
            clearance: 0.0,
            nearest_obstacle_distance: f32::INFINITY,
            nearest_obstacle_bearing: 0.0,
            discontinuity_ahead: None,
            ground_confidence: 0.0,
            is_path_blocked: false,
        }
    }
}

/// Projects scene descriptors into the grid and selects a heading.
#[derive(Clone, Debug)]
pub struct NavigationPlanner {
    settings: PlannerSettings,
    previous_heading: f32,
}

impl NavigationPlanner {
    pub fn new(settings: PlannerSettings) -> Self {
        Self {
            settings,
            previous_heading: 0.0,
        }
    }

    #[inline]
    pub fn previous_heading(&self) -> f32 {
        self.previous_heading
    }

    /// Relative model depth to meters, clamped to the reliable range.
    /// +inf stays +inf: no observation, no bound.
    #[inline]
    fn to_meters(&self, relative: f32) -> f32 {
        if relative.is_finite() {
            (self.settings.depth_scale / (relative + DEPTH_EPS))
                .clamp(0.0, self.settings.max_reliable_depth)
        } else {
            f32::INFINITY
        }
    }

    /// Run one planning cycle and return the navigation decision.
    pub fn update(
        &mut self,
        scene: &SceneUnderstanding,
        user_pos: WorldPoint,
        user_heading: f32,
        dt: f32,
        grid: &mut OccupancyGrid,
    ) -> NavigationOutput {
        self.project_scene(scene, user_pos, user_heading, grid);
        grid.classify();
        grid.apply_decay(dt);
        grid.update_user_pose(user_pos, user_heading);

        let (raw_heading, clearance, is_path_blocked) =
            self.search_heading(scene, user_pos, user_heading, grid);
        let suggested_heading =
            smooth_angle(self.previous_heading, raw_heading, self.settings.smoothing_factor);
        self.previous_heading = suggested_heading;

        let (nearest_obstacle_distance, nearest_obstacle_bearing) =
            self.forward_threat(user_pos, user_heading, grid);

        NavigationOutput {
            suggested_heading,
            clearance,
            nearest_obstacle_distance,
            nearest_obstacle_bearing,
            discontinuity_ahead: self.discontinuity_ahead(scene),
            ground_confidence: scene.mean_traversability(),
            is_path_blocked,
        }
    }

    /// Write the frame's scene evidence into the grid.
    fn project_scene(
        &self,
        scene: &SceneUnderstanding,
        user_pos: WorldPoint,
        user_heading: f32,
        grid: &mut OccupancyGrid,
    ) {
        let cell_size = grid.cell_size();
        for c in 0..scene.columns {
            let world_bearing = scene.column_bearings[c] + user_heading;
            let obstacle_m = self.to_meters(scene.obstacle_distance[c]);

            if scene.traversability[c] > self.settings.free_walk_traversability {
                let end = self.settings.free_walk_limit.min(obstacle_m);
                let mut t = self.settings.free_walk_start;
                while t < end {
                    grid.observe_state_at(user_pos, world_bearing, t, CellState::Free);
                    t += cell_size;
                }
            }

            if obstacle_m.is_finite() {
                grid.observe_state_at(user_pos, world_bearing, obstacle_m, CellState::Occupied);
            }
        }

        for disc in &scene.discontinuities {
            let distance =
                self.settings.depth_scale / (disc.relative_depth + DISCONTINUITY_DEPTH_EPS);
            let state = if disc.magnitude < MAGNITUDE_CURB {
                CellState::Step
            } else if disc.magnitude < MAGNITUDE_DROPOFF {
                CellState::Curb
            } else {
                CellState::Dropoff
            };
            grid.observe_state_at(user_pos, disc.bearing + user_heading, distance, state);
        }
    }

    /// Cast the candidate fan and pick the highest-scoring ray.
    /// Returns `(raw_heading, clearance, blocked)`.
    fn search_heading(
        &self,
        scene: &SceneUnderstanding,
        user_pos: WorldPoint,
        user_heading: f32,
        grid: &OccupancyGrid,
    ) -> (f32, f32, bool) {
        let rays = self.settings.heading_rays.max(2);
        let max_march = self.settings.max_march.min(grid.max_distance());
        let mut best: Option<(f32, f32, f32)> = None; // (score, offset, clearance)

        for i in 0..rays {
            let offset = -FRAC_PI_2 + i as f32 * (PI / (rays - 1) as f32);
            if !self.column_supports_ray(scene, offset) {
                continue;
            }

            let march = grid.march_ray(user_pos, user_heading + offset, max_march);
            if march.clearance <= self.settings.safety_margin {
                continue;
            }

            let penalty = if march.crossed_step {
                self.settings.step_penalty
            } else {
                1.0
            };
            let score = march.clearance * (1.0 - offset.abs() / PI * 0.5) * penalty;
            if best.map_or(true, |(s, _, _)| score > s) {
                best = Some((score, offset, march.clearance));
            }
        }

        match best {
            Some((_, offset, clearance)) => (user_heading + offset, clearance, false),
            None => (0.0, 0.0, true),
        }
    }

    /// Scene-side admissibility for a candidate ray offset.
    fn column_supports_ray(&self, scene: &SceneUnderstanding, offset: f32) -> bool {
        if scene.columns == 0 {
            return false;
        }
        let column = scene.column_for_bearing(offset);
        let lo = column.saturating_sub(1);
        let hi = (column + 1).min(scene.columns - 1);
        for idx in lo..=hi {
            if scene.traversability[idx] <= self.settings.min_column_traversability {
                return false;
            }
        }
        let od = scene.obstacle_distance[column];
        if od.is_finite() && self.to_meters(od) <= self.settings.safety_margin {
            return false;
        }
        true
    }

    /// Narrow forward fan watching for the nearest blocking cell.
    fn forward_threat(
        &self,
        user_pos: WorldPoint,
        user_heading: f32,
        grid: &OccupancyGrid,
    ) -> (f32, f32) {
        let rays = self.settings.threat_rays.max(2);
        let max_march = self.settings.max_march.min(grid.max_distance());
        let mut nearest = f32::INFINITY;
        let mut bearing = 0.0;

        for i in 0..rays {
            let offset = -FRAC_PI_4 + i as f32 * (FRAC_PI_2 / (rays - 1) as f32);
            let distance = grid.nearest_obstacle(user_pos, user_heading + offset, max_march);
            if distance < nearest {
                nearest = distance;
                bearing = offset;
            }
        }

        (nearest, bearing)
    }

    /// Nearest estimated discontinuity within +/-45 degrees of forward.
    fn discontinuity_ahead(&self, scene: &SceneUnderstanding) -> Option<DiscontinuityAhead> {
        let mut best: Option<DiscontinuityAhead> = None;
        for disc in &scene.discontinuities {
            if disc.bearing.abs() >= FRAC_PI_4 {
                continue;
            }
            let distance =
                self.settings.depth_scale / (disc.relative_depth + DISCONTINUITY_DEPTH_EPS);
            if best.as_ref().map_or(true, |b| distance < b.distance) {
                best = Some(DiscontinuityAhead {
                    bearing: disc.bearing,
                    magnitude: disc.magnitude,
                    direction: disc.direction,
                    distance,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathfinderConfig;
    use crate::scene::Discontinuity;
    use approx::assert_relative_eq;

    fn setup() -> (NavigationPlanner, OccupancyGrid) {
        let config = PathfinderConfig::default();
        (
            NavigationPlanner::new(config.planner.clone()),
            OccupancyGrid::new(&config).unwrap(),
        )
    }

    fn scene(columns: usize) -> SceneUnderstanding {
        SceneUnderstanding::empty(columns, 2.0)
    }

    #[test]
    fn test_empty_scene_keeps_previous_heading() {
        let (mut planner, mut grid) = setup();
        let empty = scene(12);

        let a = planner.update(&empty, WorldPoint::ZERO, 0.0, 0.0, &mut grid);
        let b = planner.update(&empty, WorldPoint::ZERO, 0.0, 0.0, &mut grid);

        assert!(a.is_path_blocked);
        assert!(b.is_path_blocked);
        assert!(planner.previous_heading().abs() < 1e-6);
        assert_relative_eq!(a.suggested_heading, b.suggested_heading, epsilon = 1e-6);
    }

    #[test]
    fn test_magnitude_bands_select_cell_state() {
        let (mut planner, mut grid) = setup();
        let mut s = scene(12);
        s.discontinuities = vec![
            Discontinuity {
                column: 6,
                bearing: 0.0,
                relative_depth: 5.0,
                magnitude: 0.2,
                direction: StepDirection::DropAway,
            },
            Discontinuity {
                column: 4,
                bearing: s.column_bearings[4],
                relative_depth: 4.0,
                magnitude: 0.45,
                direction: StepDirection::DropAway,
            },
            Discontinuity {
                column: 9,
                bearing: s.column_bearings[9],
                relative_depth: 3.0,
                magnitude: 0.8,
                direction: StepDirection::DropAway,
            },
        ];

        planner.update(&s, WorldPoint::ZERO, 0.0, 0.0, &mut grid);

        let at = |bearing: f32, relative: f32| {
            let distance = 10.0 / (relative + 1e-3);
            grid.state_at(WorldPoint::ZERO.along_bearing(bearing, distance))
        };
        assert_eq!(at(0.0, 5.0), CellState::Step);
        assert_eq!(at(s.column_bearings[4], 4.0), CellState::Curb);
        assert_eq!(at(s.column_bearings[9], 3.0), CellState::Dropoff);
    }

    #[test]
    fn test_free_walk_carves_corridor() {
        let (mut planner, mut grid) = setup();
        let mut s = scene(12);
        s.traversability = vec![1.0; 12];

        planner.update(&s, WorldPoint::ZERO, 0.0, 0.0, &mut grid);

        // Straight-ahead column carved from 0.5 m out to the 5 m limit
        assert_eq!(grid.state_at(WorldPoint::new(0.0, 1.0)), CellState::Free);
        assert_eq!(grid.state_at(WorldPoint::new(0.0, 4.9)), CellState::Free);
        // Before the walk start and past the limit stays unknown
        assert_eq!(grid.state_at(WorldPoint::new(0.0, 0.2)), CellState::Unknown);
        assert_eq!(grid.state_at(WorldPoint::new(0.0, 6.0)), CellState::Unknown);
    }

    #[test]
    fn test_step_penalty_prefers_clean_ray() {
        let (mut planner, mut grid) = setup();
        let mut s = scene(12);
        s.traversability = vec![1.0; 12];

        // Step cells across the straight-ahead corridor; flanks stay clean
        for x in -3..=3 {
            let p = WorldPoint::new(x as f32 * 0.1, 1.0);
            if let Some((ix, iz)) = grid.world_to_grid(p) {
                grid.cell_mut(ix, iz).state = CellState::Step;
            }
        }

        let out = planner.update(&s, WorldPoint::ZERO, 0.0, 0.0, &mut grid);
        assert!(!out.is_path_blocked);
        // Equal clearance everywhere, so the 0.7 penalty pushes the pick
        // off the straight rays that cross the step band.
        assert!(out.suggested_heading.abs() > 0.05);
    }

    #[test]
    fn test_forward_threat_reports_nearest() {
        let (mut planner, mut grid) = setup();
        let mut s = scene(12);
        s.traversability = vec![1.0; 12];

        // Small obstacle front-right, wide enough that the discrete fan
        // cannot thread between rays
        let target = WorldPoint::new(0.5, 2.0);
        for x in [0.3f32, 0.4, 0.5, 0.6, 0.7] {
            let (ix, iz) = grid.world_to_grid(WorldPoint::new(x, 2.0)).unwrap();
            grid.cell_mut(ix, iz).state = CellState::Occupied;
        }

        let out = planner.update(&s, WorldPoint::ZERO, 0.0, 0.0, &mut grid);
        let expected = WorldPoint::ZERO.distance(&target);
        assert!(out.nearest_obstacle_distance < expected + 0.3);
        assert!(out.nearest_obstacle_distance > 1.5);
        assert!(out.nearest_obstacle_bearing > 0.0); // threat on the right
    }

    #[test]
    fn test_degraded_output_shape() {
        let out = NavigationOutput::degraded();
        assert_eq!(out.ground_confidence, 0.0);
        assert!(!out.is_path_blocked);
        assert_eq!(out.nearest_obstacle_distance, f32::INFINITY);
    }
}
