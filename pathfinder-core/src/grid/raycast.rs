//! Fixed-step ray marching over the grid.
//!
//! Rays advance one cell-size increment at a time and stop at the first
//! blocking cell (Occupied, Curb, Dropoff). Step cells are recorded but
//! crossed, so the planner can penalize rather than forbid them.

use super::cell::CellState;
use super::OccupancyGrid;
use crate::core::WorldPoint;

/// Result of marching one ray.
#[derive(Clone, Copy, Debug)]
pub struct RayMarch {
    /// Distance traveled before hitting a blocking cell, or the full
    /// march length when nothing blocked.
    pub clearance: f32,
    /// State of the blocking cell, when one was hit.
    pub blocked_by: Option<CellState>,
    /// Whether the ray crossed at least one Step cell.
    pub crossed_step: bool,
}

impl RayMarch {
    #[inline]
    pub fn hit(&self) -> bool {
        self.blocked_by.is_some()
    }
}

impl OccupancyGrid {
    /// March from `from` along `heading` up to `max_distance` meters.
    pub fn march_ray(&self, from: WorldPoint, heading: f32, max_distance: f32) -> RayMarch {
        let step = self.cell_size();
        let (sin_h, cos_h) = heading.sin_cos();
        let mut crossed_step = false;

        let mut t = step;
        while t <= max_distance {
            let point = WorldPoint::new(from.x + sin_h * t, from.z + cos_h * t);
            let state = self.state_at(point);
            if state.is_blocking() {
                return RayMarch {
                    clearance: t,
                    blocked_by: Some(state),
                    crossed_step,
                };
            }
            if state == CellState::Step {
                crossed_step = true;
            }
            t += step;
        }

        RayMarch {
            clearance: max_distance,
            blocked_by: None,
            crossed_step,
        }
    }

    /// Distance to the first blocking cell along `heading`, +inf when the
    /// march reaches `max_distance` unobstructed.
    pub fn nearest_obstacle(&self, from: WorldPoint, heading: f32, max_distance: f32) -> f32 {
        let march = self.march_ray(from, heading, max_distance);
        if march.hit() {
            march.clearance
        } else {
            f32::INFINITY
        }
    }
}
