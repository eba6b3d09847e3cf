//! Point and coordinate types for the ground-plane world model.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Grid coordinates (integer cell indices)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridCoord {
    /// X coordinate (column index, user's right)
    pub x: i32,
    /// Z coordinate (row index, user's forward at zero heading)
    pub z: i32,
}

impl GridCoord {
    /// Create a new grid coordinate
    #[inline]
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chebyshev distance (max of per-axis distance) - used for 8-connected grids
    #[inline]
    pub fn chebyshev_distance(&self, other: &GridCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// Get the 4 cardinal neighbors
    #[inline]
    pub fn neighbors_4(&self) -> [GridCoord; 4] {
        [
            GridCoord::new(self.x, self.z + 1),
            GridCoord::new(self.x + 1, self.z),
            GridCoord::new(self.x, self.z - 1),
            GridCoord::new(self.x - 1, self.z),
        ]
    }
}

impl Add for GridCoord {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        GridCoord::new(self.x + other.x, self.z + other.z)
    }
}

impl Sub for GridCoord {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        GridCoord::new(self.x - other.x, self.z - other.z)
    }
}

/// World coordinates on the ground plane (meters, f32)
///
/// Coordinate convention:
/// - X: positive to the user's right at zero heading
/// - Z: positive along the user's forward direction at zero heading
/// - Bearings are measured about the vertical axis, 0 = +Z, positive toward +X
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    /// X coordinate in meters
    pub x: f32,
    /// Z coordinate in meters
    pub z: f32,
}

impl WorldPoint {
    /// Create a new world point
    #[inline]
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    /// Zero point (origin)
    pub const ZERO: WorldPoint = WorldPoint { x: 0.0, z: 0.0 };

    /// Point at `distance` meters along `bearing` from this point
    #[inline]
    pub fn along_bearing(&self, bearing: f32, distance: f32) -> WorldPoint {
        WorldPoint::new(
            self.x + bearing.sin() * distance,
            self.z + bearing.cos() * distance,
        )
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &WorldPoint) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Bearing from this point to another (radians, 0 = +Z, positive toward +X)
    #[inline]
    pub fn bearing_to(&self, other: &WorldPoint) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        dx.atan2(dz)
    }
}

impl Add for WorldPoint {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        WorldPoint::new(self.x + other.x, self.z + other.z)
    }
}

impl Sub for WorldPoint {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        WorldPoint::new(self.x - other.x, self.z - other.z)
    }
}

impl Mul<f32> for WorldPoint {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f32) -> Self {
        WorldPoint::new(self.x * scalar, self.z * scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_along_bearing() {
        let origin = WorldPoint::ZERO;

        // Bearing 0 is straight ahead (+Z)
        let ahead = origin.along_bearing(0.0, 2.0);
        assert_relative_eq!(ahead.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ahead.z, 2.0, epsilon = 1e-6);

        // +90 degrees is the user's right (+X)
        let right = origin.along_bearing(FRAC_PI_2, 2.0);
        assert_relative_eq!(right.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(right.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_bearing_to_round_trip() {
        let from = WorldPoint::new(1.0, -2.0);
        let to = from.along_bearing(0.7, 3.0);
        assert_relative_eq!(from.bearing_to(&to), 0.7, epsilon = 1e-5);
        assert_relative_eq!(from.distance(&to), 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_grid_coord_chebyshev() {
        let a = GridCoord::new(2, 3);
        let b = GridCoord::new(-1, 5);
        assert_eq!(a.chebyshev_distance(&b), 3);
    }
}
