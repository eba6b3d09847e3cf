//! Camera pose intake and heading smoothing.
//!
//! Poses arrive as 4x4 column-basis matrices from the tracking source.
//! Only the ground-plane translation and the yaw of the view direction
//! matter here; roll and pitch are absorbed by the scene analyzer's
//! whole-column statistics.

use pathfinder_core::core::smooth_angle;
use pathfinder_core::WorldPoint;

/// Row-major 4x4 pose matrix, rotation in the upper-left 3x3 and
/// translation in the last column.
pub type PoseMatrix = [[f32; 4]; 4];

/// Camera intrinsics as delivered by the frame source.
#[derive(Clone, Copy, Debug)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

impl CameraIntrinsics {
    /// Horizontal field of view in radians.
    pub fn horizontal_fov(&self) -> f32 {
        if self.fx <= 0.0 {
            return 0.0;
        }
        2.0 * (self.width as f32 / (2.0 * self.fx)).atan()
    }
}

/// Ground-plane pose extracted from a full camera matrix.
#[derive(Clone, Copy, Debug, Default)]
pub struct FramePose {
    /// Ground-plane position (x right, z forward at zero heading)
    pub position: WorldPoint,
    /// Camera height above the tracking origin
    pub height: f32,
    /// Yaw of the view direction: 0 = +Z, positive right
    pub heading: f32,
}

impl FramePose {
    /// Extract position and yaw from a camera-to-world matrix. The camera
    /// looks along its local -Z axis.
    pub fn from_matrix(m: &PoseMatrix) -> Self {
        let forward_x = -m[0][2];
        let forward_z = -m[2][2];
        let heading = if forward_x == 0.0 && forward_z == 0.0 {
            0.0
        } else {
            forward_x.atan2(forward_z)
        };
        Self {
            position: WorldPoint::new(m[0][3], m[2][3]),
            height: m[1][3],
            heading,
        }
    }
}

/// Exponential heading filter on the shortest arc, seeded by the first
/// sample so startup doesn't swing in from zero.
#[derive(Clone, Copy, Debug)]
pub struct HeadingFilter {
    alpha: f32,
    state: Option<f32>,
}

impl HeadingFilter {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, state: None }
    }

    pub fn update(&mut self, raw: f32) -> f32 {
        let next = match self.state {
            Some(previous) => smooth_angle(previous, raw, self.alpha),
            None => raw,
        };
        self.state = Some(next);
        next
    }
}
