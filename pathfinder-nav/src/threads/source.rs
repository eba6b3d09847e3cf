//! Synthetic frame source for demo runs and soak testing.
//!
//! Plays the role of the camera/pose collaborator: generates frames at a
//! fixed rate, walking the user slowly forward. When the requested frame
//! budget is exhausted the source signals shutdown so the process exits
//! cleanly.

use crate::pose::{CameraIntrinsics, PoseMatrix};
use crate::shared::SharedState;
use crate::threads::intake::FrameIntake;
use crate::vision::ColorFrame;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME_WIDTH: usize = 64;
const FRAME_HEIGHT: usize = 48;
/// Forward speed of the simulated walk, meters per frame.
const WALK_STEP: f32 = 0.02;
const CAMERA_HEIGHT: f32 = 1.4;

/// Camera-to-world matrix for a camera at `(x, h, z)` looking along +Z.
fn walking_pose(x: f32, z: f32) -> PoseMatrix {
    // Rotation of pi about Y turns the camera's -Z view direction to +Z
    [
        [-1.0, 0.0, 0.0, x],
        [0.0, 1.0, 0.0, CAMERA_HEIGHT],
        [0.0, 0.0, -1.0, z],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics {
        fx: 55.0,
        fy: 55.0,
        cx: FRAME_WIDTH as f32 / 2.0,
        cy: FRAME_HEIGHT as f32 / 2.0,
        width: FRAME_WIDTH as u32,
        height: FRAME_HEIGHT as u32,
    }
}

/// Source thread loop: emit `frames` frames at `rate_hz`, then shut the
/// pipeline down.
pub fn run_source(intake: FrameIntake, frames: u64, rate_hz: f32, state: Arc<SharedState>) {
    let interval = Duration::from_secs_f32(1.0 / rate_hz.max(1.0));
    let start = Instant::now();

    for i in 0..frames {
        if state.should_shutdown() {
            break;
        }
        let timestamp = start.elapsed().as_secs_f64();
        let frame = ColorFrame::new(FRAME_WIDTH, FRAME_HEIGHT, vec![0; FRAME_WIDTH * FRAME_HEIGHT]);
        let pose = walking_pose(0.0, i as f32 * WALK_STEP);
        intake.on_frame(frame, pose, intrinsics(), timestamp);
        std::thread::sleep(interval);
    }

    // Let the in-flight frame drain before everyone packs up
    std::thread::sleep(Duration::from_millis(200));
    tracing::info!("frame source finished");
    state.signal_shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::FramePose;
    use approx::assert_relative_eq;

    #[test]
    fn test_walking_pose_faces_forward() {
        let pose = FramePose::from_matrix(&walking_pose(0.5, 2.0));
        assert_relative_eq!(pose.heading, 0.0, epsilon = 1e-6);
        assert_relative_eq!(pose.position.x, 0.5);
        assert_relative_eq!(pose.position.z, 2.0);
        assert_relative_eq!(pose.height, 1.4);
    }

    #[test]
    fn test_intrinsics_cover_wide_fov() {
        // fx 55 at 64 px wide is roughly a 1.05 rad horizontal fan
        let hfov = intrinsics().horizontal_fov();
        assert!(hfov > 0.9 && hfov < 1.3, "hfov {}", hfov);
    }
}
