//! Frame intake: the non-blocking boundary between the camera callback
//! and the processing pipeline.
//!
//! The mailbox holds a single frame. When the vision stage is still busy
//! with the previous frame, the new one is dropped on the floor and only
//! counted; the camera thread never waits.

use crate::pose::{CameraIntrinsics, FramePose, PoseMatrix};
use crate::shared::SharedState;
use crate::vision::ColorFrame;
use crossbeam_channel::{Sender, TrySendError};
use std::sync::Arc;

/// One frame plus its pose, as accepted by the mailbox.
#[derive(Clone)]
pub struct FramePacket {
    pub frame: Arc<ColorFrame>,
    pub pose: FramePose,
    pub intrinsics: CameraIntrinsics,
    pub timestamp: f64,
}

/// Producer-side handle given to the camera source.
#[derive(Clone)]
pub struct FrameIntake {
    tx: Sender<FramePacket>,
    state: Arc<SharedState>,
}

impl FrameIntake {
    pub fn new(tx: Sender<FramePacket>, state: Arc<SharedState>) -> Self {
        Self { tx, state }
    }

    /// Offer a frame to the pipeline. Returns immediately; a busy
    /// pipeline means the frame is dropped.
    pub fn on_frame(
        &self,
        frame: ColorFrame,
        pose: PoseMatrix,
        intrinsics: CameraIntrinsics,
        timestamp_s: f64,
    ) {
        let packet = FramePacket {
            frame: Arc::new(frame),
            pose: FramePose::from_matrix(&pose),
            intrinsics,
            timestamp: timestamp_s,
        };
        match self.tx.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.state.note_dropped_frame();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn identity() -> PoseMatrix {
        [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics {
            fx: 500.0,
            fy: 500.0,
            cx: 32.0,
            cy: 24.0,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn test_drop_on_busy_mailbox() {
        let state = Arc::new(SharedState::new());
        let (tx, rx) = bounded(1);
        let intake = FrameIntake::new(tx, Arc::clone(&state));

        let frame = || ColorFrame::new(64, 48, vec![0; 64 * 48]);
        intake.on_frame(frame(), identity(), intrinsics(), 0.0);
        intake.on_frame(frame(), identity(), intrinsics(), 0.033);
        intake.on_frame(frame(), identity(), intrinsics(), 0.066);

        // First frame occupies the slot; the other two were dropped
        assert_eq!(state.dropped_frames(), 2);
        let accepted = rx.try_recv().unwrap();
        assert_eq!(accepted.timestamp, 0.0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_when_pipeline_gone() {
        let state = Arc::new(SharedState::new());
        let (tx, rx) = bounded(1);
        drop(rx);
        let intake = FrameIntake::new(tx, Arc::clone(&state));
        intake.on_frame(
            ColorFrame::new(8, 8, vec![0; 64]),
            identity(),
            intrinsics(),
            0.0,
        );
        assert_eq!(state.dropped_frames(), 1);
    }
}
