//! Pipeline stage: the grid's single writer.
//!
//! Consumes joined vision results, runs scene analysis and planning,
//! and fans the decision out: published state for observers, a cue for
//! the audio thread, a snapshot for the stream thread every N frames.
//! Per-frame failures degrade the output; nothing here unwinds.

use crate::audio::{self, AudioCue};
use crate::pose::HeadingFilter;
use crate::shared::{PipelineStatus, PublishedFrame, SensorStats, SharedState};
use crate::stream::{self, GridPacket};
use crate::threads::vision::VisionOutput;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use pathfinder_core::{
    NavigationOutput, NavigationPlanner, OccupancyGrid, PathfinderConfig, SceneAnalyzer,
};
use std::sync::Arc;
use std::time::Duration;

/// Fallback frame interval before the first timestamp pair exists.
const BOOTSTRAP_DT: f32 = 1.0 / 60.0;

pub struct PipelineStage {
    config: PathfinderConfig,
    analyzer: SceneAnalyzer,
    planner: NavigationPlanner,
    grid: OccupancyGrid,
    heading_filter: HeadingFilter,
    previous_timestamp: Option<f64>,
    frame_index: u64,
    fps: f32,
    samples_skipped: u64,
    low_ground_streak: u32,
    camera_height: f32,
}

impl PipelineStage {
    pub fn new(config: PathfinderConfig) -> pathfinder_core::Result<Self> {
        let grid = OccupancyGrid::new(&config)?;
        let analyzer = SceneAnalyzer::new(config.scene.clone());
        let planner = NavigationPlanner::new(config.planner.clone());
        let heading_filter = HeadingFilter::new(config.processing.heading_smoothing_alpha);
        Ok(Self {
            config,
            analyzer,
            planner,
            grid,
            heading_filter,
            previous_timestamp: None,
            frame_index: 0,
            fps: 0.0,
            samples_skipped: 0,
            low_ground_streak: 0,
            camera_height: 0.0,
        })
    }

    /// Process one joined vision result. Returns the published frame and
    /// the snapshot packet when this frame is on the stream cadence.
    pub fn process(
        &mut self,
        msg: VisionOutput,
        dropped_frames: u64,
    ) -> Option<(PublishedFrame, Option<AudioCue>, Option<GridPacket>)> {
        // Intake hands frames over in acceptance order; a timestamp going
        // backwards means the source re-synced, skip rather than rewind.
        if let Some(prev) = self.previous_timestamp {
            if msg.timestamp < prev {
                tracing::warn!(
                    "non-monotonic timestamp {:.3} after {:.3}, skipping frame",
                    msg.timestamp,
                    prev
                );
                return None;
            }
        }
        let dt = match self.previous_timestamp {
            Some(prev) => (msg.timestamp - prev) as f32,
            None => BOOTSTRAP_DT,
        };
        self.previous_timestamp = Some(msg.timestamp);

        let heading = self.heading_filter.update(msg.pose.heading);
        self.camera_height = msg.pose.height;

        let (output, discontinuity_distances) = match msg.maps {
            Some((depth, seg)) => {
                self.samples_skipped +=
                    depth.data().iter().filter(|d| !d.is_finite()).count() as u64;
                let scene = self.analyzer.analyze(&depth, &seg, msg.hfov);
                let distances: Vec<f32> = scene
                    .discontinuities
                    .iter()
                    .map(|d| self.config.planner.depth_scale / (d.relative_depth + 1e-3))
                    .collect();
                let output =
                    self.planner
                        .update(&scene, msg.pose.position, heading, dt, &mut self.grid);
                (output, distances)
            }
            None => (NavigationOutput::degraded(), Vec::new()),
        };

        if output.ground_confidence < 0.3 {
            self.low_ground_streak += 1;
        } else {
            self.low_ground_streak = 0;
        }
        let status = if output.is_path_blocked {
            PipelineStatus::Blocked
        } else if self.low_ground_streak >= audio::LOW_GROUND_STREAK {
            PipelineStatus::LowGroundConfidence
        } else {
            PipelineStatus::Ok
        };

        if dt > 0.0 {
            let instantaneous = 1.0 / dt;
            self.fps = if self.fps == 0.0 {
                instantaneous
            } else {
                0.9 * self.fps + 0.1 * instantaneous
            };
        }

        self.frame_index += 1;
        let stats = SensorStats {
            fps: self.fps,
            vision_ms: msg.vision_ms,
            frames_processed: self.frame_index,
            frames_dropped: dropped_frames,
            samples_skipped: self.samples_skipped,
            status,
        };

        let cue = audio::cue_for(&output, self.low_ground_streak);

        let every_n = self.config.stream.send_every_n_frames.max(1);
        let packet = if self.frame_index % every_n == 0 {
            Some(stream::build_packet(
                &self.grid,
                &output,
                msg.pose.position,
                self.camera_height,
                msg.timestamp,
                &discontinuity_distances,
                self.config.stream.max_elevation_changes,
            ))
        } else {
            None
        };

        let published = PublishedFrame {
            output,
            stats,
            frame_index: self.frame_index,
        };
        Some((published, cue, packet))
    }

    #[cfg(test)]
    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }
}

/// Pipeline thread loop.
pub fn run_pipeline(
    config: PathfinderConfig,
    rx: Receiver<VisionOutput>,
    audio_tx: Sender<AudioCue>,
    stream_tx: Option<Sender<GridPacket>>,
    state: Arc<SharedState>,
) {
    let mut stage = match PipelineStage::new(config) {
        Ok(stage) => stage,
        Err(e) => {
            tracing::error!("pipeline setup failed: {}", e);
            state.signal_shutdown();
            return;
        }
    };

    loop {
        let msg = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(msg) => msg,
            Err(RecvTimeoutError::Timeout) => {
                if state.should_shutdown() {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let Some((published, cue, packet)) = stage.process(msg, state.dropped_frames()) else {
            continue;
        };

        state.publish(published);
        if let Some(cue) = cue {
            // Audio must never stall the pipeline; a full queue loses the cue
            let _ = audio_tx.try_send(cue);
        }
        if let (Some(tx), Some(packet)) = (&stream_tx, packet) {
            let _ = tx.try_send(packet);
        }
    }

    tracing::debug!("pipeline thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::FramePose;
    use crate::vision::{DepthModel, SegModel, SyntheticDepthModel, SyntheticSegModel};
    use pathfinder_core::WorldPoint;

    fn vision_output(timestamp: f64) -> VisionOutput {
        let frame = crate::vision::ColorFrame::new(8, 8, vec![0; 64]);
        let depth = SyntheticDepthModel::default().run_depth(&frame).unwrap();
        let seg = SyntheticSegModel::default().run_seg(&frame).unwrap();
        VisionOutput {
            maps: Some((depth, seg)),
            pose: FramePose {
                position: WorldPoint::ZERO,
                height: 1.4,
                heading: 0.0,
            },
            hfov: 1.2,
            timestamp,
            vision_ms: 4.0,
        }
    }

    #[test]
    fn test_synthetic_frames_produce_walkable_output() {
        let mut stage = PipelineStage::new(PathfinderConfig::default()).unwrap();

        let mut last = None;
        for i in 0..5 {
            if let Some((published, _, _)) = stage.process(vision_output(i as f64 / 30.0), 0) {
                last = Some(published);
            }
        }
        let published = last.unwrap();
        assert_eq!(published.frame_index, 5);
        assert!(!published.output.is_path_blocked);
        assert!(published.output.ground_confidence > 0.5);
        assert!(published.stats.fps > 1.0);
        // Synthetic scene carved free space ahead of the user
        assert!(stage.grid().stats().valid_cells > 0);
    }

    #[test]
    fn test_degraded_frame_passes_through() {
        let mut stage = PipelineStage::new(PathfinderConfig::default()).unwrap();
        let msg = VisionOutput {
            maps: None,
            pose: FramePose::default(),
            hfov: 1.2,
            timestamp: 0.1,
            vision_ms: 0.0,
        };
        let (published, cue, _) = stage.process(msg, 3).unwrap();
        assert_eq!(published.output.ground_confidence, 0.0);
        assert!(!published.output.is_path_blocked);
        assert_eq!(published.stats.frames_dropped, 3);
        assert_eq!(cue, None); // one low frame is not yet a caution streak
    }

    #[test]
    fn test_non_monotonic_timestamp_skipped() {
        let mut stage = PipelineStage::new(PathfinderConfig::default()).unwrap();
        assert!(stage.process(vision_output(1.0), 0).is_some());
        assert!(stage.process(vision_output(0.5), 0).is_none());
        assert!(stage.process(vision_output(1.5), 0).is_some());
    }

    #[test]
    fn test_stream_cadence() {
        let mut config = PathfinderConfig::default();
        config.stream.send_every_n_frames = 3;
        config.grid.grid_size = 20; // keep packets small
        let mut stage = PipelineStage::new(config).unwrap();

        let mut packets = Vec::new();
        for i in 0..6 {
            if let Some((_, _, packet)) = stage.process(vision_output(i as f64 / 30.0), 0) {
                packets.push(packet.is_some());
            }
        }
        assert_eq!(packets, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_caution_streak_builds() {
        let mut stage = PipelineStage::new(PathfinderConfig::default()).unwrap();
        let degraded = |ts| VisionOutput {
            maps: None,
            pose: FramePose::default(),
            hfov: 1.2,
            timestamp: ts,
            vision_ms: 0.0,
        };

        let mut statuses = Vec::new();
        for i in 0..4 {
            let (published, _, _) = stage.process(degraded(i as f64 / 30.0), 0).unwrap();
            statuses.push(published.stats.status);
        }
        assert_eq!(statuses[0], PipelineStatus::Ok);
        assert_eq!(statuses[3], PipelineStatus::LowGroundConfidence);
    }
}
