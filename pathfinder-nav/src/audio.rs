//! Audio cue mapping and the sink consumer thread.
//!
//! The pipeline maps every navigation output to at most one spatialized
//! cue; the audio thread forwards cues to whatever sink is attached.
//! Synthesis itself is an external collaborator behind [`AudioSink`].

use crate::shared::SharedState;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use pathfinder_core::NavigationOutput;
use std::sync::Arc;
use std::time::Duration;

/// Surface-change severity derived from discontinuity magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CueSeverity {
    Gentle,
    Moderate,
    Urgent,
}

impl CueSeverity {
    pub fn from_magnitude(magnitude: f32) -> Self {
        if magnitude < 0.3 {
            CueSeverity::Gentle
        } else if magnitude < 0.6 {
            CueSeverity::Moderate
        } else {
            CueSeverity::Urgent
        }
    }
}

/// One spatialized audio event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioCue {
    /// Surface discontinuity close ahead
    SurfaceChange {
        bearing: f32,
        distance: f32,
        severity: CueSeverity,
    },
    /// Path fully blocked: obstacle rendered at arm's length
    ImminentObstacle { bearing: f32, distance: f32 },
    /// Obstacle within hearing range
    Obstacle { bearing: f32, distance: f32 },
    /// Ground confidence has been low for consecutive frames
    Caution,
}

/// Distance under which a surface change is announced.
const SURFACE_CHANGE_RANGE: f32 = 3.0;
/// Obstacles beyond this stay silent.
const OBSTACLE_RANGE: f32 = 5.0;
/// Rendered distance for a blocked path.
const IMMINENT_DISTANCE: f32 = 0.1;
/// Ground confidence floor and how many frames it must persist.
const LOW_GROUND_CONFIDENCE: f32 = 0.3;
pub const LOW_GROUND_STREAK: u32 = 3;

/// Map one navigation output to its cue, if any.
pub fn cue_for(output: &NavigationOutput, low_ground_streak: u32) -> Option<AudioCue> {
    if let Some(disc) = &output.discontinuity_ahead {
        if disc.distance < SURFACE_CHANGE_RANGE {
            return Some(AudioCue::SurfaceChange {
                bearing: disc.bearing,
                distance: disc.distance,
                severity: CueSeverity::from_magnitude(disc.magnitude),
            });
        }
    }
    if output.is_path_blocked {
        return Some(AudioCue::ImminentObstacle {
            bearing: output.nearest_obstacle_bearing,
            distance: IMMINENT_DISTANCE,
        });
    }
    if output.nearest_obstacle_distance < OBSTACLE_RANGE {
        return Some(AudioCue::Obstacle {
            bearing: output.nearest_obstacle_bearing,
            distance: output.nearest_obstacle_distance,
        });
    }
    if output.ground_confidence < LOW_GROUND_CONFIDENCE && low_ground_streak >= LOW_GROUND_STREAK {
        return Some(AudioCue::Caution);
    }
    None
}

/// Spatial audio synthesis contract.
pub trait AudioSink: Send {
    fn play(&mut self, cue: &AudioCue);
}

/// Default sink: cues land in the log instead of headphones.
pub struct LogAudioSink;

impl AudioSink for LogAudioSink {
    fn play(&mut self, cue: &AudioCue) {
        match cue {
            AudioCue::SurfaceChange {
                bearing,
                distance,
                severity,
            } => tracing::info!(
                "cue: surface change {:?} at {:.1} m, bearing {:.2}",
                severity,
                distance,
                bearing
            ),
            AudioCue::ImminentObstacle { bearing, .. } => {
                tracing::warn!("cue: path blocked, bearing {:.2}", bearing)
            }
            AudioCue::Obstacle { bearing, distance } => {
                tracing::info!("cue: obstacle at {:.1} m, bearing {:.2}", distance, bearing)
            }
            AudioCue::Caution => tracing::warn!("cue: caution, low ground confidence"),
        }
    }
}

/// Audio thread loop: drain cues until shutdown.
pub fn run_audio(rx: Receiver<AudioCue>, mut sink: Box<dyn AudioSink>, state: Arc<SharedState>) {
    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(cue) => sink.play(&cue),
            Err(RecvTimeoutError::Timeout) => {
                if state.should_shutdown() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!("audio thread exiting");
}
