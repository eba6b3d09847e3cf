//! Shared state between the pipeline thread and its consumers.
//!
//! The pipeline thread is the only writer. Consumers (audio, stream,
//! status display) read the latest published block; they never see a
//! partially written frame because publication swaps the whole value
//! under the lock.

use pathfinder_core::NavigationOutput;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;

/// Atomic wrapper for f32 values, stored as raw bits.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(val: f32) -> Self {
        Self(AtomicU32::new(val.to_bits()))
    }

    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    pub fn store(&self, val: f32, order: Ordering) {
        self.0.store(val.to_bits(), order);
    }
}

/// User-facing pipeline condition, mirrored in the UI string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStatus {
    Ok,
    LowGroundConfidence,
    Blocked,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStatus::Ok => write!(f, "OK"),
            PipelineStatus::LowGroundConfidence => write!(f, "LOW GROUND CONFIDENCE"),
            PipelineStatus::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// Health counters published alongside every navigation output.
#[derive(Clone, Copy, Debug)]
pub struct SensorStats {
    /// Smoothed frames per second over processed frames
    pub fps: f32,
    /// Wall time of the last vision pass, milliseconds
    pub vision_ms: f32,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    /// Samples skipped for being non-finite or out of range
    pub samples_skipped: u64,
    pub status: PipelineStatus,
}

impl Default for SensorStats {
    fn default() -> Self {
        Self {
            fps: 0.0,
            vision_ms: 0.0,
            frames_processed: 0,
            frames_dropped: 0,
            samples_skipped: 0,
            status: PipelineStatus::Ok,
        }
    }
}

/// One published frame: the decision plus the stats snapshot, stamped
/// with the frame index.
#[derive(Clone, Debug)]
pub struct PublishedFrame {
    pub output: NavigationOutput,
    pub stats: SensorStats,
    pub frame_index: u64,
}

/// Shared state handle. Cheap to clone behind an Arc.
#[derive(Debug)]
pub struct SharedState {
    published: RwLock<Option<PublishedFrame>>,
    /// Lock-free mirror of the published fps, for cheap status reads
    fps: AtomicF32,
    /// Frames dropped at the intake mailbox (written by the intake side)
    pub frames_dropped: AtomicU64,
    shutdown: AtomicBool,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            published: RwLock::new(None),
            fps: AtomicF32::new(0.0),
            frames_dropped: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Publish a processed frame. Consumers always see the newest value.
    pub fn publish(&self, frame: PublishedFrame) {
        self.fps.store(frame.stats.fps, Ordering::Relaxed);
        if let Ok(mut guard) = self.published.write() {
            *guard = Some(frame);
        }
    }

    /// Current processing rate without touching the published lock.
    pub fn fps(&self) -> f32 {
        self.fps.load(Ordering::Relaxed)
    }

    /// Latest published frame, if any frame has completed yet.
    pub fn latest(&self) -> Option<PublishedFrame> {
        self.published.read().ok().and_then(|guard| guard.clone())
    }

    pub fn note_dropped_frame(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_frames(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f32_round_trip() {
        let a = AtomicF32::new(1.5);
        assert_eq!(a.load(Ordering::Relaxed), 1.5);
        a.store(-0.25, Ordering::Relaxed);
        assert_eq!(a.load(Ordering::Relaxed), -0.25);
    }

    #[test]
    fn test_publish_and_latest() {
        let state = SharedState::new();
        assert!(state.latest().is_none());

        state.publish(PublishedFrame {
            output: NavigationOutput::degraded(),
            stats: SensorStats::default(),
            frame_index: 7,
        });
        let latest = state.latest().unwrap();
        assert_eq!(latest.frame_index, 7);

        state.publish(PublishedFrame {
            output: NavigationOutput::degraded(),
            stats: SensorStats {
                fps: 29.5,
                ..SensorStats::default()
            },
            frame_index: 8,
        });
        assert_eq!(state.latest().unwrap().frame_index, 8);
        assert_eq!(state.fps(), 29.5);
    }

    #[test]
    fn test_shutdown_flag() {
        let state = SharedState::new();
        assert!(!state.should_shutdown());
        state.signal_shutdown();
        assert!(state.should_shutdown());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(PipelineStatus::Blocked.to_string(), "BLOCKED");
        assert_eq!(
            PipelineStatus::LowGroundConfidence.to_string(),
            "LOW GROUND CONFIDENCE"
        );
    }
}
