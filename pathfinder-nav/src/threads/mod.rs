//! Thread topology of the pipeline driver.
//!
//! ```text
//!  source ──► intake mailbox(1) ──► vision (depth ∥ seg, joined)
//!                                        │ bounded(1)
//!                                        ▼
//!                                    pipeline ──► published state
//!                                        │├──► audio queue(8)
//!                                        │└──► stream queue(2)
//! ```
//!
//! Single-writer invariants: the pipeline thread is the only mutator of
//! the grid and planner; audio and stream threads only consume values.
//! The intake mailbox is the only drop point; queues downstream of the
//! pipeline lose their oldest purpose-specific payloads instead of
//! stalling the loop.

pub mod intake;
pub mod pipeline;
pub mod source;
pub mod vision;

pub use intake::{FrameIntake, FramePacket};
pub use vision::VisionOutput;

use crate::audio::{self, AudioSink};
use crate::shared::SharedState;
use crate::stream::StreamServer;
use crate::vision::ModelBundle;
use crossbeam_channel::bounded;
use pathfinder_core::PathfinderConfig;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Handles to every running thread.
pub struct PipelineHandles {
    pub source: JoinHandle<()>,
    pub vision: JoinHandle<()>,
    pub pipeline: JoinHandle<()>,
    pub audio: JoinHandle<()>,
    pub stream: Option<StreamServer>,
}

impl PipelineHandles {
    /// Join everything; called after shutdown has been signaled.
    pub fn join(self) {
        for (name, handle) in [
            ("source", self.source),
            ("vision", self.vision),
            ("pipeline", self.pipeline),
            ("audio", self.audio),
        ] {
            if handle.join().is_err() {
                tracing::error!("{} thread panicked", name);
            }
        }
        if let Some(stream) = self.stream {
            if stream.join().is_err() {
                tracing::error!("stream thread panicked");
            }
        }
    }
}

/// Runtime options that live outside the core config.
pub struct RunOptions {
    pub frames: u64,
    pub rate_hz: f32,
    pub stream_enabled: bool,
}

/// Wire up channels and spawn the whole pipeline.
pub fn spawn_pipeline(
    config: PathfinderConfig,
    models: ModelBundle,
    sink: Box<dyn AudioSink>,
    options: RunOptions,
    state: Arc<SharedState>,
) -> crate::error::Result<PipelineHandles> {
    let (frame_tx, frame_rx) = bounded(1);
    let (vision_tx, vision_rx) = bounded(1);
    let (audio_tx, audio_rx) = bounded(8);
    let (stream_tx, stream_rx) = bounded(2);

    let stream = if options.stream_enabled {
        Some(StreamServer::spawn(
            config.stream.tcp_port,
            stream_rx,
            Arc::clone(&state),
        )?)
    } else {
        None
    };

    let intake = FrameIntake::new(frame_tx, Arc::clone(&state));
    let source_state = Arc::clone(&state);
    let source = thread::Builder::new()
        .name("source".into())
        .spawn(move || source::run_source(intake, options.frames, options.rate_hz, source_state))
        .expect("failed to spawn source thread");

    let vision_state = Arc::clone(&state);
    let vision = thread::Builder::new()
        .name("vision".into())
        .spawn(move || vision::run_vision(models, frame_rx, vision_tx, vision_state))
        .expect("failed to spawn vision thread");

    let pipeline_state = Arc::clone(&state);
    let stream_sender = stream.as_ref().map(|_| stream_tx);
    let pipeline = thread::Builder::new()
        .name("pipeline".into())
        .spawn(move || {
            pipeline::run_pipeline(config, vision_rx, audio_tx, stream_sender, pipeline_state)
        })
        .expect("failed to spawn pipeline thread");

    let audio_state = Arc::clone(&state);
    let audio = thread::Builder::new()
        .name("audio".into())
        .spawn(move || audio::run_audio(audio_rx, sink, audio_state))
        .expect("failed to spawn audio thread");

    Ok(PipelineHandles {
        source,
        vision,
        pipeline,
        audio,
        stream,
    })
}
