//! pathfinder-nav - pipeline driver for the wearable navigation aid.
//!
//! Spawns the full thread topology (frame source, paired vision workers,
//! planning pipeline, audio consumer, debug stream), then monitors until
//! the frame budget is exhausted or a signal arrives.
//!
//! Exit codes: 0 normal, 2 configuration error, 3 model load failure.

mod audio;
mod config;
mod error;
mod pose;
mod shared;
mod stream;
mod threads;
mod vision;

use audio::LogAudioSink;
use clap::Parser;
use shared::SharedState;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use threads::RunOptions;
use vision::ModelBundle;

const EXIT_CONFIG: u8 = 2;
const EXIT_MODEL_LOAD: u8 = 3;

/// Real-time navigation aid pipeline
#[derive(Parser, Debug)]
#[command(name = "pathfinder-nav", version, about)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug stream TCP port
    #[arg(long)]
    port: Option<u16>,

    /// Grid cell edge length in meters
    #[arg(long)]
    cell_size: Option<f32>,

    /// Grid side length in cells
    #[arg(long)]
    grid_size: Option<usize>,

    /// Maximum mapping distance in meters
    #[arg(long)]
    max_distance: Option<f32>,

    /// Comma-separated walkable class IDs
    #[arg(long)]
    walkable_ids: Option<String>,

    /// Directory with model backends; omit to run the synthetic models
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Frames to run before exiting
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Synthetic source frame rate
    #[arg(long, default_value_t = 30.0)]
    rate: f32,

    /// Disable the debug stream listener
    #[arg(long)]
    no_stream: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pathfinder_nav=info,pathfinder_core=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut pathfinder_config = match config::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let overrides = config::Overrides {
        port: args.port,
        cell_size: args.cell_size,
        grid_size: args.grid_size,
        max_distance: args.max_distance,
        walkable_ids: args.walkable_ids.clone(),
    };
    if let Err(e) = config::apply_overrides(&mut pathfinder_config, &overrides) {
        tracing::error!("{}", e);
        return ExitCode::from(EXIT_CONFIG);
    }
    if let Err(e) = pathfinder_config.validate() {
        tracing::error!("{}", e);
        return ExitCode::from(EXIT_CONFIG);
    }

    let models = match ModelBundle::load(args.model_dir.as_deref()) {
        Ok(models) => models,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_MODEL_LOAD);
        }
    };

    tracing::info!(
        "pathfinder-nav v{}: {}x{} grid at {:.2} m/cell, {} frames at {:.0} Hz",
        env!("CARGO_PKG_VERSION"),
        pathfinder_config.grid.grid_size,
        pathfinder_config.grid.grid_size,
        pathfinder_config.grid.cell_size,
        args.frames,
        args.rate
    );

    let state = Arc::new(SharedState::new());

    // Signals flip a flag; the monitor loop turns it into a shutdown
    let term = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&term)) {
            tracing::warn!("failed to register signal handler: {}", e);
        }
    }

    let handles = match threads::spawn_pipeline(
        pathfinder_config,
        models,
        Box::new(LogAudioSink),
        RunOptions {
            frames: args.frames,
            rate_hz: args.rate,
            stream_enabled: !args.no_stream,
        },
        Arc::clone(&state),
    ) {
        Ok(handles) => handles,
        Err(e) => {
            tracing::error!("failed to start pipeline: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    // Monitor until the source finishes or a signal arrives
    let mut last_report = std::time::Instant::now();
    loop {
        std::thread::sleep(Duration::from_millis(200));

        if term.load(Ordering::Relaxed) {
            tracing::info!("signal received, shutting down");
            state.signal_shutdown();
        }
        if state.should_shutdown() {
            break;
        }

        if last_report.elapsed() >= Duration::from_secs(2) {
            if let Some(frame) = state.latest() {
                tracing::info!(
                    "frame {}: {:.1} fps, vision {:.1} ms, {} dropped, status {}",
                    frame.frame_index,
                    frame.stats.fps,
                    frame.stats.vision_ms,
                    frame.stats.frames_dropped,
                    frame.stats.status
                );
            }
            last_report = std::time::Instant::now();
        }
    }

    handles.join();

    if let Some(frame) = state.latest() {
        tracing::info!(
            "processed {} frames at {:.1} fps ({} dropped at intake, {} samples skipped)",
            frame.stats.frames_processed,
            state.fps(),
            state.dropped_frames(),
            frame.stats.samples_skipped
        );
    }
    ExitCode::SUCCESS
}
