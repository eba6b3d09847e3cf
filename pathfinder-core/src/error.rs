//! Error types for pathfinder-core.

use thiserror::Error;

/// Core error type. Construction-time failures only; per-frame
/// degradation is expressed through degraded values, never errors.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("malformed snapshot: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
