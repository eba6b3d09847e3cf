//! Error types for the pipeline driver.

use thiserror::Error;

/// Driver error type. Config and model-load failures are fatal at
/// startup; everything else is recovered per frame.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("vision output shape mismatch: {0}")]
    Shape(String),

    #[error("stream error: {0}")]
    Stream(#[from] std::io::Error),
}

impl From<pathfinder_core::CoreError> for NavError {
    fn from(e: pathfinder_core::CoreError) -> Self {
        match e {
            pathfinder_core::CoreError::InvalidDimensions(msg) => NavError::Shape(msg),
            pathfinder_core::CoreError::InvalidConfig(msg) => NavError::Config(msg),
            pathfinder_core::CoreError::Snapshot(msg) => NavError::Config(msg),
        }
    }
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
