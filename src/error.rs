//! Failure kinds surfaced by the capture → score → decide pipeline.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Capture device could not be opened (privilege, missing interface).
    #[error("capture could not start on {device}: {message}")]
    CaptureStartup { device: String, message: String },

    #[error("capture failed while reading packets: {0}")]
    CaptureRead(String),

    #[error("feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("failed to load classifier artifact {path}: {message}")]
    ArtifactLoad { path: PathBuf, message: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline stage a failure belongs to, reported to the trigger layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Capture,
    Scoring,
    Storage,
}

impl PipelineError {
    pub fn artifact_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ArtifactLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn capture_startup(device: impl Into<String>, message: impl ToString) -> Self {
        Self::CaptureStartup {
            device: device.into(),
            message: message.to_string(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::CaptureStartup { .. } | Self::CaptureRead(_) => Stage::Capture,
            Self::SchemaMismatch(_) | Self::ArtifactLoad { .. } | Self::Inference(_) => {
                Stage::Scoring
            }
            Self::Storage(_) | Self::Io(_) | Self::Csv(_) => Stage::Storage,
        }
    }
}
