//! Worker error types.

use std::path::PathBuf;

use tanden_media::{ErrorKind, MediaError};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Unsupported input format (expected .mp4): {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Whether the input was rejected before a job was scheduled.
    pub fn is_rejection(&self) -> bool {
        match self {
            WorkerError::UnsupportedFormat(_) => true,
            WorkerError::Media(e) => e.kind() == ErrorKind::NotFound,
            _ => false,
        }
    }
}
