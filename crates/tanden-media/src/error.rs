//! Error types for media operations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Which side of the pipeline a stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    Input,
    Output,
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamDirection::Input => f.write_str("input"),
            StreamDirection::Output => f.write_str("output"),
        }
    }
}

/// Per-frame stage in which a processing error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Read,
    Inference,
    Composite,
    Write,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameStage::Read => "read",
            FrameStage::Inference => "inference",
            FrameStage::Composite => "composite",
            FrameStage::Write => "write",
        };
        f.write_str(s)
    }
}

/// Coarse classification callers map to user-visible behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input (or model file) does not exist
    NotFound,
    /// A stream or the filesystem could not be opened or created
    Io,
    /// Failure while inferring, drawing or writing a frame
    Processing,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Io => "io",
            ErrorKind::Processing => "processing",
        }
    }
}

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to open {direction} stream {path}: {message}")]
    StreamOpen {
        path: PathBuf,
        direction: StreamDirection,
        message: String,
    },

    #[error("Frame {frame_number} failed during {stage}: {message}")]
    Processing {
        frame_number: u64,
        stage: FrameStage,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Pose detection failed: {0}")]
    DetectionFailed(String),

    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    #[error("Stream operation failed: {0}")]
    StreamFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Pose model has been closed")]
    ModelClosed,
}

impl MediaError {
    /// Create a stream open failure error.
    pub fn stream_open(
        path: impl Into<PathBuf>,
        direction: StreamDirection,
        message: impl Into<String>,
    ) -> Self {
        Self::StreamOpen {
            path: path.into(),
            direction,
            message: message.into(),
        }
    }

    /// Wrap a per-frame failure with the frame number and stage it happened in.
    pub fn processing(frame_number: u64, stage: FrameStage, source: impl fmt::Display) -> Self {
        Self::Processing {
            frame_number,
            stage,
            message: source.to_string(),
        }
    }

    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create a rendering failure error.
    pub fn render_failed(message: impl Into<String>) -> Self {
        Self::RenderFailed(message.into())
    }

    /// Create a stream read/write/release failure error.
    pub fn stream_failed(message: impl Into<String>) -> Self {
        Self::StreamFailed(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::FileNotFound(_) | MediaError::ModelNotFound(_) => ErrorKind::NotFound,
            MediaError::StreamOpen { .. } | MediaError::Io(_) | MediaError::InvalidVideo(_) => {
                ErrorKind::Io
            }
            MediaError::Processing { .. }
            | MediaError::DetectionFailed(_)
            | MediaError::RenderFailed(_)
            | MediaError::StreamFailed(_)
            | MediaError::ModelClosed => ErrorKind::Processing,
        }
    }
}
