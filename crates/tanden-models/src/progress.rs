//! Progress values shared between the pipeline and whoever polls it.
//!
//! A job's progress is a single `f64` slot: `0.0` when the job is created,
//! rising towards `100.0` while frames are consumed, and `-1.0` once the job
//! has failed.

use serde::{Deserialize, Serialize};

/// Value a slot holds when its job is created.
pub const PROGRESS_START: f64 = 0.0;

/// Value forced once a job has consumed its whole input.
pub const PROGRESS_COMPLETE: f64 = 100.0;

/// Terminal failure sentinel.
pub const PROGRESS_FAILED: f64 = -1.0;

/// Coarse status derived from a progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    Processing,
    Complete,
    Failed,
}

impl ProgressStatus {
    /// Derive the status for a raw slot value.
    pub fn from_value(value: f64) -> Self {
        if value < 0.0 {
            ProgressStatus::Failed
        } else if value < PROGRESS_COMPLETE {
            ProgressStatus::Processing
        } else {
            ProgressStatus::Complete
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Processing => "processing",
            ProgressStatus::Complete => "complete",
            ProgressStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressStatus::Processing)
    }
}

/// Poll response for one job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Raw slot value (percentage, or the failure sentinel)
    pub progress: f64,
    pub status: ProgressStatus,
}

impl ProgressSnapshot {
    pub fn from_value(progress: f64) -> Self {
        Self {
            progress,
            status: ProgressStatus::from_value(progress),
        }
    }
}
