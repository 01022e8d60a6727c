//! Worker configuration.

use std::time::Duration;

use tanden_media::{PipelineConfig, PoseModelConfig};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs running at once
    pub max_concurrent_jobs: usize,
    /// How often job progress is polled and logged
    pub poll_interval: Duration,
    /// Output location for every job
    pub pipeline: PipelineConfig,
    /// Pose model used by every job
    pub model: PoseModelConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            poll_interval: Duration::from_millis(1000),
            pipeline: PipelineConfig::default(),
            model: PoseModelConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(2),
            poll_interval: Duration::from_millis(
                std::env::var("WORKER_PROGRESS_POLL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            pipeline: PipelineConfig::from_env(),
            model: PoseModelConfig::from_env(),
        }
    }
}
