//! Job lifecycle logging.
//!
//! A job is queued on submit, admitted once it holds a concurrency permit,
//! and releases the permit when its blocking run returns. Every line carries
//! the job id so interleaved jobs can be told apart.

use std::path::Path;
use std::time::Duration;

use tanden_media::ProcessedVideo;
use tanden_models::{JobId, ProgressSnapshot};
use tracing::{debug, error, info, Span};

use crate::error::WorkerError;

/// Logger bound to one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.clone(),
        }
    }

    /// Span wrapping everything the job does, including the pipeline's own
    /// `process_video` span.
    pub fn span(&self) -> Span {
        tracing::info_span!("pose_job", job_id = %self.job_id)
    }

    pub fn queued(&self, input: &Path, free_slots: usize) {
        info!(
            job_id = %self.job_id,
            input = %input.display(),
            free_slots,
            "Job queued"
        );
    }

    pub fn admitted(&self, waited: Duration) {
        info!(
            job_id = %self.job_id,
            waited_ms = waited.as_millis() as u64,
            "Job admitted"
        );
    }

    pub fn progress(&self, snapshot: &ProgressSnapshot) {
        info!(
            job_id = %self.job_id,
            progress = snapshot.progress,
            status = snapshot.status.as_str(),
            "Job progress"
        );
    }

    pub fn released(&self) {
        debug!(job_id = %self.job_id, "Job slot released");
    }

    pub fn completed(&self, video: &ProcessedVideo, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            frames = video.frames_processed,
            frames_with_pose = video.frames_with_pose,
            output_dir = %video.output_dir.display(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Job completed"
        );
    }

    pub fn failed(&self, err: &WorkerError) {
        error!(
            job_id = %self.job_id,
            kind = failure_kind(err),
            "Job failed: {}", err
        );
    }
}

/// Short label for the failure class, used as a log field.
pub fn failure_kind(err: &WorkerError) -> &'static str {
    match err {
        WorkerError::UnsupportedFormat(_) => "rejected",
        WorkerError::JobFailed(_) => "aborted",
        WorkerError::Media(e) => e.kind().as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tanden_media::{FrameStage, MediaError};

    #[test]
    fn test_failure_kind_labels() {
        assert_eq!(
            failure_kind(&WorkerError::UnsupportedFormat(PathBuf::from("a.avi"))),
            "rejected"
        );
        assert_eq!(
            failure_kind(&WorkerError::job_failed("Job panicked: boom")),
            "aborted"
        );
        assert_eq!(
            failure_kind(&MediaError::FileNotFound(PathBuf::from("/missing.mp4")).into()),
            "not_found"
        );
        assert_eq!(
            failure_kind(&MediaError::processing(2, FrameStage::Inference, "bad tensor").into()),
            "processing"
        );
    }
}
