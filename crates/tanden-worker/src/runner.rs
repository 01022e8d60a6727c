//! Background job runner.
//!
//! Inputs are validated synchronously so a bad path is rejected before any
//! job exists. Accepted jobs get a progress slot seeded at 0 and run on the
//! blocking pool, at most `max_concurrent_jobs` at a time. A job that fails
//! for any reason leaves `-1` in its slot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::counter;
use tanden_media::{
    progress_callback_for, BlazePoseModel, MediaError, MediaResult, PipelineConfig,
    PoseModelConfig, ProcessedVideo, ProgressCallback, ProgressSink, ProgressTable, VideoPipeline,
};
use tanden_models::{JobId, ProgressSnapshot};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

const JOBS_SUBMITTED_TOTAL: &str = "tanden_jobs_submitted_total";
const JOBS_REJECTED_TOTAL: &str = "tanden_jobs_rejected_total";

/// Runs one job to completion on a blocking thread.
pub trait JobHandler: Send + Sync + 'static {
    fn run(&self, input: &Path, progress: ProgressCallback) -> MediaResult<ProcessedVideo>;
}

/// Loads the pose model and runs the OpenCV pipeline for each job.
#[derive(Debug, Clone)]
pub struct PoseJobHandler {
    pipeline: PipelineConfig,
    model: PoseModelConfig,
}

impl PoseJobHandler {
    pub fn new(pipeline: PipelineConfig, model: PoseModelConfig) -> Self {
        Self { pipeline, model }
    }
}

impl JobHandler for PoseJobHandler {
    fn run(&self, input: &Path, progress: ProgressCallback) -> MediaResult<ProcessedVideo> {
        let model = BlazePoseModel::new(&self.model)?;
        let mut pipeline = VideoPipeline::new(self.pipeline.clone(), model);
        pipeline.set_progress_callback(progress);
        let result = pipeline.process(input);
        pipeline.close();
        result
    }
}

/// Reject anything that is not an existing `.mp4` file.
pub fn validate_input(path: &Path) -> WorkerResult<()> {
    let is_mp4 = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("mp4"))
        .unwrap_or(false);
    if !is_mp4 {
        return Err(WorkerError::UnsupportedFormat(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(MediaError::FileNotFound(path.to_path_buf()).into());
    }
    Ok(())
}

/// A submitted job.
pub struct JobHandle {
    pub job_id: JobId,
    task: JoinHandle<WorkerResult<ProcessedVideo>>,
}

impl JobHandle {
    /// Wait for the job to finish.
    pub async fn wait(self) -> WorkerResult<ProcessedVideo> {
        self.task
            .await
            .map_err(|e| WorkerError::job_failed(format!("Job task aborted: {e}")))?
    }
}

/// Schedules jobs and owns their progress slots.
pub struct JobRunner<H: JobHandler = PoseJobHandler> {
    handler: Arc<H>,
    progress: ProgressTable,
    permits: Arc<Semaphore>,
}

impl<H: JobHandler> JobRunner<H> {
    pub fn new(handler: H, max_concurrent_jobs: usize) -> Self {
        Self {
            handler: Arc::new(handler),
            progress: ProgressTable::new(),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    pub fn progress(&self) -> &ProgressTable {
        &self.progress
    }

    pub fn status(&self, job_id: &JobId) -> Option<ProgressSnapshot> {
        self.progress.snapshot(job_id)
    }

    /// Validate `input` and schedule it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, input: impl Into<PathBuf>) -> WorkerResult<JobHandle> {
        let input = input.into();
        if let Err(e) = validate_input(&input) {
            counter!(JOBS_REJECTED_TOTAL).increment(1);
            return Err(e);
        }
        counter!(JOBS_SUBMITTED_TOTAL).increment(1);

        let job_id = JobId::new();
        self.progress.register(&job_id);

        let logger = JobLogger::new(&job_id);
        logger.queued(&input, self.permits.available_permits());
        let span = logger.span();
        let handler = Arc::clone(&self.handler);
        let permits = Arc::clone(&self.permits);
        let table = self.progress.clone();
        let slot_id = job_id.clone();

        let task = tokio::spawn(
            async move {
                let result =
                    run_job(handler, permits, table.clone(), slot_id.clone(), input, &logger)
                        .await;
                if let Err(e) = &result {
                    table.fail(&slot_id);
                    logger.failed(e);
                }
                result
            }
            .instrument(span),
        );

        Ok(JobHandle { job_id, task })
    }

    /// Log every job's progress each `interval` until all jobs are terminal.
    pub async fn poll_until_settled(&self, interval: Duration) {
        loop {
            let snapshots = self.progress.snapshots();
            for (job_id, snapshot) in &snapshots {
                JobLogger::new(job_id).progress(snapshot);
            }
            if snapshots.iter().all(|(_, s)| s.status.is_terminal()) {
                return;
            }
            tokio::time::sleep(interval).await;
        }
    }
}

async fn run_job<H: JobHandler>(
    handler: Arc<H>,
    permits: Arc<Semaphore>,
    table: ProgressTable,
    job_id: JobId,
    input: PathBuf,
    logger: &JobLogger,
) -> WorkerResult<ProcessedVideo> {
    let queued_at = Instant::now();
    let permit = permits
        .acquire_owned()
        .await
        .map_err(|_| WorkerError::job_failed("Job runner shut down"))?;
    logger.admitted(queued_at.elapsed());

    let sink: Arc<dyn ProgressSink> = Arc::new(table);
    let callback = progress_callback_for(sink, job_id);

    let started = Instant::now();
    let joined = tokio::task::spawn_blocking(move || handler.run(&input, callback)).await;
    drop(permit);
    logger.released();

    let video = match joined {
        Ok(result) => result?,
        Err(e) => {
            debug!(error = ?e, "Blocking task join error");
            return Err(WorkerError::job_failed(format!("Job panicked: {e}")));
        }
    };
    logger.completed(&video, started.elapsed());
    Ok(video)
}
