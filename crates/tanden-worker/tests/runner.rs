//! Job runner behavior with scripted handlers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tanden_media::{
    FrameStage, MediaError, MediaResult, ProcessedVideo, ProgressCallback, StreamInfo,
};
use tanden_models::ProgressStatus;
use tanden_worker::{JobHandler, JobRunner, WorkerError};

/// Reports two progress steps and either succeeds or fails on the second.
#[derive(Default)]
struct ScriptedHandler {
    fail: bool,
    in_flight: AtomicUsize,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedHandler {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl JobHandler for ScriptedHandler {
    fn run(&self, input: &Path, progress: ProgressCallback) -> MediaResult<ProcessedVideo> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        progress(50.0);
        std::thread::sleep(Duration::from_millis(30));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(MediaError::processing(2, FrameStage::Inference, "session lost"));
        }
        progress(100.0);

        let dir = input.with_extension("");
        Ok(ProcessedVideo {
            processed_path: dir.join("clip_processed.mp4"),
            skeleton_path: dir.join("clip_skeletonOnly.mp4"),
            output_dir: dir,
            frames_processed: 2,
            frames_with_pose: 1,
            stream_info: StreamInfo {
                width: 64,
                height: 48,
                fps: 30.0,
                frame_count: 2,
            },
        })
    }
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}

#[tokio::test]
async fn test_successful_job_reaches_complete() {
    let tmp = tempfile::tempdir().unwrap();
    let input = touch(tmp.path(), "clip.mp4");
    let runner = JobRunner::new(ScriptedHandler::default(), 2);

    let handle = runner.submit(&input).unwrap();
    let job_id = handle.job_id.clone();
    assert!(runner.status(&job_id).is_some());

    let video = handle.wait().await.unwrap();
    assert_eq!(video.frames_processed, 2);

    let snapshot = runner.status(&job_id).unwrap();
    assert_eq!(snapshot.progress, 100.0);
    assert_eq!(snapshot.status, ProgressStatus::Complete);
}

#[tokio::test]
async fn test_failed_job_sets_sentinel() {
    let tmp = tempfile::tempdir().unwrap();
    let input = touch(tmp.path(), "clip.mp4");
    let runner = JobRunner::new(ScriptedHandler::failing(), 2);

    let handle = runner.submit(&input).unwrap();
    let job_id = handle.job_id.clone();
    let err = handle.wait().await.unwrap_err();

    assert!(matches!(
        err,
        WorkerError::Media(MediaError::Processing { frame_number: 2, .. })
    ));
    let snapshot = runner.status(&job_id).unwrap();
    assert_eq!(snapshot.progress, -1.0);
    assert_eq!(snapshot.status, ProgressStatus::Failed);
}

#[tokio::test]
async fn test_rejected_inputs_get_no_slot() {
    let tmp = tempfile::tempdir().unwrap();
    let avi = touch(tmp.path(), "clip.avi");
    let runner = JobRunner::new(ScriptedHandler::default(), 1);

    let err = runner.submit(tmp.path().join("missing.mp4")).err().unwrap();
    assert!(err.is_rejection());
    let err = runner.submit(&avi).err().unwrap();
    assert!(matches!(err, WorkerError::UnsupportedFormat(_)));

    assert!(runner.progress().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrency_is_bounded() {
    let tmp = tempfile::tempdir().unwrap();
    let handler = ScriptedHandler::default();
    let max_in_flight = Arc::clone(&handler.max_in_flight);
    let runner = JobRunner::new(handler, 1);

    let handles: Vec<_> = (0..3)
        .map(|i| runner.submit(touch(tmp.path(), &format!("clip{i}.mp4"))).unwrap())
        .collect();

    tokio::time::timeout(
        Duration::from_secs(5),
        runner.poll_until_settled(Duration::from_millis(5)),
    )
    .await
    .unwrap();

    for handle in handles {
        handle.wait().await.unwrap();
    }

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    let snapshots = runner.progress().snapshots();
    assert_eq!(snapshots.len(), 3);
    assert!(snapshots
        .iter()
        .all(|(_, s)| s.status == ProgressStatus::Complete));
}
