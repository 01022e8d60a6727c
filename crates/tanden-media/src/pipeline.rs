//! Frame-by-frame pose overlay pipeline.
//!
//! One `process` call reads an input video sequentially and writes two
//! outputs in lock step: the dimmed frame with the pose drawn over it, and
//! the pose alone on black. Every stream handle lives in a [`StreamGuard`] so
//! it is released on every exit path; on success the releases are checked so
//! a failed flush is reported as an error.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::compose::Compositor;
use crate::config::PipelineConfig;
use crate::error::{FrameStage, MediaError, MediaResult, StreamDirection};
use crate::metrics;
use crate::output::OutputLayout;
use crate::pose::PoseModel;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::video::{Frame, FrameSink, FrameSource, MediaStream, OpenCvIo, StreamInfo, VideoIo};
use tanden_models::PROGRESS_COMPLETE;

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedVideo {
    pub output_dir: PathBuf,
    pub processed_path: PathBuf,
    pub skeleton_path: PathBuf,
    pub frames_processed: u64,
    pub frames_with_pose: u64,
    pub stream_info: StreamInfo,
}

/// Releases the wrapped stream on drop unless it was already released.
struct StreamGuard<S: MediaStream> {
    stream: S,
    label: &'static str,
}

impl<S: MediaStream> StreamGuard<S> {
    fn new(stream: S, label: &'static str) -> Self {
        Self { stream, label }
    }

    /// Release now and surface the result.
    fn finish(mut self) -> MediaResult<()> {
        self.stream.release()
    }
}

impl<S: MediaStream> Deref for StreamGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.stream
    }
}

impl<S: MediaStream> DerefMut for StreamGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: MediaStream> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        if self.stream.is_released() {
            return;
        }
        if let Err(e) = self.stream.release() {
            warn!(stream = self.label, error = %e, "Failed to release stream during cleanup");
        }
    }
}

/// Pose overlay pipeline.
///
/// Owns its pose model and reuses it across calls; tracking context is reset
/// at the start of each `process` call.
pub struct VideoPipeline<M: PoseModel, IO: VideoIo = OpenCvIo> {
    config: PipelineConfig,
    model: M,
    io: IO,
    compositor: Compositor,
    progress: Option<ProgressCallback>,
}

impl<M: PoseModel> VideoPipeline<M, OpenCvIo> {
    /// Create a pipeline that reads and writes through OpenCV.
    pub fn new(config: PipelineConfig, model: M) -> Self {
        Self::with_io(config, model, OpenCvIo)
    }
}

impl<M: PoseModel, IO: VideoIo> VideoPipeline<M, IO> {
    /// Create a pipeline over a custom video backend.
    pub fn with_io(config: PipelineConfig, model: M, io: IO) -> Self {
        Self {
            config,
            model,
            io,
            compositor: Compositor::default(),
            progress: None,
        }
    }

    /// Register the callback invoked once per frame and once more with 100
    /// at completion. Replaces any previous callback.
    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
    }

    /// Release the pose model. Later `process` calls fail at the first frame.
    pub fn close(&mut self) {
        self.model.close();
    }

    /// Process one video into its output directory.
    ///
    /// # Errors
    ///
    /// - `FileNotFound` when `input` is not an existing file; nothing is created
    /// - `StreamOpen`/`Io` when a stream or the output directory cannot be opened
    /// - `Processing` naming the frame and stage that failed
    pub fn process(&mut self, input: impl AsRef<Path>) -> MediaResult<ProcessedVideo> {
        let input = input.as_ref();
        let span = info_span!("process_video", input = %input.display());
        let _enter = span.enter();

        let started = Instant::now();
        let result = self.run(input);
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(video) => {
                metrics::record_video_completed(elapsed);
                info!(
                    output_dir = %video.output_dir.display(),
                    frames = video.frames_processed,
                    frames_with_pose = video.frames_with_pose,
                    elapsed_secs = elapsed,
                    "Video processed"
                );
            }
            Err(e) => {
                metrics::record_video_failed(e.kind());
                match e {
                    MediaError::Processing {
                        frame_number,
                        stage,
                        ..
                    } => error!(
                        frame = frame_number,
                        stage = %stage,
                        kind = e.kind().as_str(),
                        error = %e,
                        "Video processing failed"
                    ),
                    _ => error!(kind = e.kind().as_str(), error = %e, "Video processing failed"),
                }
            }
        }

        result
    }

    fn run(&mut self, input: &Path) -> MediaResult<ProcessedVideo> {
        if !input.is_file() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        self.model.reset();

        let layout = OutputLayout::claim(&self.config.downloads_root, input)?;

        let mut source = StreamGuard::new(self.io.open_source(input)?, "input");
        let info = source.info();
        if !info.has_geometry() {
            return Err(MediaError::stream_open(
                input,
                StreamDirection::Input,
                format!("stream reports {}x{} frames", info.width, info.height),
            ));
        }

        let mut processed = StreamGuard::new(
            self.io.open_sink(&layout.processed_path, &info)?,
            "processed",
        );
        let mut skeleton = StreamGuard::new(
            self.io.open_sink(&layout.skeleton_path, &info)?,
            "skeleton",
        );

        info!(
            output_dir = %layout.dir.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            declared_frames = info.frame_count,
            "Processing video"
        );

        let mut tracker = ProgressTracker::new(info.frame_count);
        let mut frames_with_pose = 0u64;

        loop {
            let index = tracker.frames();
            let image = match source.read_frame() {
                Ok(Some(image)) => image,
                Ok(None) => break,
                Err(e) => return Err(MediaError::processing(index + 1, FrameStage::Read, e)),
            };
            let frame = Frame { index, image };

            if self.process_frame(&frame, &mut *processed, &mut *skeleton)? {
                frames_with_pose += 1;
            }

            let percent = tracker.advance();
            self.report(percent);
        }

        source.finish()?;
        processed.finish()?;
        skeleton.finish()?;

        self.report(PROGRESS_COMPLETE);

        Ok(ProcessedVideo {
            output_dir: layout.dir,
            processed_path: layout.processed_path,
            skeleton_path: layout.skeleton_path,
            frames_processed: tracker.frames(),
            frames_with_pose,
            stream_info: info,
        })
    }

    /// Infer, compose and write one frame. Returns whether a pose was found.
    fn process_frame(
        &mut self,
        frame: &Frame,
        processed: &mut IO::Sink,
        skeleton: &mut IO::Sink,
    ) -> MediaResult<bool> {
        let started = Instant::now();

        let pose = self
            .model
            .infer(&frame.image)
            .map_err(|e| MediaError::processing(frame.number(), FrameStage::Inference, e))?;

        let composed = self
            .compositor
            .compose(&frame.image, pose.as_ref())
            .map_err(|e| MediaError::processing(frame.number(), FrameStage::Composite, e))?;

        processed
            .write_frame(&composed.processed)
            .map_err(|e| MediaError::processing(frame.number(), FrameStage::Write, e))?;
        skeleton
            .write_frame(&composed.skeleton)
            .map_err(|e| MediaError::processing(frame.number(), FrameStage::Write, e))?;

        let pose_found = pose.is_some();
        metrics::record_frame(pose_found, started.elapsed().as_secs_f64());
        debug!(frame = frame.number(), pose_found, "Frame written");

        Ok(pose_found)
    }

    fn report(&self, percent: f64) {
        if let Some(callback) = &self.progress {
            callback(percent);
        }
    }
}
