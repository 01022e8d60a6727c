#![deny(unreachable_patterns)]
//! Pose estimation video pipeline.
//!
//! This crate provides:
//! - A `PoseModel` adapter around the BlazePose landmark network (ONNX Runtime)
//! - Frame compositing: dimmed overlay and skeleton-only renderings
//! - Streaming video I/O over OpenCV with guaranteed handle release
//! - `VideoPipeline`, the blocking read → infer → composite → write loop
//! - Progress callbacks and job-keyed progress sinks

pub mod compose;
pub mod config;
pub mod error;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod pose;
pub mod progress;
pub mod video;

pub use compose::{ComposedFrames, Compositor, DrawingSpec};
pub use config::{PipelineConfig, PoseModelConfig};
pub use error::{ErrorKind, FrameStage, MediaError, MediaResult, StreamDirection};
pub use output::OutputLayout;
pub use pipeline::{ProcessedVideo, VideoPipeline};
pub use pose::{
    BlazePoseModel, Landmark, PoseEstimate, PoseLandmark, PoseModel, TandenMarker,
    POSE_CONNECTIONS,
};
pub use progress::{
    progress_callback_for, ProgressCallback, ProgressSink, ProgressTable, ProgressTracker,
};
pub use video::{Frame, FrameSink, FrameSource, MediaStream, OpenCvIo, StreamInfo, VideoIo};
