//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host process installs a recorder.

use metrics::{counter, histogram};

use crate::error::ErrorKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_PROCESSED_TOTAL: &str = "tanden_frames_processed_total";
    pub const FRAME_DURATION_SECONDS: &str = "tanden_frame_duration_seconds";
    pub const VIDEOS_COMPLETED_TOTAL: &str = "tanden_videos_completed_total";
    pub const VIDEOS_FAILED_TOTAL: &str = "tanden_videos_failed_total";
    pub const VIDEO_DURATION_SECONDS: &str = "tanden_video_duration_seconds";
}

/// Record one processed frame.
pub fn record_frame(pose_found: bool, duration_secs: f64) {
    let labels = [("pose", if pose_found { "found" } else { "missing" }.to_string())];
    counter!(names::FRAMES_PROCESSED_TOTAL, &labels).increment(1);
    histogram!(names::FRAME_DURATION_SECONDS).record(duration_secs);
}

/// Record a video that finished successfully.
pub fn record_video_completed(duration_secs: f64) {
    counter!(names::VIDEOS_COMPLETED_TOTAL).increment(1);
    histogram!(names::VIDEO_DURATION_SECONDS).record(duration_secs);
}

/// Record a video that failed.
pub fn record_video_failed(kind: ErrorKind) {
    let labels = [("kind", kind.as_str().to_string())];
    counter!(names::VIDEOS_FAILED_TOTAL, &labels).increment(1);
}
