//! Frame-level video I/O.
//!
//! The pipeline only talks to these traits; [`OpenCvIo`] is the production
//! backend. Handles are released explicitly so close failures surface as
//! errors, and the pipeline wraps every handle in a drop guard for the
//! error paths.

mod opencv_io;

pub use opencv_io::{CaptureSource, Mp4Sink, OpenCvIo, OUTPUT_FOURCC};

use std::path::Path;

use opencv::core::{Mat, Size};
use serde::Serialize;

use crate::error::MediaResult;

/// Geometry and timing read once from the input header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamInfo {
    pub width: i32,
    pub height: i32,
    pub fps: f64,
    /// Frame count declared by the container; may be zero or inaccurate.
    pub frame_count: u64,
}

impl StreamInfo {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn has_geometry(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A decoded frame and its 0-based position in presentation order.
pub struct Frame {
    pub index: u64,
    pub image: Mat,
}

impl Frame {
    /// 1-based frame number used for progress and error reports.
    pub fn number(&self) -> u64 {
        self.index + 1
    }
}

/// Anything holding a native stream handle.
pub trait MediaStream {
    /// Release the handle. Calling it again is a no-op.
    fn release(&mut self) -> MediaResult<()>;

    fn is_released(&self) -> bool;
}

/// Sequential BGR frame reader.
pub trait FrameSource: MediaStream {
    fn info(&self) -> StreamInfo;

    /// Next frame, or `None` once the stream is exhausted.
    fn read_frame(&mut self) -> MediaResult<Option<Mat>>;
}

/// Sequential BGR frame writer.
pub trait FrameSink: MediaStream {
    fn write_frame(&mut self, frame: &Mat) -> MediaResult<()>;
}

/// Factory for opening readers and writers.
pub trait VideoIo {
    type Source: FrameSource;
    type Sink: FrameSink;

    fn open_source(&self, path: &Path) -> MediaResult<Self::Source>;

    /// Open a writer with the same geometry and frame rate as `info`.
    fn open_sink(&self, path: &Path, info: &StreamInfo) -> MediaResult<Self::Sink>;
}
