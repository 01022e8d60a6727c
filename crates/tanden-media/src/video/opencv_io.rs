//! OpenCV `VideoCapture` / `VideoWriter` backend.

use std::path::{Path, PathBuf};

use opencv::core::Mat;
use opencv::prelude::{
    MatTraitConst, VideoCaptureTrait, VideoCaptureTraitConst, VideoWriterTrait,
    VideoWriterTraitConst,
};
use opencv::videoio::{self, VideoCapture, VideoWriter};
use tracing::{debug, info};

use super::{FrameSink, FrameSource, MediaStream, StreamInfo, VideoIo};
use crate::error::{MediaError, MediaResult, StreamDirection};

/// Codec used for both outputs.
pub const OUTPUT_FOURCC: [char; 4] = ['m', 'p', '4', 'v'];

/// Production video backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvIo;

impl VideoIo for OpenCvIo {
    type Source = CaptureSource;
    type Sink = Mp4Sink;

    fn open_source(&self, path: &Path) -> MediaResult<CaptureSource> {
        CaptureSource::open(path)
    }

    fn open_sink(&self, path: &Path, info: &StreamInfo) -> MediaResult<Mp4Sink> {
        Mp4Sink::create(path, info)
    }
}

fn path_str(path: &Path) -> MediaResult<&str> {
    path.to_str()
        .ok_or_else(|| MediaError::InvalidVideo(format!("Non UTF-8 path: {}", path.display())))
}

/// Input video opened through `VideoCapture`.
pub struct CaptureSource {
    path: PathBuf,
    capture: Option<VideoCapture>,
    info: StreamInfo,
}

impl CaptureSource {
    pub fn open(path: &Path) -> MediaResult<Self> {
        let open_err =
            |message: String| MediaError::stream_open(path, StreamDirection::Input, message);

        let mut capture = VideoCapture::from_file(path_str(path)?, videoio::CAP_ANY)
            .map_err(|e| open_err(e.to_string()))?;

        if !capture.is_opened().unwrap_or(false) {
            let _ = capture.release();
            return Err(open_err("capture did not open".to_string()));
        }

        let info = StreamInfo {
            width: capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as i32,
            height: capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as i32,
            fps: capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0),
            frame_count: capture
                .get(videoio::CAP_PROP_FRAME_COUNT)
                .unwrap_or(0.0)
                .max(0.0) as u64,
        };

        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            frame_count = info.frame_count,
            "Opened input video"
        );

        Ok(Self {
            path: path.to_path_buf(),
            capture: Some(capture),
            info,
        })
    }
}

impl MediaStream for CaptureSource {
    fn release(&mut self) -> MediaResult<()> {
        if let Some(mut capture) = self.capture.take() {
            capture.release().map_err(|e| {
                MediaError::stream_failed(format!(
                    "Failed to release {}: {e}",
                    self.path.display()
                ))
            })?;
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.capture.is_none()
    }
}

impl FrameSource for CaptureSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn read_frame(&mut self) -> MediaResult<Option<Mat>> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| MediaError::stream_failed("Read from released capture"))?;

        let mut frame = Mat::default();
        let grabbed = capture
            .read(&mut frame)
            .map_err(|e| MediaError::stream_failed(format!("Frame decode failed: {e}")))?;

        if !grabbed || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

/// MPEG-4 output written through `VideoWriter`.
pub struct Mp4Sink {
    path: PathBuf,
    writer: Option<VideoWriter>,
}

impl Mp4Sink {
    pub fn create(path: &Path, info: &StreamInfo) -> MediaResult<Self> {
        let open_err =
            |message: String| MediaError::stream_open(path, StreamDirection::Output, message);

        let [a, b, c, d] = OUTPUT_FOURCC;
        let fourcc = VideoWriter::fourcc(a, b, c, d).map_err(|e| open_err(e.to_string()))?;

        let mut writer = VideoWriter::new(path_str(path)?, fourcc, info.fps, info.size(), true)
            .map_err(|e| open_err(e.to_string()))?;

        if !writer.is_opened().unwrap_or(false) {
            let _ = writer.release();
            return Err(open_err("writer did not open".to_string()));
        }

        info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Opened output video"
        );

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
        })
    }
}

impl MediaStream for Mp4Sink {
    fn release(&mut self) -> MediaResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.release().map_err(|e| {
                MediaError::stream_failed(format!(
                    "Failed to finalize {}: {e}",
                    self.path.display()
                ))
            })?;
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.writer.is_none()
    }
}

impl FrameSink for Mp4Sink {
    fn write_frame(&mut self, frame: &Mat) -> MediaResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| MediaError::stream_failed("Write to released writer"))?;
        writer
            .write(frame)
            .map_err(|e| MediaError::stream_failed(format!("Frame encode failed: {e}")))
    }
}
