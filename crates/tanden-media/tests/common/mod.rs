//! In-memory video backend and scripted pose models for pipeline tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use opencv::core::{Mat, Scalar, Vec3b, CV_8UC3};
use opencv::prelude::*;

use tanden_media::{
    FrameSink, FrameSource, Landmark, MediaError, MediaResult, MediaStream, PoseEstimate,
    PoseLandmark, PoseModel, StreamInfo, VideoIo,
};

pub const ACCENT: [u8; 3] = [0, 255, 0];

pub fn gray_frame(width: i32, height: i32, value: f64) -> Mat {
    Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(value)).unwrap()
}

pub fn pixel(mat: &Mat, x: i32, y: i32) -> [u8; 3] {
    let px = mat.at_2d::<Vec3b>(y, x).unwrap();
    [px[0], px[1], px[2]]
}

pub fn contains_color(mat: &Mat, color: [u8; 3]) -> bool {
    (0..mat.rows()).any(|y| (0..mat.cols()).any(|x| pixel(mat, x, y) == color))
}

/// Pose with every landmark at the center except the two hips.
pub fn pose_with_hips(left: (f32, f32), right: (f32, f32)) -> PoseEstimate {
    let mut landmarks = vec![Landmark::new(0.5, 0.5); 33];
    landmarks[PoseLandmark::LeftHip.index()] = Landmark::new(left.0, left.1);
    landmarks[PoseLandmark::RightHip.index()] = Landmark::new(right.0, right.1);
    PoseEstimate::new(landmarks, 0.9)
}

/// Shared record of what the fake backend saw.
#[derive(Default)]
pub struct IoLog {
    pub released: Mutex<Vec<String>>,
    pub written: Mutex<HashMap<String, Vec<Mat>>>,
    pub sink_infos: Mutex<Vec<StreamInfo>>,
}

impl IoLog {
    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }

    pub fn frames_written(&self, label: &str) -> usize {
        self.written
            .lock()
            .unwrap()
            .get(label)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn frame(&self, label: &str, index: usize) -> Mat {
        self.written.lock().unwrap()[label][index].try_clone().unwrap()
    }
}

/// Label used by the fake backend for each output path.
pub fn sink_label(path: &Path) -> String {
    let name = path.file_name().unwrap().to_string_lossy();
    if name.ends_with("_processed.mp4") {
        "processed".to_string()
    } else if name.ends_with("_skeletonOnly.mp4") {
        "skeleton".to_string()
    } else {
        name.into_owned()
    }
}

/// Video backend that serves fixed frames and records writes in memory.
pub struct FakeIo {
    pub frames: Vec<Mat>,
    pub info: StreamInfo,
    /// Fail the write of this 1-based frame on the output with this label.
    pub fail_write: Option<(&'static str, u64)>,
    /// Refuse to open the output with this label.
    pub fail_open: Option<&'static str>,
    pub log: Arc<IoLog>,
}

impl FakeIo {
    pub fn new(frames: Vec<Mat>, declared_frames: u64) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.cols(), f.rows()))
            .unwrap_or((0, 0));
        Self {
            frames,
            info: StreamInfo {
                width,
                height,
                fps: 25.0,
                frame_count: declared_frames,
            },
            fail_write: None,
            fail_open: None,
            log: Arc::new(IoLog::default()),
        }
    }

    pub fn uniform(count: usize, width: i32, height: i32) -> Self {
        let frames = (0..count).map(|_| gray_frame(width, height, 128.0)).collect();
        Self::new(frames, count as u64)
    }
}

impl VideoIo for FakeIo {
    type Source = FakeSource;
    type Sink = FakeSink;

    fn open_source(&self, _path: &Path) -> MediaResult<FakeSource> {
        Ok(FakeSource {
            frames: self.frames.iter().map(|f| f.try_clone().unwrap()).collect(),
            info: self.info,
            released: false,
            log: Arc::clone(&self.log),
        })
    }

    fn open_sink(&self, path: &Path, info: &StreamInfo) -> MediaResult<FakeSink> {
        let label = sink_label(path);
        if self.fail_open == Some(label.as_str()) {
            return Err(MediaError::stream_open(
                path,
                tanden_media::StreamDirection::Output,
                "encoder unavailable",
            ));
        }
        self.log.sink_infos.lock().unwrap().push(*info);
        self.log
            .written
            .lock()
            .unwrap()
            .insert(label.clone(), Vec::new());

        let fail_at = self
            .fail_write
            .filter(|(target, _)| *target == label)
            .map(|(_, frame)| frame);
        Ok(FakeSink {
            label,
            path: path.to_path_buf(),
            writes: 0,
            fail_at,
            released: false,
            log: Arc::clone(&self.log),
        })
    }
}

pub struct FakeSource {
    frames: VecDeque<Mat>,
    info: StreamInfo,
    released: bool,
    log: Arc<IoLog>,
}

impl MediaStream for FakeSource {
    fn release(&mut self) -> MediaResult<()> {
        if !self.released {
            self.released = true;
            self.log.released.lock().unwrap().push("input".to_string());
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl FrameSource for FakeSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn read_frame(&mut self) -> MediaResult<Option<Mat>> {
        Ok(self.frames.pop_front())
    }
}

pub struct FakeSink {
    label: String,
    path: PathBuf,
    writes: u64,
    fail_at: Option<u64>,
    released: bool,
    log: Arc<IoLog>,
}

impl MediaStream for FakeSink {
    fn release(&mut self) -> MediaResult<()> {
        if !self.released {
            self.released = true;
            self.log.released.lock().unwrap().push(self.label.clone());
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl FrameSink for FakeSink {
    fn write_frame(&mut self, frame: &Mat) -> MediaResult<()> {
        self.writes += 1;
        if self.fail_at == Some(self.writes) {
            return Err(MediaError::stream_failed(format!(
                "disk full writing {}",
                self.path.display()
            )));
        }
        self.log
            .written
            .lock()
            .unwrap()
            .entry(self.label.clone())
            .or_default()
            .push(frame.try_clone().unwrap());
        Ok(())
    }
}

/// Model returning the same estimate for every frame.
pub struct FixedModel {
    pose: Option<PoseEstimate>,
    closed: bool,
    pub resets: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
}

impl FixedModel {
    pub fn none() -> Self {
        Self::returning(None)
    }

    pub fn returning(pose: Option<PoseEstimate>) -> Self {
        Self {
            pose,
            closed: false,
            resets: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PoseModel for FixedModel {
    fn infer(&mut self, _frame: &Mat) -> MediaResult<Option<PoseEstimate>> {
        if self.closed {
            return Err(MediaError::ModelClosed);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pose.clone())
    }

    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Create an empty stand-in input file; the fake backend never reads it.
pub fn touch_input(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}
