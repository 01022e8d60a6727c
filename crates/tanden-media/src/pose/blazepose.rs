//! BlazePose landmark network on ONNX Runtime.
//!
//! Notes:
//! - OpenCV delivers frames as BGR; a private copy of the crop is converted to
//!   RGB before normalization, so the caller's frame stays BGR and untouched.
//! - The network sees a square region of interest. Without tracking context
//!   that region is the whole frame, letterboxed; with context it is the
//!   padded bounding square of the previous frame's landmarks.
//! - Regions that extend past the frame edge are zero-padded.

use std::path::{Path, PathBuf};

use opencv::core::{self, Mat, Rect, Scalar, Size};
use opencv::imgproc;
use opencv::prelude::{MatTraitConst, MatTraitConstManual};
use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use super::{Landmark, PoseEstimate, PoseModel};
use crate::config::PoseModelConfig;
use crate::error::{MediaError, MediaResult};

/// Network input edge length in pixels.
pub const INPUT_SIZE: i32 = 256;

/// Body landmarks returned per pose.
pub const NUM_LANDMARKS: usize = 33;

/// Values per landmark in the raw output: x, y, z, visibility, presence.
const LANDMARK_STRIDE: usize = 5;

/// Padding added around the landmark bounding square when tracking.
const ROI_PAD_RATIO: f32 = 0.25;

/// Smallest tracking region worth running the network on.
const MIN_ROI_SIZE: f32 = 8.0;

/// Largest tracking region, as a multiple of the frame's longer edge.
const MAX_ROI_SCALE: f32 = 2.0;

/// Square region of interest in frame pixel coordinates.
///
/// May extend beyond the frame; the outside is filled with black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareRoi {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

impl SquareRoi {
    /// Letterboxed square covering the whole frame.
    pub fn full_frame(width: i32, height: i32) -> Self {
        let size = width.max(height) as f32;
        Self {
            x: (width as f32 - size) / 2.0,
            y: (height as f32 - size) / 2.0,
            size,
        }
    }

    /// Padded bounding square of the landmarks, or `None` when it collapses.
    ///
    /// Occluded landmarks can be predicted far off-frame, so the square is
    /// capped at `MAX_ROI_SCALE` times the frame's longer edge.
    pub fn around_landmarks(landmarks: &[Landmark], width: i32, height: i32) -> Option<Self> {
        if landmarks.is_empty() {
            return None;
        }

        let (w, h) = (width as f32, height as f32);
        let min_x = landmarks.iter().map(|l| l.x * w).fold(f32::MAX, f32::min);
        let max_x = landmarks.iter().map(|l| l.x * w).fold(f32::MIN, f32::max);
        let min_y = landmarks.iter().map(|l| l.y * h).fold(f32::MAX, f32::min);
        let max_y = landmarks.iter().map(|l| l.y * h).fold(f32::MIN, f32::max);

        let size = (max_x - min_x).max(max_y - min_y) * (1.0 + ROI_PAD_RATIO);
        if !size.is_finite() || size < MIN_ROI_SIZE {
            return None;
        }
        let size = size.min(w.max(h) * MAX_ROI_SCALE);

        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;
        Some(Self {
            x: center_x - size / 2.0,
            y: center_y - size / 2.0,
            size,
        })
    }

    /// Map a point in network input pixels back to frame-normalized coordinates.
    #[inline]
    pub fn to_frame_normalized(&self, px: f32, py: f32, width: i32, height: i32) -> (f32, f32) {
        let scale = self.size / INPUT_SIZE as f32;
        let fx = self.x + px * scale;
        let fy = self.y + py * scale;
        (fx / width as f32, fy / height as f32)
    }
}

/// ONNX Runtime wrapper for the BlazePose landmark model.
///
/// Holds the previous frame's region of interest as tracking context. The
/// session is dropped by [`PoseModel::close`] or when the model is dropped.
pub struct BlazePoseModel {
    session: Option<Session>,
    landmarks_output: String,
    presence_output: String,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    tracking_roi: Option<SquareRoi>,
}

impl BlazePoseModel {
    /// Load the model described by `config`.
    ///
    /// Fails immediately when the model file is missing or cannot be loaded.
    pub fn new(config: &PoseModelConfig) -> MediaResult<Self> {
        let model_path = match &config.model_path {
            Some(path) => path.clone(),
            None => find_default_model_path().ok_or_else(|| {
                MediaError::model_not_found(
                    "pose_landmark_full.onnx not found; set TANDEN_POSE_MODEL or place it under models/pose/",
                )
            })?,
        };

        if !model_path.exists() {
            return Err(MediaError::model_not_found(model_path.display().to_string()));
        }

        let session = create_session(&model_path)?;

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.len() < 2 {
            return Err(MediaError::detection_failed(format!(
                "Pose model must expose landmark and presence outputs, found {:?}",
                output_names
            )));
        }

        info!(
            model_path = %model_path.display(),
            min_detection_confidence = config.min_detection_confidence,
            min_tracking_confidence = config.min_tracking_confidence,
            "Pose model initialized"
        );

        Ok(Self {
            session: Some(session),
            landmarks_output: output_names[0].clone(),
            presence_output: output_names[1].clone(),
            min_detection_confidence: config.min_detection_confidence,
            min_tracking_confidence: config.min_tracking_confidence,
            tracking_roi: None,
        })
    }

    /// Run the network on one region and return landmarks plus pose presence.
    fn run_roi(&mut self, frame: &Mat, roi: &SquareRoi) -> MediaResult<(Vec<Landmark>, f32)> {
        let crop_rgb = extract_rgb_square(frame, roi)?;
        let tensor = mat_to_nhwc_tensor(&crop_rgb)?;

        let session = self.session.as_mut().ok_or(MediaError::ModelClosed)?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| MediaError::detection_failed(format!("ORT run failed: {e}")))?;

        let raw_landmarks = outputs
            .get(self.landmarks_output.as_str())
            .ok_or_else(|| MediaError::detection_failed("ORT returned no landmark output"))?;
        let raw_presence = outputs
            .get(self.presence_output.as_str())
            .ok_or_else(|| MediaError::detection_failed("ORT returned no presence output"))?;

        let presence = extract_presence(raw_presence)?;
        let landmarks = extract_landmarks(raw_landmarks, roi, frame.cols(), frame.rows())?;
        Ok((landmarks, presence))
    }
}

impl PoseModel for BlazePoseModel {
    fn infer(&mut self, frame: &Mat) -> MediaResult<Option<PoseEstimate>> {
        if self.session.is_none() {
            return Err(MediaError::ModelClosed);
        }
        if frame.empty() || frame.channels() != 3 {
            return Err(MediaError::detection_failed("Expected a non-empty 3-channel BGR frame"));
        }

        let (width, height) = (frame.cols(), frame.rows());

        if let Some(roi) = self.tracking_roi {
            let (landmarks, presence) = self.run_roi(frame, &roi)?;
            if presence >= self.min_tracking_confidence {
                self.tracking_roi = SquareRoi::around_landmarks(&landmarks, width, height);
                return Ok(Some(PoseEstimate::new(landmarks, presence)));
            }
            debug!(presence, "Pose tracking lost, searching full frame");
            self.tracking_roi = None;
        }

        let roi = SquareRoi::full_frame(width, height);
        let (landmarks, presence) = self.run_roi(frame, &roi)?;
        if presence < self.min_detection_confidence {
            return Ok(None);
        }

        self.tracking_roi = SquareRoi::around_landmarks(&landmarks, width, height);
        Ok(Some(PoseEstimate::new(landmarks, presence)))
    }

    fn reset(&mut self) {
        self.tracking_roi = None;
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("Pose model session released");
        }
        self.tracking_roi = None;
    }

    fn is_closed(&self) -> bool {
        self.session.is_none()
    }
}

/// Accelerated execution providers to try before falling back to CPU.
#[allow(unused_mut)]
fn accelerated_providers() -> Vec<(&'static str, ExecutionProviderDispatch)> {
    let mut providers = Vec::new();
    #[cfg(all(target_os = "linux", feature = "cuda"))]
    providers.push((
        "CUDA",
        ort::execution_providers::CUDAExecutionProvider::default().build(),
    ));
    #[cfg(target_os = "macos")]
    providers.push((
        "CoreML",
        ort::execution_providers::CoreMLExecutionProvider::default().build(),
    ));
    providers
}

/// Load the landmark network, preferring an accelerated provider.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::detection_failed(format!("ORT read model file: {e}")))?;

    let builder = Session::builder()
        .map_err(|e| MediaError::detection_failed(format!("ORT session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::detection_failed(format!("ORT opt level: {e}")))?;

    let mut selected = None;
    for (name, provider) in accelerated_providers() {
        let session = builder
            .clone()
            .with_execution_providers([provider])
            .and_then(|b| b.commit_from_memory(&model_bytes));
        match session {
            Ok(session) => {
                selected = Some((name, session));
                break;
            }
            Err(e) => debug!(provider = name, error = %e, "Execution provider unavailable"),
        }
    }

    let (provider, session) = match selected {
        Some(found) => found,
        None => {
            let session = builder
                .commit_from_memory(&model_bytes)
                .map_err(|e| MediaError::detection_failed(format!("ORT load model: {e}")))?;
            ("CPU", session)
        }
    };

    let inputs: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
    if inputs.len() != 1 {
        return Err(MediaError::detection_failed(format!(
            "Pose model must take a single image input, found {:?}",
            inputs
        )));
    }
    info!(provider, input = inputs[0], input_size = INPUT_SIZE, "Pose landmark session ready");

    Ok(session)
}

/// Cut the region out of a BGR frame as a `INPUT_SIZE`² RGB image.
fn extract_rgb_square(frame_bgr: &Mat, roi: &SquareRoi) -> MediaResult<Mat> {
    let (width, height) = (frame_bgr.cols(), frame_bgr.rows());
    let x = roi.x.round() as i32;
    let y = roi.y.round() as i32;
    let size = roi.size.round().max(1.0) as i32;

    let left = (-x).max(0);
    let top = (-y).max(0);
    let right = (x + size - width).max(0);
    let bottom = (y + size - height).max(0);

    let mut padded = Mat::default();
    let source = if left > 0 || top > 0 || right > 0 || bottom > 0 {
        core::copy_make_border(
            frame_bgr,
            &mut padded,
            top,
            bottom,
            left,
            right,
            core::BORDER_CONSTANT,
            Scalar::all(0.0),
        )
        .map_err(|e| MediaError::detection_failed(format!("Pad failed: {e}")))?;
        &padded
    } else {
        frame_bgr
    };

    let crop = Mat::roi(source, Rect::new(x + left, y + top, size, size))
        .map_err(|e| MediaError::detection_failed(format!("ROI failed: {e}")))?;

    let mut resized = Mat::default();
    imgproc::resize(
        &crop,
        &mut resized,
        Size::new(INPUT_SIZE, INPUT_SIZE),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .map_err(|e| MediaError::detection_failed(format!("Resize failed: {e}")))?;

    let mut rgb = Mat::default();
    imgproc::cvt_color(
        &resized,
        &mut rgb,
        imgproc::COLOR_BGR2RGB,
        0,
        core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(|e| MediaError::detection_failed(format!("BGR2RGB failed: {e}")))?;
    Ok(rgb)
}

/// Convert Mat (RGB, HxWx3) to ORT tensor (1,H,W,3) normalized to [0,1].
fn mat_to_nhwc_tensor(mat_rgb: &Mat) -> MediaResult<Value> {
    let (h, w) = (mat_rgb.rows(), mat_rgb.cols());
    if mat_rgb.channels() != 3 {
        return Err(MediaError::detection_failed("Expected 3-channel RGB Mat"));
    }

    let data = mat_rgb
        .data_typed::<u8>()
        .map_err(|e| MediaError::detection_failed(format!("Mat data: {e}")))?;

    let hwc: Vec<f32> = data.iter().map(|&v| v as f32 / 255.0).collect();

    let shape = vec![1usize, h as usize, w as usize, 3];
    Tensor::from_array((shape, hwc.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::detection_failed(format!("ORT tensor: {e}")))
}

fn extract_presence(output: &Value) -> MediaResult<f32> {
    let (_, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| MediaError::detection_failed(format!("ORT extract presence: {e}")))?;
    data.first()
        .copied()
        .ok_or_else(|| MediaError::detection_failed("Empty pose presence output"))
}

/// Decode the flat landmark output into frame-normalized landmarks.
fn extract_landmarks(
    output: &Value,
    roi: &SquareRoi,
    width: i32,
    height: i32,
) -> MediaResult<Vec<Landmark>> {
    let (shape, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| MediaError::detection_failed(format!("ORT extract landmarks: {e}")))?;
    decode_landmarks(data, roi, width, height).ok_or_else(|| {
        MediaError::detection_failed(format!(
            "Unexpected pose landmark output shape: {:?}",
            shape
        ))
    })
}

/// Decode `NUM_LANDMARKS` body points; extra auxiliary points are ignored.
pub(crate) fn decode_landmarks(
    data: &[f32],
    roi: &SquareRoi,
    width: i32,
    height: i32,
) -> Option<Vec<Landmark>> {
    if data.len() < NUM_LANDMARKS * LANDMARK_STRIDE {
        return None;
    }

    let z_scale = roi.size / INPUT_SIZE as f32 / width as f32;
    let landmarks = data
        .chunks_exact(LANDMARK_STRIDE)
        .take(NUM_LANDMARKS)
        .map(|v| {
            let (x, y) = roi.to_frame_normalized(v[0], v[1], width, height);
            Landmark {
                x,
                y,
                z: v[2] * z_scale,
                visibility: sigmoid(v[3]),
                presence: sigmoid(v[4]),
            }
        })
        .collect();
    Some(landmarks)
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Search common locations for the pose landmark model.
fn find_default_model_path() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "./models/pose/pose_landmark_full.onnx",
        "./models/pose_landmark_full.onnx",
        "/app/models/pose/pose_landmark_full.onnx",
    ];

    CANDIDATES
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}
