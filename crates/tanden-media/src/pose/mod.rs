//! Body pose estimation.
//!
//! A [`PoseModel`] turns one BGR frame into at most one [`PoseEstimate`]: the
//! 33 BlazePose landmarks in frame-normalized coordinates.
//!
//! # Landmarks Layout (BlazePose 33-point topology)
//!
//! - 0-10: Face (nose, eyes, ears, mouth)
//! - 11-22: Arms and hands
//! - 23-24: Hips
//! - 25-32: Legs and feet
//!
//! # Tracking
//! Implementations may keep the previous frame's result as tracking context.
//! One model instance is therefore bound to one video at a time; call
//! [`PoseModel::reset`] before feeding frames from an unrelated stream.

mod blazepose;

pub use blazepose::{BlazePoseModel, INPUT_SIZE, NUM_LANDMARKS};

use opencv::core::Mat;

use crate::error::MediaResult;

/// Downward shift of the tanden marker, as a fraction of frame height.
pub const TANDEN_OFFSET: f64 = 0.02;

/// Named BlazePose landmarks in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl PoseLandmark {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Connection topology drawn for the skeleton overlay.
pub const POSE_CONNECTIONS: [(usize, usize); 35] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    (0, 4),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    (11, 12),
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    (17, 19),
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    (18, 20),
    (11, 23),
    (12, 24),
    (23, 24),
    (23, 25),
    (24, 26),
    (25, 27),
    (26, 28),
    (27, 29),
    (28, 30),
    (29, 31),
    (30, 32),
    (27, 31),
    (28, 32),
];

/// Single body landmark.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    /// Horizontal position, normalized to frame width
    pub x: f32,
    /// Vertical position, normalized to frame height
    pub y: f32,
    /// Relative depth (hip-centered, same scale as `x`)
    pub z: f32,
    /// Likelihood the landmark is visible (not occluded)
    pub visibility: f32,
    /// Likelihood the landmark is inside the frame
    pub presence: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility: 1.0,
            presence: 1.0,
        }
    }

    pub fn with_scores(mut self, visibility: f32, presence: f32) -> Self {
        self.visibility = visibility;
        self.presence = presence;
        self
    }
}

/// Pose detected in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseEstimate {
    pub landmarks: Vec<Landmark>,
    /// Pose presence score reported by the model
    pub score: f32,
}

impl PoseEstimate {
    pub fn new(landmarks: Vec<Landmark>, score: f32) -> Self {
        Self { landmarks, score }
    }

    pub fn landmark(&self, which: PoseLandmark) -> Option<&Landmark> {
        self.landmarks.get(which.index())
    }

    /// Tanden marker for a frame of the given size.
    ///
    /// Midpoint of the two hips, 2% of the frame height lower, truncated to
    /// whole pixels. `None` only when the hip landmarks are missing.
    pub fn tanden(&self, width: i32, height: i32) -> Option<TandenMarker> {
        let left = self.landmark(PoseLandmark::LeftHip)?;
        let right = self.landmark(PoseLandmark::RightHip)?;

        let mid_x = (left.x as f64 + right.x as f64) / 2.0;
        let mid_y = (left.y as f64 + right.y as f64) / 2.0;

        Some(TandenMarker {
            x: (mid_x * width as f64) as i32,
            y: ((mid_y + TANDEN_OFFSET) * height as f64) as i32,
        })
    }
}

/// Torso-center marker in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TandenMarker {
    pub x: i32,
    pub y: i32,
}

/// Per-frame landmark model.
pub trait PoseModel {
    /// Estimate the pose in one BGR frame. The frame is never modified.
    fn infer(&mut self, frame: &Mat) -> MediaResult<Option<PoseEstimate>>;

    /// Drop any tracking context carried over from previous frames.
    fn reset(&mut self) {}

    /// Release native resources. Further `infer` calls fail.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose_with_hips(left: (f32, f32), right: (f32, f32)) -> PoseEstimate {
        let mut landmarks = vec![Landmark::default(); NUM_LANDMARKS];
        landmarks[PoseLandmark::LeftHip.index()] = Landmark::new(left.0, left.1);
        landmarks[PoseLandmark::RightHip.index()] = Landmark::new(right.0, right.1);
        PoseEstimate::new(landmarks, 1.0)
    }

    #[test]
    fn test_hip_indices() {
        assert_eq!(PoseLandmark::LeftHip.index(), 23);
        assert_eq!(PoseLandmark::RightHip.index(), 24);
        assert_eq!(PoseLandmark::RightFootIndex.index(), NUM_LANDMARKS - 1);
    }

    #[test]
    fn test_connections_are_valid() {
        assert!(POSE_CONNECTIONS
            .iter()
            .all(|&(a, b)| a < NUM_LANDMARKS && b < NUM_LANDMARKS && a != b));
        assert!(POSE_CONNECTIONS.contains(&(23, 24)));
    }

    #[test]
    fn test_tanden_is_shifted_hip_midpoint() {
        let pose = pose_with_hips((0.25, 0.5), (0.75, 0.5));
        let marker = pose.tanden(640, 480).unwrap();
        assert_eq!(marker, TandenMarker { x: 320, y: 249 });
    }

    #[test]
    fn test_tanden_scales_with_frame() {
        let pose = pose_with_hips((0.5, 0.25), (0.5, 0.75));
        assert_eq!(pose.tanden(100, 100).unwrap(), TandenMarker { x: 50, y: 52 });
        assert_eq!(pose.tanden(200, 400).unwrap(), TandenMarker { x: 100, y: 208 });
    }

    #[test]
    fn test_tanden_requires_hips() {
        let pose = PoseEstimate::new(vec![Landmark::new(0.5, 0.5); 10], 1.0);
        assert!(pose.tanden(100, 100).is_none());
    }
}
