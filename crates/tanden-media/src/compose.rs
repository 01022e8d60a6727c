//! Frame composition: dimmed overlay and skeleton-only canvas.

use opencv::core::{self, Mat, Point, Scalar};
use opencv::imgproc;
use opencv::prelude::{MatExprTraitConst, MatTraitConst};

use crate::error::{MediaError, MediaResult};
use crate::pose::{Landmark, PoseEstimate, TandenMarker, POSE_CONNECTIONS};

/// Weight of the source frame in the dimmed overlay.
const DIM_ALPHA: f64 = 0.9;

/// Stroke parameters for one class of primitive.
#[derive(Debug, Clone, Copy)]
pub struct DrawingSpec {
    /// BGR color.
    pub color: Scalar,
    pub thickness: i32,
    pub circle_radius: i32,
}

impl DrawingSpec {
    pub fn new(color: Scalar, thickness: i32, circle_radius: i32) -> Self {
        Self {
            color,
            thickness,
            circle_radius,
        }
    }

    pub fn white(thickness: i32, circle_radius: i32) -> Self {
        Self::new(white(), thickness, circle_radius)
    }
}

fn white() -> Scalar {
    Scalar::new(255.0, 255.0, 255.0, 0.0)
}

/// The two images written for every input frame.
pub struct ComposedFrames {
    /// Dimmed source frame with the pose drawn on top.
    pub processed: Mat,
    /// Black canvas with only the pose drawn.
    pub skeleton: Mat,
}

/// Draws pose overlays onto frames.
#[derive(Debug, Clone)]
pub struct Compositor {
    pub landmark_spec: DrawingSpec,
    pub connection_spec: DrawingSpec,
    pub marker_radius: i32,
    /// BGR accent color for the tanden marker.
    pub marker_color: Scalar,
    /// Landmarks below this visibility or presence are not drawn.
    pub visibility_threshold: f32,
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            landmark_spec: DrawingSpec::white(2, 2),
            connection_spec: DrawingSpec::white(2, 2),
            marker_radius: 8,
            marker_color: Scalar::new(0.0, 255.0, 0.0, 0.0),
            visibility_threshold: 0.5,
        }
    }
}

impl Compositor {
    /// Build both output images for one frame.
    ///
    /// `frame` is read only. Without a pose the processed image is just the
    /// dimmed frame and the skeleton image is solid black.
    pub fn compose(&self, frame: &Mat, pose: Option<&PoseEstimate>) -> MediaResult<ComposedFrames> {
        let mut processed = darken(frame)?;
        let mut skeleton = black_canvas(frame)?;

        if let Some(pose) = pose {
            self.draw_pose(&mut processed, pose)?;
            self.draw_pose(&mut skeleton, pose)?;
        }

        Ok(ComposedFrames {
            processed,
            skeleton,
        })
    }

    /// Draw connections, landmark dots and finally the tanden marker.
    pub fn draw_pose(&self, image: &mut Mat, pose: &PoseEstimate) -> MediaResult<()> {
        let (width, height) = (image.cols(), image.rows());

        let pixels: Vec<Option<Point>> = pose
            .landmarks
            .iter()
            .map(|lm| {
                if self.is_drawable(lm) {
                    normalized_to_pixel(lm.x, lm.y, width, height)
                } else {
                    None
                }
            })
            .collect();

        for &(start, end) in POSE_CONNECTIONS.iter() {
            let (Some(Some(a)), Some(Some(b))) = (pixels.get(start), pixels.get(end)) else {
                continue;
            };
            imgproc::line(
                image,
                *a,
                *b,
                self.connection_spec.color,
                self.connection_spec.thickness,
                imgproc::LINE_8,
                0,
            )
            .map_err(|e| MediaError::render_failed(format!("Connection draw failed: {e}")))?;
        }

        let border_radius = landmark_border_radius(self.landmark_spec.circle_radius);
        for point in pixels.iter().flatten() {
            imgproc::circle(
                image,
                *point,
                border_radius,
                white(),
                self.landmark_spec.thickness,
                imgproc::LINE_8,
                0,
            )
            .map_err(|e| MediaError::render_failed(format!("Landmark border draw failed: {e}")))?;
            imgproc::circle(
                image,
                *point,
                self.landmark_spec.circle_radius,
                self.landmark_spec.color,
                self.landmark_spec.thickness,
                imgproc::LINE_8,
                0,
            )
            .map_err(|e| MediaError::render_failed(format!("Landmark draw failed: {e}")))?;
        }

        if let Some(marker) = pose.tanden(width, height) {
            self.draw_marker(image, marker)?;
        }

        Ok(())
    }

    fn draw_marker(&self, image: &mut Mat, marker: TandenMarker) -> MediaResult<()> {
        imgproc::circle(
            image,
            Point::new(marker.x, marker.y),
            self.marker_radius,
            self.marker_color,
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .map_err(|e| MediaError::render_failed(format!("Marker draw failed: {e}")))
    }

    fn is_drawable(&self, lm: &Landmark) -> bool {
        lm.visibility >= self.visibility_threshold && lm.presence >= self.visibility_threshold
    }
}

/// Radius of the ring around a landmark dot of radius `radius`.
pub fn landmark_border_radius(radius: i32) -> i32 {
    (radius + 1).max((radius as f64 * 1.2) as i32)
}

/// `0.9 * frame + 0.1 * black`.
pub fn darken(frame: &Mat) -> MediaResult<Mat> {
    let black = black_canvas(frame)?;
    let mut dimmed = Mat::default();
    core::add_weighted(frame, DIM_ALPHA, &black, 1.0 - DIM_ALPHA, 0.0, &mut dimmed, -1)
        .map_err(|e| MediaError::render_failed(format!("Dimming failed: {e}")))?;
    Ok(dimmed)
}

/// Black 8-bit BGR image with the frame's dimensions.
pub fn black_canvas(frame: &Mat) -> MediaResult<Mat> {
    Mat::zeros(frame.rows(), frame.cols(), core::CV_8UC3)
        .map_err(|e| MediaError::render_failed(format!("Canvas alloc failed: {e}")))?
        .to_mat()
        .map_err(|e| MediaError::render_failed(format!("Canvas conversion failed: {e}")))
}

/// Normalized coordinates to pixels; `None` outside `[0, 1]`.
pub fn normalized_to_pixel(x: f32, y: f32, width: i32, height: i32) -> Option<Point> {
    if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
        return None;
    }
    let px = ((x as f64 * width as f64).floor() as i32).min(width - 1);
    let py = ((y as f64 * height as f64).floor() as i32).min(height - 1);
    Some(Point::new(px, py))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{PoseLandmark, NUM_LANDMARKS};
    use opencv::core::{Vec3b, CV_8UC3};

    fn gray_frame(width: i32, height: i32, value: f64) -> Mat {
        Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(value)).unwrap()
    }

    fn pixel(mat: &Mat, x: i32, y: i32) -> [u8; 3] {
        let px = mat.at_2d::<Vec3b>(y, x).unwrap();
        [px[0], px[1], px[2]]
    }

    fn standing_pose() -> PoseEstimate {
        let mut landmarks = vec![Landmark::new(0.5, 0.2); NUM_LANDMARKS];
        landmarks[PoseLandmark::LeftHip.index()] = Landmark::new(0.4, 0.5);
        landmarks[PoseLandmark::RightHip.index()] = Landmark::new(0.6, 0.5);
        PoseEstimate::new(landmarks, 0.9)
    }

    #[test]
    fn test_normalized_to_pixel_clamps_upper_edge() {
        assert_eq!(normalized_to_pixel(1.0, 1.0, 640, 480), Some(Point::new(639, 479)));
        assert_eq!(normalized_to_pixel(0.5, 0.25, 640, 480), Some(Point::new(320, 120)));
        assert_eq!(normalized_to_pixel(-0.01, 0.5, 640, 480), None);
        assert_eq!(normalized_to_pixel(0.5, 1.2, 640, 480), None);
    }

    #[test]
    fn test_darken_scales_pixels() {
        let frame = gray_frame(32, 24, 100.0);
        let dimmed = darken(&frame).unwrap();
        assert_eq!(pixel(&dimmed, 5, 5), [90, 90, 90]);
        assert_eq!(pixel(&frame, 5, 5), [100, 100, 100]);
    }

    #[test]
    fn test_compose_without_pose() {
        let frame = gray_frame(64, 48, 128.0);
        let composed = Compositor::default().compose(&frame, None).unwrap();

        assert_eq!(pixel(&composed.processed, 10, 10), [115, 115, 115]);
        assert_eq!(pixel(&composed.skeleton, 10, 10), [0, 0, 0]);
        assert_eq!(composed.skeleton.cols(), 64);
        assert_eq!(composed.skeleton.rows(), 48);
    }

    #[test]
    fn test_compose_draws_marker_on_both_outputs() {
        let frame = gray_frame(100, 100, 128.0);
        let pose = standing_pose();
        let composed = Compositor::default().compose(&frame, Some(&pose)).unwrap();

        let marker = pose.tanden(100, 100).unwrap();
        assert_eq!((marker.x, marker.y), (50, 52));
        assert_eq!(pixel(&composed.processed, 50, 52), [0, 255, 0]);
        assert_eq!(pixel(&composed.skeleton, 50, 52), [0, 255, 0]);
        // Hip connection is white and away from the marker.
        assert_eq!(pixel(&composed.skeleton, 41, 50), [255, 255, 255]);
    }

    #[test]
    fn test_landmark_border_radius() {
        assert_eq!(landmark_border_radius(2), 3);
        assert_eq!(landmark_border_radius(5), 6);
        assert_eq!(landmark_border_radius(10), 12);
    }

    #[test]
    fn test_landmark_dot_sits_on_white_ring() {
        let frame = gray_frame(100, 100, 128.0);
        let compositor = Compositor {
            landmark_spec: DrawingSpec::new(Scalar::new(0.0, 0.0, 255.0, 0.0), 1, 5),
            ..Compositor::default()
        };
        let composed = compositor.compose(&frame, Some(&standing_pose())).unwrap();

        // Upper-body landmarks all sit at (50, 20).
        assert_eq!(pixel(&composed.skeleton, 55, 20), [0, 0, 255]);
        assert_eq!(pixel(&composed.skeleton, 56, 20), [255, 255, 255]);
        assert_eq!(pixel(&composed.skeleton, 58, 20), [0, 0, 0]);
    }

    #[test]
    fn test_low_visibility_landmarks_are_skipped() {
        let frame = gray_frame(100, 100, 128.0);
        let mut pose = standing_pose();
        for lm in pose.landmarks.iter_mut() {
            *lm = lm.with_scores(0.1, 1.0);
        }
        let composed = Compositor::default().compose(&frame, Some(&pose)).unwrap();

        assert_eq!(pixel(&composed.skeleton, 41, 50), [0, 0, 0]);
        // The marker does not depend on visibility.
        assert_eq!(pixel(&composed.skeleton, 50, 52), [0, 255, 0]);
    }
}
