use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::coverage::{estimate_coverage, face_landmarks_valid};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn distance_to(&self, other: &Point) -> f32 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// What the face detector reports for the first face in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub left_eye: Option<Point>,
    #[serde(default)]
    pub right_eye: Option<Point>,
    #[serde(default)]
    pub nose_base: Option<Point>,
    #[serde(default)]
    pub left_eye_open_probability: Option<f32>,
    #[serde(default)]
    pub right_eye_open_probability: Option<f32>,
    #[serde(default)]
    pub head_euler_angle_z: Option<f32>,
}

/// Raw per-frame output of the detection collaborator, before any validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceObservation {
    pub frame_width: u32,
    pub frame_height: u32,
    #[serde(default)]
    pub face: Option<DetectedFace>,
}

/// A validated face measurement. `ambient_lux` is attached from the light cache when the
/// measurement is evaluated, not when it is ingested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub face_coverage: f32,
    pub ambient_lux: Option<f32>,
    pub head_tilt_degrees: Option<f32>,
    pub left_eye_open_probability: Option<f32>,
    pub right_eye_open_probability: Option<f32>,
    pub face_landmarks_valid: bool,
}

impl Measurement {
    pub fn with_ambient_lux(mut self, lux: Option<f32>) -> Self {
        self.ambient_lux = lux.and_then(sanitize_lux);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameSample {
    Face(Measurement),
    NoFace,
}

impl FaceObservation {
    pub fn no_face(frame_width: u32, frame_height: u32) -> Self {
        Self {
            frame_width,
            frame_height,
            face: None,
        }
    }

    /// Validate and normalise at the boundary so nothing downstream sees NaN or out-of-range
    /// values. Geometry that cannot produce a coverage ratio is rejected outright.
    pub fn into_sample(self) -> Result<FrameSample> {
        if self.frame_width == 0 || self.frame_height == 0 {
            bail!(
                "frame has zero area ({}x{})",
                self.frame_width,
                self.frame_height
            );
        }

        let Some(face) = self.face else {
            return Ok(FrameSample::NoFace);
        };

        let left_eye = face.left_eye.filter(Point::is_finite);
        let right_eye = face.right_eye.filter(Point::is_finite);
        let nose = face.nose_base.filter(Point::is_finite);

        let coverage = estimate_coverage(
            &face.bounding_box,
            left_eye.as_ref(),
            right_eye.as_ref(),
            self.frame_width,
            self.frame_height,
        );
        if !coverage.is_finite() {
            bail!("face coverage is not finite");
        }

        Ok(FrameSample::Face(Measurement {
            face_coverage: coverage.clamp(0.0, 1.0),
            ambient_lux: None,
            head_tilt_degrees: face.head_euler_angle_z.filter(|v| v.is_finite()),
            left_eye_open_probability: sanitize_probability(face.left_eye_open_probability),
            right_eye_open_probability: sanitize_probability(face.right_eye_open_probability),
            face_landmarks_valid: face_landmarks_valid(
                left_eye.as_ref(),
                right_eye.as_ref(),
                nose.as_ref(),
            ),
        }))
    }
}

fn sanitize_probability(value: Option<f32>) -> Option<f32> {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

/// Light readings must be finite and non-negative; anything else is dropped.
pub fn sanitize_lux(lux: f32) -> Option<f32> {
    (lux.is_finite() && lux >= 0.0).then_some(lux)
}
