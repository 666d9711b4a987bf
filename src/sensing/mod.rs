//! Boundary with the face-detection and light-sensor collaborators.
//!
//! Raw `FaceObservation`s are turned into `FrameSample`s here and nowhere else; the scoring and
//! guard code only ever sees clamped, finite values.

pub mod coverage;
pub mod observation;

pub use coverage::{estimate_coverage, face_landmarks_valid};
pub use observation::{
    sanitize_lux, BoundingBox, DetectedFace, FaceObservation, FrameSample, Measurement, Point,
};
