//! Geometry helpers shared by the ingestion boundary.
//!
//! The guard thresholds (0.4 / 0.7) and the distance bands are calibrated against the
//! landmark-based estimate below, so it must stay exactly as is: three inter-eye distances
//! wide, four tall.

use super::observation::{BoundingBox, Point};

const FACE_WIDTH_PER_EYE_DISTANCE: f32 = 3.0;
const FACE_HEIGHT_PER_EYE_DISTANCE: f32 = 4.0;

/// Ratio of estimated face area to frame area. Not clamped; the caller decides.
pub fn estimate_coverage(
    bounding_box: &BoundingBox,
    left_eye: Option<&Point>,
    right_eye: Option<&Point>,
    frame_width: u32,
    frame_height: u32,
) -> f32 {
    let frame_area = frame_width as f32 * frame_height as f32;

    let face_area = match (left_eye, right_eye) {
        (Some(left), Some(right)) => {
            let eye_distance = left.distance_to(right);
            let width = eye_distance * FACE_WIDTH_PER_EYE_DISTANCE;
            let height = eye_distance * FACE_HEIGHT_PER_EYE_DISTANCE;
            width * height
        }
        _ => bounding_box.area(),
    };

    face_area / frame_area
}

/// Both eyes and the nose must be present, with the nose horizontally between the eyes.
/// This is the only place where a missing landmark turns into "invalid face".
pub fn face_landmarks_valid(
    left_eye: Option<&Point>,
    right_eye: Option<&Point>,
    nose: Option<&Point>,
) -> bool {
    let (Some(left), Some(right), Some(nose)) = (left_eye, right_eye, nose) else {
        return false;
    };

    let min_x = left.x.min(right.x);
    let max_x = left.x.max(right.x);
    nose.x >= min_x && nose.x <= max_x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f32, y: f32) -> Point {
        Point { x, y }
    }

    #[test]
    fn eye_landmarks_drive_the_estimate() {
        let bbox = BoundingBox { width: 10.0, height: 10.0 };
        let left = point(100.0, 200.0);
        let right = point(160.0, 280.0);
        // distance 100 -> 300 x 400 face on a 1000 x 600 frame
        let coverage = estimate_coverage(&bbox, Some(&left), Some(&right), 1000, 600);
        assert!((coverage - 0.2).abs() < 1e-6);
    }

    #[test]
    fn bounding_box_is_the_fallback() {
        let bbox = BoundingBox { width: 320.0, height: 240.0 };
        let left = point(100.0, 200.0);
        let coverage = estimate_coverage(&bbox, Some(&left), None, 640, 480);
        assert!((coverage - 0.25).abs() < 1e-6);
    }

    #[test]
    fn nose_must_sit_between_the_eyes() {
        let left = point(100.0, 100.0);
        let right = point(200.0, 100.0);

        assert!(face_landmarks_valid(Some(&left), Some(&right), Some(&point(150.0, 160.0))));
        assert!(face_landmarks_valid(Some(&right), Some(&left), Some(&point(100.0, 160.0))));
        assert!(!face_landmarks_valid(Some(&left), Some(&right), Some(&point(201.0, 160.0))));
        assert!(!face_landmarks_valid(Some(&left), Some(&right), None));
        assert!(!face_landmarks_valid(None, Some(&right), Some(&point(150.0, 160.0))));
    }
}
