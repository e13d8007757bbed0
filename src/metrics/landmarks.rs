//! Landmark types produced by the external pose model.
//!
//! Indices follow the 33-point BlazePose topology. Only the handful used by
//! the posture metrics are named here.

use serde::{Deserialize, Serialize};

/// Number of points in the BlazePose topology
pub const POSE_LANDMARK_COUNT: usize = 33;

/// Named landmark indices within the skeleton topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEar = 7,
    RightEar = 8,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftHip = 23,
    RightHip = 24,
}

impl LandmarkIndex {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A single tracked keypoint in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Depth relative to the hips; smaller is closer to the camera
    pub z: f32,
    /// Model confidence that the point is visible (0.0-1.0), if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// A landmark without a visibility score is trusted
    pub fn is_confident(&self, min_visibility: f32) -> bool {
        self.visibility.map_or(true, |v| v >= min_visibility)
    }
}

/// Landmarks detected in one frame, indexed by topology position
///
/// The array may be shorter than the full topology or contain holes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkFrame {
    points: Vec<Option<Landmark>>,
}

impl LandmarkFrame {
    pub fn new(points: Vec<Option<Landmark>>) -> Self {
        Self { points }
    }

    /// Frame with every point present, as emitted by a dense model output
    pub fn dense(points: Vec<Landmark>) -> Self {
        Self {
            points: points.into_iter().map(Some).collect(),
        }
    }

    /// Build a sparse frame from (index, landmark) pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (LandmarkIndex, Landmark)>) -> Self {
        let mut points = vec![None; POSE_LANDMARK_COUNT];
        for (index, landmark) in pairs {
            points[index.index()] = Some(landmark);
        }
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.iter().all(Option::is_none)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Landmark at `index` if present and confident enough
    pub fn get(&self, index: LandmarkIndex, min_visibility: f32) -> Option<&Landmark> {
        self.points
            .get(index.index())
            .and_then(Option::as_ref)
            .filter(|landmark| landmark.is_confident(min_visibility))
    }

    /// Replace the landmark at `index`, growing the array if needed
    pub fn set(&mut self, index: LandmarkIndex, landmark: Option<Landmark>) {
        let idx = index.index();
        if self.points.len() <= idx {
            self.points.resize(idx + 1, None);
        }
        self.points[idx] = landmark;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_filters_low_visibility() {
        let frame = LandmarkFrame::from_pairs([
            (
                LandmarkIndex::LeftEar,
                Landmark::new(0.4, 0.3, 0.0).with_visibility(0.2),
            ),
            (
                LandmarkIndex::RightEar,
                Landmark::new(0.6, 0.3, 0.0).with_visibility(0.9),
            ),
        ]);

        assert!(frame.get(LandmarkIndex::LeftEar, 0.5).is_none());
        assert!(frame.get(LandmarkIndex::RightEar, 0.5).is_some());
        assert!(frame.get(LandmarkIndex::LeftEar, 0.1).is_some());
    }

    #[test]
    fn test_short_array_reads_as_missing() {
        let frame = LandmarkFrame::dense(vec![Landmark::new(0.5, 0.5, 0.0); 5]);
        assert!(frame.get(LandmarkIndex::Nose, 0.5).is_some());
        assert!(frame.get(LandmarkIndex::LeftHip, 0.5).is_none());
    }

    #[test]
    fn test_set_grows_array() {
        let mut frame = LandmarkFrame::default();
        assert!(frame.is_empty());
        frame.set(LandmarkIndex::RightHip, Some(Landmark::new(0.5, 0.9, 0.0)));
        assert_eq!(frame.len(), 25);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_deserializes_model_output_with_nulls() {
        let json = r#"[{"x":0.5,"y":0.2,"z":-0.1,"visibility":0.99}, null]"#;
        let frame: LandmarkFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.len(), 2);
        assert!(frame.get(LandmarkIndex::Nose, 0.5).is_some());
    }
}
