// MetricExtractor - pure landmark → metrics mapping
//
// Each metric is computed only when all of its landmarks are present and
// confident. There is no default substitution: a missing landmark means a
// missing metric, which the classifier skips.

use super::geometry::{depth_differential, directional_angle, three_point_angle};
use super::landmarks::{LandmarkFrame, LandmarkIndex};
use super::{MetricName, MetricsSnapshot};
use crate::config::ExtractionConfig;

/// Computes a [`MetricsSnapshot`] from a [`LandmarkFrame`]
#[derive(Debug, Clone, Copy)]
pub struct MetricExtractor {
    min_visibility: f32,
}

impl MetricExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            min_visibility: config.min_visibility,
        }
    }

    pub fn min_visibility(&self) -> f32 {
        self.min_visibility
    }

    /// Extract every metric whose landmarks are available
    pub fn extract(&self, frame: &LandmarkFrame) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::new();
        for name in MetricName::ALL {
            if let Some(value) = self.compute(name, frame) {
                snapshot.insert(name, value);
            }
        }
        snapshot
    }

    fn compute(&self, name: MetricName, frame: &LandmarkFrame) -> Option<f64> {
        let min_visibility = self.min_visibility;
        let at = move |index: LandmarkIndex| frame.get(index, min_visibility);
        match name {
            MetricName::NeckAngle => Some(three_point_angle(
                at(LandmarkIndex::LeftEar)?,
                at(LandmarkIndex::LeftShoulder)?,
                at(LandmarkIndex::LeftHip)?,
            )),
            MetricName::SlumpDepth => Some(depth_differential(
                at(LandmarkIndex::LeftEar)?,
                at(LandmarkIndex::LeftShoulder)?,
                at(LandmarkIndex::RightEar)?,
                at(LandmarkIndex::RightShoulder)?,
            )),
            MetricName::HeadTilt => Some(directional_angle(
                at(LandmarkIndex::LeftEar)?,
                at(LandmarkIndex::RightEar)?,
            )),
            MetricName::ShoulderTilt => Some(directional_angle(
                at(LandmarkIndex::LeftShoulder)?,
                at(LandmarkIndex::RightShoulder)?,
            )),
        }
    }
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Landmark;

    fn upright_frame() -> LandmarkFrame {
        LandmarkFrame::from_pairs([
            (LandmarkIndex::LeftEar, Landmark::new(0.42, 0.30, -0.05)),
            (LandmarkIndex::RightEar, Landmark::new(0.58, 0.30, -0.05)),
            (LandmarkIndex::LeftShoulder, Landmark::new(0.40, 0.55, 0.0)),
            (LandmarkIndex::RightShoulder, Landmark::new(0.60, 0.55, 0.0)),
            (LandmarkIndex::LeftHip, Landmark::new(0.41, 0.90, 0.0)),
            (LandmarkIndex::RightHip, Landmark::new(0.59, 0.90, 0.0)),
        ])
    }

    #[test]
    fn test_full_frame_yields_complete_snapshot() {
        let snapshot = MetricExtractor::default().extract(&upright_frame());
        assert!(snapshot.is_complete());

        let neck = snapshot.get(MetricName::NeckAngle).unwrap();
        assert!(neck > 170.0 && neck <= 180.0, "neck angle {}", neck);
        assert!(snapshot.get(MetricName::HeadTilt).unwrap().abs() < 1e-6);
        assert!(snapshot.get(MetricName::ShoulderTilt).unwrap().abs() < 1e-6);
        // shoulders 0.05 behind the ears
        assert!((snapshot.get(MetricName::SlumpDepth).unwrap() + 5.0).abs() < 1e-3);
    }

    /// Raw camera view: the subject's left side is on the image right
    fn unmirrored_frame(ear_dy: f32) -> LandmarkFrame {
        LandmarkFrame::from_pairs([
            (LandmarkIndex::LeftEar, Landmark::new(0.58, 0.30, -0.05)),
            (LandmarkIndex::RightEar, Landmark::new(0.42, 0.30 + ear_dy, -0.05)),
            (LandmarkIndex::LeftShoulder, Landmark::new(0.60, 0.55, 0.0)),
            (LandmarkIndex::RightShoulder, Landmark::new(0.40, 0.55, 0.0)),
            (LandmarkIndex::LeftHip, Landmark::new(0.59, 0.90, 0.0)),
            (LandmarkIndex::RightHip, Landmark::new(0.41, 0.90, 0.0)),
        ])
    }

    #[test]
    fn test_unmirrored_tilts_sit_near_180() {
        let extractor = MetricExtractor::default();
        let level = extractor.extract(&unmirrored_frame(0.0));
        assert!(level.is_complete());
        assert!((level.get(MetricName::HeadTilt).unwrap() - 180.0).abs() < 1e-6);
        assert!((level.get(MetricName::ShoulderTilt).unwrap() - 180.0).abs() < 1e-6);

        let up = extractor.extract(&unmirrored_frame(-0.001));
        let down = extractor.extract(&unmirrored_frame(0.001));
        let up_tilt = up.get(MetricName::HeadTilt).unwrap();
        let down_tilt = down.get(MetricName::HeadTilt).unwrap();
        assert!(up_tilt < -179.0, "head tilt {}", up_tilt);
        assert!(down_tilt > 179.0, "head tilt {}", down_tilt);
        assert!(crate::metrics::geometry::angular_difference(up_tilt, down_tilt) < 1.0);
    }

    #[test]
    fn test_missing_hip_drops_only_neck_angle() {
        let mut frame = upright_frame();
        frame.set(LandmarkIndex::LeftHip, None);

        let snapshot = MetricExtractor::default().extract(&frame);
        assert_eq!(snapshot.missing(), vec![MetricName::NeckAngle]);
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_low_visibility_counts_as_missing() {
        let mut frame = upright_frame();
        frame.set(
            LandmarkIndex::RightEar,
            Some(Landmark::new(0.58, 0.30, -0.05).with_visibility(0.1)),
        );

        let snapshot = MetricExtractor::default().extract(&frame);
        assert_eq!(
            snapshot.missing(),
            vec![MetricName::SlumpDepth, MetricName::HeadTilt]
        );
    }

    #[test]
    fn test_empty_frame_never_panics() {
        let snapshot = MetricExtractor::default().extract(&LandmarkFrame::default());
        assert!(snapshot.is_empty());

        let sparse = LandmarkFrame::new(vec![None; 3]);
        assert!(MetricExtractor::default().extract(&sparse).is_empty());
    }

    #[test]
    fn test_forward_head_closes_neck_angle() {
        let extractor = MetricExtractor::default();
        let upright = extractor.extract(&upright_frame());

        let mut forward = upright_frame();
        forward.set(
            LandmarkIndex::LeftEar,
            Some(Landmark::new(0.30, 0.33, -0.05)),
        );
        let hunched = extractor.extract(&forward);

        assert!(
            hunched.get(MetricName::NeckAngle).unwrap()
                < upright.get(MetricName::NeckAngle).unwrap() - 10.0
        );
    }
}
