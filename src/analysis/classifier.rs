// DeviationClassifier - snapshot vs. baseline comparison
//
// Each metric has a fixed polarity describing which direction of change is
// harmful. Metrics are evaluated in MetricName order and the first one that
// deviates beyond its sensitivity threshold becomes the reason. Metrics
// missing from either the snapshot or the baseline are skipped.

use serde::{Deserialize, Serialize};

use super::sensitivity::SensitivityLevel;
use crate::calibration::Baseline;
use crate::metrics::geometry::angular_difference;
use crate::metrics::{MetricName, MetricsSnapshot};

/// Direction of change that counts as bad posture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Bad when the value drops below baseline − threshold
    Decrease,
    /// Bad when the value rises above baseline + threshold
    Increase,
    /// Bad when the angular distance exceeds threshold, wrapping at ±180
    Either,
}

impl Polarity {
    pub fn of(metric: MetricName) -> Self {
        match metric {
            MetricName::NeckAngle => Polarity::Decrease,
            MetricName::SlumpDepth => Polarity::Increase,
            MetricName::HeadTilt | MetricName::ShoulderTilt => Polarity::Either,
        }
    }

    /// Whether `current` deviates from `baseline` by more than `threshold`
    pub fn deviates(self, current: f64, baseline: f64, threshold: f64) -> bool {
        match self {
            Polarity::Decrease => current < baseline - threshold,
            Polarity::Increase => current > baseline + threshold,
            Polarity::Either => angular_difference(current, baseline) > threshold,
        }
    }
}

/// Per-frame posture verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub is_bad: bool,
    /// First deviating metric; always `None` when `is_bad` is false
    pub reason: Option<MetricName>,
}

impl Classification {
    pub fn good() -> Self {
        Self::default()
    }

    pub fn bad(reason: MetricName) -> Self {
        Self {
            is_bad: true,
            reason: Some(reason),
        }
    }
}

/// Whether a baseline was available for the comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    Calibrated,
    Uncalibrated,
}

/// Result of one classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationOutcome {
    pub classification: Classification,
    pub status: CalibrationStatus,
    /// Number of metrics present in both snapshot and baseline
    pub evaluated: usize,
}

impl ClassificationOutcome {
    pub fn is_calibrated(&self) -> bool {
        self.status == CalibrationStatus::Calibrated
    }
}

/// Stateless comparator; the baseline and sensitivity are passed per call
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviationClassifier;

impl DeviationClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a snapshot against the baseline
    ///
    /// # Arguments
    /// * `snapshot` - Metrics extracted from the current frame
    /// * `baseline` - Calibrated baseline, `None` when uncalibrated
    /// * `sensitivity` - Threshold set to apply
    ///
    /// # Returns
    /// Good with `CalibrationStatus::Uncalibrated` when there is no baseline;
    /// otherwise the verdict for the first deviating metric in evaluation order.
    pub fn classify(
        &self,
        snapshot: &MetricsSnapshot,
        baseline: Option<&Baseline>,
        sensitivity: SensitivityLevel,
    ) -> ClassificationOutcome {
        let Some(baseline) = baseline else {
            return ClassificationOutcome {
                classification: Classification::good(),
                status: CalibrationStatus::Uncalibrated,
                evaluated: 0,
            };
        };

        let mut evaluated = 0;
        let mut classification = Classification::good();

        for metric in MetricName::ALL {
            let (Some(current), Some(reference)) = (snapshot.get(metric), baseline.get(metric))
            else {
                continue;
            };
            evaluated += 1;

            if !classification.is_bad
                && Polarity::of(metric).deviates(current, reference, sensitivity.threshold(metric))
            {
                classification = Classification::bad(metric);
            }
        }

        ClassificationOutcome {
            classification,
            status: CalibrationStatus::Calibrated,
            evaluated,
        }
    }
}
