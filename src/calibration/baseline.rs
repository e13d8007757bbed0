// Baseline - the user's reference posture
//
// Captured from a single complete MetricsSnapshot when the user asks to
// calibrate. Stored with a schema version so baselines written against older
// metric definitions are recognised and discarded instead of being compared
// against incompatible values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::metrics::{MetricName, MetricsSnapshot};

/// Version of the metric definitions a baseline was captured with
///
/// Bump whenever a metric's formula or meaning changes.
pub const BASELINE_SCHEMA_VERSION: u32 = 2;

/// Reference metric values for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub schema_version: u32,
    pub captured_at: DateTime<Utc>,
    pub metrics: MetricsSnapshot,
}

impl Baseline {
    /// Create a baseline from a snapshot that contains every metric
    ///
    /// # Arguments
    /// * `snapshot` - Most recent extracted snapshot
    /// * `captured_at` - Wall-clock capture time
    ///
    /// # Returns
    /// * `Ok(Baseline)` - Snapshot was complete
    /// * `Err(CalibrationError::IncompleteSnapshot)` - Some metrics are missing
    pub fn from_snapshot(
        snapshot: &MetricsSnapshot,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, CalibrationError> {
        let missing = snapshot.missing();
        if !missing.is_empty() {
            return Err(CalibrationError::IncompleteSnapshot { missing });
        }

        Ok(Self {
            schema_version: BASELINE_SCHEMA_VERSION,
            captured_at,
            metrics: snapshot.clone(),
        })
    }

    /// Check that the baseline is usable by the current classifier
    ///
    /// Every metric must be present and finite, and the schema version must
    /// match [`BASELINE_SCHEMA_VERSION`].
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.schema_version != BASELINE_SCHEMA_VERSION {
            return Err(CalibrationError::SchemaMismatch {
                found: self.schema_version,
                expected: BASELINE_SCHEMA_VERSION,
            });
        }

        let mut missing = self.metrics.missing();
        missing.extend(
            self.metrics
                .iter()
                .filter(|(_, value)| !value.is_finite())
                .map(|(name, _)| name),
        );
        if !missing.is_empty() {
            missing.sort();
            return Err(CalibrationError::IncompleteSnapshot { missing });
        }

        Ok(())
    }

    pub fn get(&self, name: MetricName) -> Option<f64> {
        self.metrics.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn captured_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn complete_snapshot() -> MetricsSnapshot {
        MetricsSnapshot::new()
            .with(MetricName::NeckAngle, 160.0)
            .with(MetricName::SlumpDepth, -4.0)
            .with(MetricName::HeadTilt, 0.5)
            .with(MetricName::ShoulderTilt, -0.8)
    }

    #[test]
    fn test_from_complete_snapshot() {
        let baseline = Baseline::from_snapshot(&complete_snapshot(), captured_at()).unwrap();
        assert_eq!(baseline.schema_version, BASELINE_SCHEMA_VERSION);
        assert_eq!(baseline.get(MetricName::NeckAngle), Some(160.0));
        assert!(baseline.validate().is_ok());
    }

    #[test]
    fn test_from_incomplete_snapshot_lists_missing() {
        let snapshot = MetricsSnapshot::new().with(MetricName::HeadTilt, 0.0);
        let err = Baseline::from_snapshot(&snapshot, captured_at()).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::IncompleteSnapshot {
                missing: vec![
                    MetricName::NeckAngle,
                    MetricName::SlumpDepth,
                    MetricName::ShoulderTilt
                ]
            }
        );
    }

    #[test]
    fn test_validate_rejects_old_schema() {
        let mut baseline = Baseline::from_snapshot(&complete_snapshot(), captured_at()).unwrap();
        baseline.schema_version = 1;
        assert_eq!(
            baseline.validate(),
            Err(CalibrationError::SchemaMismatch {
                found: 1,
                expected: BASELINE_SCHEMA_VERSION
            })
        );
    }

    #[test]
    fn test_validate_rejects_non_finite_values() {
        let mut baseline = Baseline::from_snapshot(&complete_snapshot(), captured_at()).unwrap();
        baseline.metrics.insert(MetricName::SlumpDepth, f64::NAN);
        assert!(matches!(
            baseline.validate(),
            Err(CalibrationError::IncompleteSnapshot { ref missing }) if missing == &vec![MetricName::SlumpDepth]
        ));
    }

    #[test]
    fn test_serialized_shape() {
        let baseline = Baseline::from_snapshot(&complete_snapshot(), captured_at()).unwrap();
        let value = serde_json::to_value(&baseline).unwrap();
        assert_eq!(value["schemaVersion"], 2);
        assert_eq!(value["metrics"]["neckAngle"], 160.0);
        assert!(value["capturedAt"].as_str().unwrap().starts_with("2024-05-01T09:30:00"));

        let parsed: Baseline = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, baseline);
    }
}
