// Metrics module - landmark frames to posture metrics
//
// A MetricsSnapshot holds at most one scalar per MetricName. Each metric is
// derived from a fixed landmark subset:
//
//   neckAngle    - angle at the left shoulder between left ear and left hip
//   slumpDepth   - shoulder/ear depth differential, both sides
//   headTilt     - direction of the left ear → right ear segment
//   shoulderTilt - direction of the left shoulder → right shoulder segment
//
// Metrics whose landmarks are missing are left out of the snapshot.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod extractor;
pub mod geometry;
pub mod landmarks;

pub use extractor::MetricExtractor;
pub use landmarks::{Landmark, LandmarkFrame, LandmarkIndex, POSE_LANDMARK_COUNT};

/// Name of a posture metric
///
/// Declaration order is the classifier's evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricName {
    NeckAngle,
    SlumpDepth,
    HeadTilt,
    ShoulderTilt,
}

impl MetricName {
    /// Every metric, in evaluation order
    pub const ALL: [MetricName; 4] = [
        MetricName::NeckAngle,
        MetricName::SlumpDepth,
        MetricName::HeadTilt,
        MetricName::ShoulderTilt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NeckAngle => "neckAngle",
            MetricName::SlumpDepth => "slumpDepth",
            MetricName::HeadTilt => "headTilt",
            MetricName::ShoulderTilt => "shoulderTilt",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric values extracted from one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsSnapshot {
    values: BTreeMap<MetricName, f64>,
}

impl MetricsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: MetricName) -> Option<f64> {
        self.values.get(&name).copied()
    }

    pub fn insert(&mut self, name: MetricName, value: f64) {
        self.values.insert(name, value);
    }

    pub fn with(mut self, name: MetricName, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Metrics required for calibration that this snapshot lacks
    pub fn missing(&self) -> Vec<MetricName> {
        MetricName::ALL
            .iter()
            .copied()
            .filter(|name| !self.values.contains_key(name))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricName, f64)> + '_ {
        self.values.iter().map(|(name, value)| (*name, *value))
    }
}
