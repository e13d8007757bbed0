// SensitivityLevel - user-selected strictness of the deviation classifier
//
// Each level maps every metric to a threshold. One-sided flexion metrics use
// the primary column, two-sided tilt metrics the secondary column. Tighter
// levels have strictly smaller thresholds for every metric.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::MetricName;

/// Classifier strictness, carried on the wire as 1, 2 or 3
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum SensitivityLevel {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
}

/// Primary/secondary threshold pair for one level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPair {
    /// Neck angle (degrees) and slump depth (scaled depth units)
    pub primary: [f64; 2],
    /// Head tilt and shoulder tilt (degrees)
    pub secondary: [f64; 2],
}

const LOW: ThresholdPair = ThresholdPair {
    primary: [15.0, 12.0],
    secondary: [10.0, 6.0],
};

const MEDIUM: ThresholdPair = ThresholdPair {
    primary: [10.0, 8.0],
    secondary: [7.0, 4.0],
};

const HIGH: ThresholdPair = ThresholdPair {
    primary: [6.0, 5.0],
    secondary: [4.0, 2.5],
};

impl SensitivityLevel {
    /// Every level, loosest first
    pub const ALL: [SensitivityLevel; 3] = [
        SensitivityLevel::Low,
        SensitivityLevel::Medium,
        SensitivityLevel::High,
    ];

    pub fn thresholds(self) -> ThresholdPair {
        match self {
            SensitivityLevel::Low => LOW,
            SensitivityLevel::Medium => MEDIUM,
            SensitivityLevel::High => HIGH,
        }
    }

    /// Allowed deviation from baseline for `metric` at this level
    pub fn threshold(self, metric: MetricName) -> f64 {
        let pair = self.thresholds();
        match metric {
            MetricName::NeckAngle => pair.primary[0],
            MetricName::SlumpDepth => pair.primary[1],
            MetricName::HeadTilt => pair.secondary[0],
            MetricName::ShoulderTilt => pair.secondary[1],
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SensitivityLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SensitivityLevel::Low),
            2 => Ok(SensitivityLevel::Medium),
            3 => Ok(SensitivityLevel::High),
            other => Err(format!("sensitivity level must be 1-3, got {}", other)),
        }
    }
}

impl From<SensitivityLevel> for u8 {
    fn from(level: SensitivityLevel) -> Self {
        level.as_u8()
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensitivityLevel::Low => "low",
            SensitivityLevel::Medium => "medium",
            SensitivityLevel::High => "high",
        };
        write!(f, "{} ({})", name, self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_medium() {
        assert_eq!(SensitivityLevel::default(), SensitivityLevel::Medium);
        assert_eq!(SensitivityLevel::Medium.threshold(MetricName::NeckAngle), 10.0);
        assert_eq!(SensitivityLevel::Medium.threshold(MetricName::ShoulderTilt), 4.0);
    }

    #[test]
    fn test_thresholds_tighten_monotonically() {
        for metric in MetricName::ALL {
            let values: Vec<f64> = SensitivityLevel::ALL
                .iter()
                .map(|level| level.threshold(metric))
                .collect();
            assert!(
                values.windows(2).all(|pair| pair[1] < pair[0]),
                "{} thresholds not strictly decreasing: {:?}",
                metric,
                values
            );
        }
    }

    #[test]
    fn test_try_from_rejects_out_of_range() {
        assert!(SensitivityLevel::try_from(0).is_err());
        assert!(SensitivityLevel::try_from(4).is_err());
        assert_eq!(SensitivityLevel::try_from(3), Ok(SensitivityLevel::High));
    }

    #[test]
    fn test_serde_as_number() {
        assert_eq!(serde_json::to_string(&SensitivityLevel::Low).unwrap(), "1");
        let level: SensitivityLevel = serde_json::from_str("3").unwrap();
        assert_eq!(level, SensitivityLevel::High);
        assert!(serde_json::from_str::<SensitivityLevel>("4").is_err());
    }
}
