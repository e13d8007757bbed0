// Calibration error types and constants

use crate::error::ErrorCode;
use crate::metrics::MetricName;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Single source of truth for the codes surfaced to controller processes.
///
/// Error code range: 2001-2004
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Snapshot lacks one or more required metrics
    pub const INCOMPLETE_SNAPSHOT: i32 = 2001;

    /// No snapshot has been extracted yet
    pub const NO_SNAPSHOT: i32 = 2002;

    /// Stored baseline was written by an incompatible metric schema
    pub const SCHEMA_MISMATCH: i32 = 2003;

    /// Baseline RwLock was poisoned
    pub const STATE_POISONED: i32 = 2004;
}

/// Log a calibration error with structured context
///
/// Logs the numeric code, the component and the message at error level.
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=BaselineStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// Error code range: 2001-2004
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Posture not fully detected yet; some metrics are absent
    IncompleteSnapshot { missing: Vec<MetricName> },

    /// Calibration requested before any frame produced a snapshot
    NoSnapshot,

    /// Baseline schema version does not match the current metric definitions
    SchemaMismatch { found: u32, expected: u32 },

    /// Baseline state RwLock was poisoned
    StatePoisoned,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::IncompleteSnapshot { .. } => {
                CalibrationErrorCodes::INCOMPLETE_SNAPSHOT
            }
            CalibrationError::NoSnapshot => CalibrationErrorCodes::NO_SNAPSHOT,
            CalibrationError::SchemaMismatch { .. } => CalibrationErrorCodes::SCHEMA_MISMATCH,
            CalibrationError::StatePoisoned => CalibrationErrorCodes::STATE_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::IncompleteSnapshot { missing } => {
                let names: Vec<&str> = missing.iter().map(|name| name.as_str()).collect();
                format!("Incomplete snapshot: missing {}", names.join(", "))
            }
            CalibrationError::NoSnapshot => "No posture detected yet".to_string(),
            CalibrationError::SchemaMismatch { found, expected } => {
                format!(
                    "Baseline schema version {} does not match expected {}",
                    found, expected
                )
            }
            CalibrationError::StatePoisoned => "Baseline state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
