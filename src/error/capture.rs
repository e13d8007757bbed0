// Capture error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Capture error code constants
///
/// Error code range: 3001-3004
pub struct CaptureErrorCodes {}

impl CaptureErrorCodes {
    /// Capture source reported a paused or stalled stream
    pub const STALLED: i32 = 3001;

    /// Pose model or frame grab raised an unexpected fault
    pub const FAULT: i32 = 3002;

    /// Capture source could not be (re)acquired
    pub const ACQUIRE_FAILED: i32 = 3003;

    /// Sampling loop is not running
    pub const NOT_RUNNING: i32 = 3004;
}

/// Log a capture error with structured context
pub fn log_capture_error(err: &CaptureError, context: &str) {
    error!(
        "Capture error in {}: code={}, component=CaptureSupervisor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Capture-related errors
///
/// None of these are terminal: the supervisor turns every one of them into a
/// scheduled restart.
///
/// Error code range: 3001-3004
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// Source is paused or stopped delivering frames
    Stalled,

    /// Unexpected fault from the pose model or the source
    Fault { details: String },

    /// Source could not be opened
    AcquireFailed { reason: String },

    /// Operation requires a running sampling loop
    NotRunning,
}

impl ErrorCode for CaptureError {
    fn code(&self) -> i32 {
        match self {
            CaptureError::Stalled => CaptureErrorCodes::STALLED,
            CaptureError::Fault { .. } => CaptureErrorCodes::FAULT,
            CaptureError::AcquireFailed { .. } => CaptureErrorCodes::ACQUIRE_FAILED,
            CaptureError::NotRunning => CaptureErrorCodes::NOT_RUNNING,
        }
    }

    fn message(&self) -> String {
        match self {
            CaptureError::Stalled => "Capture stream paused or stalled".to_string(),
            CaptureError::Fault { details } => format!("Capture fault: {}", details),
            CaptureError::AcquireFailed { reason } => {
                format!("Failed to acquire capture source: {}", reason)
            }
            CaptureError::NotRunning => "Sampling loop not running".to_string(),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CaptureError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CaptureError {}

/// Convert from std::io::Error to CaptureError
impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Fault {
            details: err.to_string(),
        }
    }
}
