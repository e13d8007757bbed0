// Error types for the posture monitor core
//
// Each concern gets its own enum with stable numeric codes so that a
// controller process on the other side of the message channel can branch on
// them without parsing messages.

mod calibration;
mod capture;
mod protocol;
mod storage;

use std::fmt;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use capture::{log_capture_error, CaptureError, CaptureErrorCodes};
pub use protocol::{NotifyError, ProtocolError, ProtocolErrorCodes};
pub use storage::{log_storage_error, StorageError, StorageErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the message channel boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Error returned by fallible [`crate::session::MonitorSession`] operations.
///
/// Wraps the per-concern enums so callers can use `?` across them.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Calibration(CalibrationError),
    Capture(CaptureError),
    Storage(StorageError),
    Protocol(ProtocolError),
    Notify(NotifyError),
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::Calibration(err) => err.code(),
            SessionError::Capture(err) => err.code(),
            SessionError::Storage(err) => err.code(),
            SessionError::Protocol(err) => err.code(),
            SessionError::Notify(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::Calibration(err) => err.message(),
            SessionError::Capture(err) => err.message(),
            SessionError::Storage(err) => err.message(),
            SessionError::Protocol(err) => err.message(),
            SessionError::Notify(err) => err.message(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Calibration(err) => err.fmt(f),
            SessionError::Capture(err) => err.fmt(f),
            SessionError::Storage(err) => err.fmt(f),
            SessionError::Protocol(err) => err.fmt(f),
            SessionError::Notify(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<CalibrationError> for SessionError {
    fn from(err: CalibrationError) -> Self {
        SessionError::Calibration(err)
    }
}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        SessionError::Capture(err)
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        SessionError::Storage(err)
    }
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        SessionError::Protocol(err)
    }
}

impl From<NotifyError> for SessionError {
    fn from(err: NotifyError) -> Self {
        SessionError::Notify(err)
    }
}
