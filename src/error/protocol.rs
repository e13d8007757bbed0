// Message-channel and notification error types

use crate::error::ErrorCode;
use std::fmt;

/// Protocol error code constants
///
/// Error code range: 5001-5002, 6001
pub struct ProtocolErrorCodes {}

impl ProtocolErrorCodes {
    /// Payload is not valid JSON or carries an unknown action tag
    pub const MALFORMED: i32 = 5001;

    /// Action tag is known but its payload failed validation
    pub const INVALID_PAYLOAD: i32 = 5002;

    /// Notification backend refused the dispatch
    pub const DISPATCH_FAILED: i32 = 6001;
}

/// Errors decoding or validating control-channel messages
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    Malformed { reason: String },
    InvalidPayload { action: String, reason: String },
}

impl ErrorCode for ProtocolError {
    fn code(&self) -> i32 {
        match self {
            ProtocolError::Malformed { .. } => ProtocolErrorCodes::MALFORMED,
            ProtocolError::InvalidPayload { .. } => ProtocolErrorCodes::INVALID_PAYLOAD,
        }
    }

    fn message(&self) -> String {
        match self {
            ProtocolError::Malformed { reason } => format!("Malformed message: {}", reason),
            ProtocolError::InvalidPayload { action, reason } => {
                format!("Invalid payload for '{}': {}", action, reason)
            }
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProtocolError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Malformed {
            reason: err.to_string(),
        }
    }
}

/// Notification dispatch errors
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyError {
    DispatchFailed { reason: String },
}

impl ErrorCode for NotifyError {
    fn code(&self) -> i32 {
        match self {
            NotifyError::DispatchFailed { .. } => ProtocolErrorCodes::DISPATCH_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            NotifyError::DispatchFailed { reason } => {
                format!("Notification dispatch failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NotifyError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for NotifyError {}
