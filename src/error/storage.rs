// Storage error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Storage error code constants
///
/// Error code range: 4001-4002
pub struct StorageErrorCodes {}

impl StorageErrorCodes {
    /// Backing store could not be read or written
    pub const UNAVAILABLE: i32 = 4001;

    /// Stored value could not be decoded
    pub const CORRUPT: i32 = 4002;
}

/// Log a storage error with structured context
pub fn log_storage_error(err: &StorageError, context: &str) {
    error!(
        "Storage error in {}: code={}, component=KeyValueStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Persistent store errors
///
/// Error code range: 4001-4002
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Read or write failed; callers keep in-memory state and retry later
    Unavailable { reason: String },

    /// Value under `key` does not match the expected shape
    Corrupt { key: String, reason: String },
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::Unavailable { .. } => StorageErrorCodes::UNAVAILABLE,
            StorageError::Corrupt { .. } => StorageErrorCodes::CORRUPT,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::Unavailable { reason } => format!("Storage unavailable: {}", reason),
            StorageError::Corrupt { key, reason } => {
                format!("Stored value for '{}' is corrupt: {}", key, reason)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Unavailable {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_codes() {
        assert_eq!(
            StorageError::Unavailable {
                reason: "x".to_string()
            }
            .code(),
            StorageErrorCodes::UNAVAILABLE
        );
        assert_eq!(
            StorageError::Corrupt {
                key: "baseline".to_string(),
                reason: "x".to_string()
            }
            .code(),
            StorageErrorCodes::CORRUPT
        );
    }

    #[test]
    fn test_corrupt_message_names_key() {
        let err = StorageError::Corrupt {
            key: "2026-10-17".to_string(),
            reason: "expected integer".to_string(),
        };
        assert!(err.message().contains("'2026-10-17'"));
        assert!(err.message().contains("expected integer"));
    }
}
