//! Capture abstractions for the sampling loop.
//!
//! The camera and the pose model are host-provided; the core only sees them
//! through [`CaptureSource`] and [`PoseEstimator`]. [`CaptureSupervisor`]
//! drives both from a fixed-period tick and restarts the source after stalls
//! and faults.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::metrics::LandmarkFrame;

pub mod clock;
pub mod supervisor;
pub mod synthetic;

pub use clock::{ManualTimeSource, SystemTimeSource, TimeSource, TokioTimeSource};
pub use supervisor::{CaptureSupervisor, LoopState, TickOutcome};

/// One raw frame pulled from the capture source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Frame counter of the source, starting at 0
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Whether the source is currently delivering frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Active,
    Paused,
}

/// Why the sampling loop was stopped and a restart scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartCause {
    /// Source paused or stopped delivering frames (short backoff)
    Stalled,
    /// Source or model failed unexpectedly (long backoff)
    Fault,
}

/// Camera (or any frame producer) owned by the host platform.
///
/// `release` must be safe to call on a source that was never acquired.
pub trait CaptureSource: Send + Sync {
    fn acquire(&self) -> Result<(), CaptureError>;
    fn release(&self);
    fn status(&self) -> SourceStatus;
    fn next_frame(&self) -> Result<Frame, CaptureError>;
}

/// Pose model mapping a frame to landmarks.
///
/// `Ok(None)` or an empty frame is a detection gap, not an error.
pub trait PoseEstimator: Send + Sync {
    fn detect(&self, frame: &Frame, timestamp: Instant) -> Result<Option<LandmarkFrame>, CaptureError>;
}
