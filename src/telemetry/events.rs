//! Telemetry event types describing monitor diagnostics exposed to the CLI
//! and any listener on the telemetry stream.

use serde::{Deserialize, Serialize};

use crate::capture::RestartCause;
use crate::metrics::MetricName;

/// Monitor lifecycle milestones
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    MonitoringStarted,
    MonitoringStopped,
    Calibrated,
    BaselineRestored,
    BaselineCleared,
}

/// Metric events covering detection latency, verdict changes, restarts and errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Rolling pose-model latency
    DetectionLatency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    /// Posture verdict, emitted only when it changes
    Classification {
        is_bad: bool,
        reason: Option<MetricName>,
    },
    CaptureRestart {
        cause: RestartCause,
        backoff_ms: u64,
    },
    Alert {
        reason: Option<MetricName>,
    },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
    /// Error surfaced by a component, carrying its `ErrorCode::code()`
    Error {
        code: i32,
        context: String,
    },
}
