//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes detection latency, posture verdict changes,
//! capture restarts and errors into a bounded history plus async broadcast
//! stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use tokio::sync::broadcast;

use crate::analysis::Classification;
use crate::capture::RestartCause;
use crate::error::ErrorCode;
use crate::metrics::MetricName;

pub mod events;

pub use events::{LifecyclePhase, MetricEvent};

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Telemetry state stays usable after a panicking holder.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = lock(&self.history);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = lock(&self.history);
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Rolling window of detection latencies for avg/max reporting.
struct LatencyTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn observe(&mut self, value: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value.abs());

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        let avg = if count == 0 { 0.0 } else { sum / count as f32 };
        (avg, max, count)
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    latency: Mutex<LatencyTracker>,
    last_classification: Mutex<Option<Classification>>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, latency_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            latency: Mutex::new(LatencyTracker::new(latency_window)),
            last_classification: Mutex::new(None),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn record_detection_latency(&self, elapsed: Duration) {
        let (avg, max, count) = lock(&self.latency).observe(elapsed.as_secs_f32() * 1000.0);
        self.collector.publish(MetricEvent::DetectionLatency {
            avg_ms: avg,
            max_ms: max,
            sample_count: count,
        });
    }

    /// Publish the verdict only when it differs from the previous one
    pub fn record_classification(&self, classification: &Classification) {
        let mut last = lock(&self.last_classification);
        if last.as_ref() == Some(classification) {
            return;
        }
        *last = Some(*classification);
        drop(last);

        self.collector.publish(MetricEvent::Classification {
            is_bad: classification.is_bad,
            reason: classification.reason,
        });
    }

    /// Forget the last verdict so the next one is always published
    pub fn reset_classification(&self) {
        *lock(&self.last_classification) = None;
    }

    pub fn record_restart(&self, cause: RestartCause, backoff: Duration) {
        self.collector.publish(MetricEvent::CaptureRestart {
            cause,
            backoff_ms: backoff.as_millis() as u64,
        });
    }

    pub fn record_alert(&self, reason: Option<MetricName>) {
        self.collector.publish(MetricEvent::Alert { reason });
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.collector.publish(MetricEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_error(&self, err: &dyn ErrorCode, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Error {
            code: err.code(),
            context: context.into(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}

fn now_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::DetectionLatency {
            avg_ms: 1.0,
            max_ms: 2.0,
            sample_count: 1,
        });
        collector.publish(MetricEvent::Alert {
            reason: Some(MetricName::NeckAngle),
        });
        collector.publish(MetricEvent::CaptureRestart {
            cause: RestartCause::Stalled,
            backoff_ms: 1000,
        });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(
            matches!(snapshot.recent[0], MetricEvent::DetectionLatency { avg_ms, .. } if (avg_ms - 1.0).abs() < f32::EPSILON)
        );
        assert!(matches!(
            snapshot.recent[2],
            MetricEvent::CaptureRestart { .. }
        ));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for reason in [MetricName::NeckAngle, MetricName::HeadTilt, MetricName::SlumpDepth] {
            collector.publish(MetricEvent::Alert {
                reason: Some(reason),
            });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(
            snapshot.recent[0],
            MetricEvent::Alert {
                reason: Some(MetricName::HeadTilt)
            }
        );
    }

    #[test]
    fn hub_only_publishes_classification_changes() {
        let hub = TelemetryHub::new(8, 16, 4);
        hub.record_classification(&Classification::good());
        hub.record_classification(&Classification::good());
        hub.record_classification(&Classification::bad(MetricName::SlumpDepth));
        hub.record_classification(&Classification::bad(MetricName::SlumpDepth));
        hub.reset_classification();
        hub.record_classification(&Classification::bad(MetricName::SlumpDepth));

        let count = hub
            .snapshot()
            .recent
            .iter()
            .filter(|event| matches!(event, MetricEvent::Classification { .. }))
            .count();
        assert_eq!(count, 3);
    }

    #[test]
    fn hub_tracks_latency_window() {
        let hub = TelemetryHub::new(8, 8, 2);
        hub.record_detection_latency(Duration::from_millis(10));
        hub.record_detection_latency(Duration::from_millis(30));
        hub.record_detection_latency(Duration::from_millis(50));

        match hub.snapshot().recent.last() {
            Some(MetricEvent::DetectionLatency {
                avg_ms,
                max_ms,
                sample_count,
            }) => {
                assert_eq!(*sample_count, 2);
                assert!((avg_ms - 40.0).abs() < 0.01);
                assert!((max_ms - 50.0).abs() < 0.01);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn hub_records_error_codes() {
        let hub = TelemetryHub::new(8, 8, 2);
        hub.record_error(&CaptureError::Stalled, "tick");
        assert_eq!(
            hub.snapshot().recent,
            vec![MetricEvent::Error {
                code: 3001,
                context: "tick".to_string()
            }]
        );
    }
}
