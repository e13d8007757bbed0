use std::collections::BTreeMap;

use anyhow::{Context, Result};
use posture_monitor::telemetry::MetricEvent;
use serde::Serialize;
use tokio::sync::broadcast::{error::TryRecvError, Receiver};

#[derive(Default)]
pub struct TelemetryAggregator {
    total_events: usize,
    lagged_events: usize,
    last_latency: Option<LatencySummary>,
    verdict_changes: usize,
    last_verdict: Option<String>,
    restarts: BTreeMap<String, usize>,
    alerts: usize,
    lifecycle: Vec<String>,
    errors: Vec<String>,
}

impl TelemetryAggregator {
    pub fn record(&mut self, event: MetricEvent) {
        self.total_events += 1;
        match event {
            MetricEvent::DetectionLatency {
                avg_ms,
                max_ms,
                sample_count,
            } => {
                self.last_latency = Some(LatencySummary {
                    avg_ms,
                    max_ms,
                    sample_count,
                });
            }
            MetricEvent::Classification { is_bad, reason } => {
                self.verdict_changes += 1;
                self.last_verdict = Some(match (is_bad, reason) {
                    (false, _) => "good".to_string(),
                    (true, Some(reason)) => format!("bad ({reason})"),
                    (true, None) => "bad".to_string(),
                });
            }
            MetricEvent::CaptureRestart { cause, .. } => {
                *self.restarts.entry(format!("{cause:?}")).or_insert(0) += 1;
            }
            MetricEvent::Alert { .. } => self.alerts += 1,
            MetricEvent::Lifecycle { phase, .. } => self.lifecycle.push(format!("{phase:?}")),
            MetricEvent::Error { code, context } => self.errors.push(format!("{code}: {context}")),
        }
    }

    pub fn lagged(&mut self, skipped: usize) {
        self.lagged_events += skipped;
    }

    pub fn into_report(self, collector_total: u64, collector_dropped: u64) -> TelemetryReport {
        TelemetryReport {
            observed_events: self.total_events,
            collector_total,
            collector_dropped,
            lagged_events: self.lagged_events,
            latency: self.last_latency,
            verdict_changes: self.verdict_changes,
            last_verdict: self.last_verdict,
            restarts: self.restarts,
            alerts: self.alerts,
            lifecycle: self.lifecycle,
            errors: self.errors,
        }
    }
}

pub fn drain_metrics(rx: &mut Receiver<MetricEvent>, aggregator: &mut TelemetryAggregator) {
    loop {
        match rx.try_recv() {
            Ok(event) => aggregator.record(event),
            Err(TryRecvError::Lagged(skipped)) => aggregator.lagged(skipped as usize),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TelemetryReport {
    pub observed_events: usize,
    pub collector_total: u64,
    pub collector_dropped: u64,
    pub lagged_events: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySummary>,
    pub verdict_changes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_verdict: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub restarts: BTreeMap<String, usize>,
    pub alerts: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lifecycle: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl TelemetryReport {
    pub fn print_json(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing telemetry report")?;
        eprintln!("{json}");
        Ok(())
    }

    pub fn print_table(&self) {
        eprintln!("Telemetry events observed : {}", self.observed_events);
        eprintln!(
            "Collector totals          : {} (dropped {}, lagged {})",
            self.collector_total, self.collector_dropped, self.lagged_events
        );
        match &self.latency {
            Some(latency) => eprintln!(
                "Detection avg/max (ms)    : {:.3} / {:.3} over {} samples",
                latency.avg_ms, latency.max_ms, latency.sample_count
            ),
            None => eprintln!("Detection avg/max (ms)    : n/a"),
        }
        eprintln!(
            "Verdict changes           : {} (last: {})",
            self.verdict_changes,
            self.last_verdict.as_deref().unwrap_or("n/a")
        );
        eprintln!("Alerts                    : {}", self.alerts);
        if self.restarts.is_empty() {
            eprintln!("Capture restarts          : none");
        } else {
            eprintln!("Capture restarts          :");
            for (cause, count) in &self.restarts {
                eprintln!("  - {cause}: {count}");
            }
        }
        if !self.lifecycle.is_empty() {
            eprintln!("Lifecycle                 : {}", self.lifecycle.join(" -> "));
        }
        for error in &self.errors {
            eprintln!("Error                     : {error}");
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencySummary {
    pub avg_ms: f32,
    pub max_ms: f32,
    pub sample_count: usize,
}
