//! Configuration management for the posture monitor
//!
//! Runtime configuration is loaded from a JSON file so timing constants,
//! visibility gating and notification copy can be tuned without
//! recompilation. Every section and field falls back to its default when
//! absent, and a missing or malformed file yields the full default config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::metrics::MetricName;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub extraction: ExtractionConfig,
    pub notification: NotificationConfig,
    pub storage: StorageConfig,
}

/// Timing of the sampling loop, debounce, flush and restart backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling period of the capture loop
    pub tick_interval_ms: u64,
    /// How long a bad-posture episode must last before the alert fires
    pub alert_threshold_ms: u64,
    /// Period of the frame-statistics flush
    pub flush_interval_ms: u64,
    /// Restart delay after the source reports a paused stream
    pub stall_backoff_ms: u64,
    /// Restart delay after an unexpected capture/model fault
    pub fault_backoff_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            alert_threshold_ms: 3000,
            flush_interval_ms: 5000,
            stall_backoff_ms: 1000,
            fault_backoff_ms: 3000,
        }
    }
}

impl MonitorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn alert_threshold(&self) -> Duration {
        Duration::from_millis(self.alert_threshold_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn stall_backoff(&self) -> Duration {
        Duration::from_millis(self.stall_backoff_ms)
    }

    pub fn fault_backoff(&self) -> Duration {
        Duration::from_millis(self.fault_backoff_ms)
    }
}

/// Landmark gating used by the metric extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Landmarks whose visibility is reported below this value count as missing
    pub min_visibility: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
        }
    }
}

/// User-facing notification copy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub title: String,
    /// Message used when no reason-specific message is configured
    pub generic_message: String,
    /// Sent when calibration is requested before posture is detected
    pub calibration_failed_message: String,
    pub messages: BTreeMap<MetricName, String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        let mut messages = BTreeMap::new();
        messages.insert(
            MetricName::NeckAngle,
            "Forward head posture detected! Tuck your chin and open your shoulders.".to_string(),
        );
        messages.insert(
            MetricName::SlumpDepth,
            "You are slumping! Roll your shoulders back.".to_string(),
        );
        messages.insert(
            MetricName::HeadTilt,
            "Your head is tilted! Level it out.".to_string(),
        );
        messages.insert(
            MetricName::ShoulderTilt,
            "Your body is leaning! Straighten up.".to_string(),
        );

        Self {
            title: "Posture alert".to_string(),
            generic_message: "Your posture has been off for a while!".to_string(),
            calibration_failed_message:
                "Posture not detected. Check the camera and try again.".to_string(),
            messages,
        }
    }
}

impl NotificationConfig {
    /// Message for an alert caused by `reason`
    pub fn message_for(&self, reason: Option<MetricName>) -> &str {
        reason
            .and_then(|name| self.messages.get(&name))
            .map(String::as_str)
            .unwrap_or(&self.generic_message)
    }
}

/// Location of the file-backed key-value store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("posture_store.json"),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the default configuration if the file
    /// doesn't exist or its JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/monitor_config.json")
    }
}
