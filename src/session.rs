// MonitorSession - the single owner of monitor state
//
// Every control action, sampling tick and flush goes through one session:
//
//   tick:  CaptureSupervisor → MetricExtractor → DeviationClassifier
//          → StatsAggregator (calibrated frames only) → DebounceMachine
//          → NotificationManager + alert stats + sendNotification event
//   flush: StatsAggregator → KeyValueStore → updateFrameStats event
//
// The session is synchronous. MonitorService drives it from timers and the
// control channel; the CLI drives it from a manual clock.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::analysis::{
    DebounceMachine, DeviationClassifier, PostureAlert, PostureState, SensitivityLevel,
};
use crate::calibration::Baseline;
use crate::capture::{CaptureSource, CaptureSupervisor, PoseEstimator, TickOutcome, TimeSource};
use crate::config::AppConfig;
use crate::error::{log_storage_error, SessionError, StorageError};
use crate::managers::BaselineManager;
use crate::metrics::{LandmarkFrame, MetricExtractor, MetricName, MetricsSnapshot};
use crate::notify::{NotificationManager, Notifier};
use crate::protocol::{ControlAction, CoreEvent};
use crate::stats::{FrameCounts, StatsAggregator};
use crate::storage::{keys, read_value, write_value, KeyValueStore};
use crate::telemetry::{self, LifecyclePhase};

/// Host-provided collaborators of a session
pub struct SessionPorts {
    pub capture: Arc<dyn CaptureSource>,
    pub estimator: Arc<dyn PoseEstimator>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn TimeSource>,
}

pub struct MonitorSession {
    config: AppConfig,
    extractor: MetricExtractor,
    baseline: BaselineManager,
    classifier: DeviationClassifier,
    sensitivity: SensitivityLevel,
    debounce: DebounceMachine,
    stats: StatsAggregator,
    notifications: NotificationManager,
    supervisor: CaptureSupervisor,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn TimeSource>,
    events: broadcast::Sender<CoreEvent>,
    latest: Option<MetricsSnapshot>,
    monitoring: bool,
}

impl MonitorSession {
    /// Create an uncalibrated, stopped session
    ///
    /// # Arguments
    /// * `config` - Timing, extraction and notification settings
    /// * `ports` - Capture, model, notifier, store and clock
    /// * `events` - Sender for events produced for the controller
    pub fn new(config: AppConfig, ports: SessionPorts, events: broadcast::Sender<CoreEvent>) -> Self {
        let supervisor = CaptureSupervisor::new(ports.capture, ports.estimator, &config.monitor);
        let notifications = NotificationManager::new(ports.notifier, config.notification.clone());

        Self {
            extractor: MetricExtractor::new(&config.extraction),
            baseline: BaselineManager::new(),
            classifier: DeviationClassifier::new(),
            sensitivity: SensitivityLevel::default(),
            debounce: DebounceMachine::new(config.monitor.alert_threshold()),
            stats: StatsAggregator::new(),
            notifications,
            supervisor,
            store: ports.store,
            clock: ports.clock,
            events,
            latest: None,
            monitoring: false,
            config,
        }
    }

    /// Restore baseline, sensitivity and the monitoring flag from storage
    ///
    /// Unreadable sensitivity values fall back to the default. If the stored
    /// flag says monitoring was enabled, monitoring is started again.
    ///
    /// # Errors
    /// `StorageError::Unavailable` when the store cannot be read at all; the
    /// session then stays stopped and uncalibrated.
    pub fn restore(&mut self) -> Result<(), SessionError> {
        if self.baseline.load(self.store.as_ref())?.is_some() {
            telemetry::hub().record_lifecycle(LifecyclePhase::BaselineRestored);
        }

        match read_value::<SensitivityLevel>(self.store.as_ref(), keys::SENSITIVITY) {
            Ok(Some(level)) => self.sensitivity = level,
            Ok(None) => {}
            Err(err @ StorageError::Corrupt { .. }) => {
                log::warn!("[MonitorSession] Ignoring stored sensitivity: {}", err);
            }
            Err(err) => return Err(err.into()),
        }

        let enabled = match read_value::<bool>(self.store.as_ref(), keys::ENABLED) {
            Ok(enabled) => enabled.unwrap_or(false),
            Err(err @ StorageError::Corrupt { .. }) => {
                log::warn!("[MonitorSession] Ignoring stored monitoring flag: {}", err);
                false
            }
            Err(err) => return Err(err.into()),
        };

        log::info!(
            "[MonitorSession] Restored (calibrated: {}, sensitivity: {}, enabled: {})",
            self.baseline.is_calibrated(),
            self.sensitivity,
            enabled
        );

        if enabled {
            self.start_monitoring()?;
        }
        Ok(())
    }

    /// Apply one controller action
    pub fn handle_action(&mut self, action: ControlAction) -> Result<(), SessionError> {
        log::debug!("[MonitorSession] Handling {}", action.name());
        match action {
            ControlAction::Calibrate => self.calibrate().map(|_| ()),
            ControlAction::SetBaseline { data } => self.set_baseline(data),
            ControlAction::SetSensitivity { level } => {
                self.set_sensitivity(level);
                Ok(())
            }
            ControlAction::StartMonitoring => self.start_monitoring(),
            ControlAction::StopMonitoring => {
                self.stop_monitoring();
                Ok(())
            }
        }
    }

    /// Capture a baseline from the latest snapshot
    ///
    /// On success the new baseline is announced with `saveBaseline` and any
    /// running episode is dropped. On failure the user is asked to retry via
    /// a `sendNotification` without a reason and the prior baseline stays.
    pub fn calibrate(&mut self) -> Result<Baseline, SessionError> {
        let captured_at = self.clock.utc_now();
        match self
            .baseline
            .calibrate(self.latest.as_ref(), captured_at, self.store.as_ref())
        {
            Ok(baseline) => {
                self.debounce.reset();
                telemetry::hub().reset_classification();
                telemetry::hub().record_lifecycle(LifecyclePhase::Calibrated);
                self.publish(CoreEvent::SaveBaseline {
                    data: baseline.clone(),
                });
                Ok(baseline)
            }
            Err(err) => {
                telemetry::hub().record_error(&err, "calibrate");
                let message = self.notifications.calibration_failed_message().to_string();
                self.notify(message, None);
                Err(err.into())
            }
        }
    }

    /// Install or clear the baseline (`setBaseline`)
    ///
    /// `None` clears the baseline from memory and storage.
    pub fn set_baseline(&mut self, data: Option<Baseline>) -> Result<(), SessionError> {
        match data {
            Some(baseline) => self.baseline.set_baseline(baseline)?,
            None => {
                self.baseline.invalidate(self.store.as_ref())?;
                telemetry::hub().record_lifecycle(LifecyclePhase::BaselineCleared);
            }
        }
        self.debounce.reset();
        Ok(())
    }

    /// Change sensitivity; effective from the next classification
    pub fn set_sensitivity(&mut self, level: SensitivityLevel) {
        if level != self.sensitivity {
            log::info!(
                "[MonitorSession] Sensitivity {} -> {}",
                self.sensitivity,
                level
            );
        }
        self.sensitivity = level;
        if let Err(err) = write_value(self.store.as_ref(), keys::SENSITIVITY, &level) {
            log_storage_error(&err, "persist_sensitivity");
        }
    }

    /// Start (or restart) the sampling loop from a clean episode state
    ///
    /// # Errors
    /// Returns the capture error if the source could not be acquired.
    /// Monitoring stays enabled and the supervisor keeps retrying.
    pub fn start_monitoring(&mut self) -> Result<(), SessionError> {
        self.debounce.reset();
        telemetry::hub().reset_classification();
        self.monitoring = true;
        self.persist_enabled(true);
        telemetry::hub().record_lifecycle(LifecyclePhase::MonitoringStarted);

        if !self.baseline.is_calibrated() {
            log::warn!("[MonitorSession] Monitoring without a baseline; frames are not judged");
        }

        self.supervisor.start(self.clock.now())?;
        Ok(())
    }

    /// Stop sampling and forget the current episode
    ///
    /// Pending frame counts are flushed and the outstanding notification is
    /// cleared. The last snapshot is dropped with the capture source, so a
    /// later `calibrate` needs a fresh detection.
    pub fn stop_monitoring(&mut self) {
        self.supervisor.stop();
        self.latest = None;
        self.debounce.reset();
        telemetry::hub().reset_classification();
        if let Err(err) = self.notifications.clear_outstanding() {
            log::warn!("[MonitorSession] Failed to clear notification: {}", err);
        }

        if self.monitoring {
            telemetry::hub().record_lifecycle(LifecyclePhase::MonitoringStopped);
        }
        self.monitoring = false;
        self.persist_enabled(false);
        self.flush_stats();
    }

    /// Run one sampling period
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();
        let outcome = self.supervisor.tick(now);
        if let TickOutcome::Landmarks(frame) = &outcome {
            self.process_landmarks(frame, now);
        }
        outcome
    }

    /// Push one detected frame through extraction, classification and debounce
    ///
    /// # Returns
    /// The alert, if this frame completed a sustained bad episode
    pub fn process_landmarks(&mut self, frame: &LandmarkFrame, now: Instant) -> Option<PostureAlert> {
        let snapshot = self.extractor.extract(frame);
        if snapshot.is_empty() {
            log::debug!("[MonitorSession] No metrics in frame, treating as gap");
            return None;
        }

        let baseline = self.baseline.current().unwrap_or_else(|err| {
            telemetry::hub().record_error(&err, "classify");
            None
        });
        let outcome = self
            .classifier
            .classify(&snapshot, baseline.as_ref(), self.sensitivity);
        self.latest = Some(snapshot);

        telemetry::hub().record_classification(&outcome.classification);
        if outcome.is_calibrated() {
            self.stats.record_frame(outcome.classification.is_bad);
        }

        let alert = self.debounce.observe(&outcome.classification, now)?;
        self.raise_alert(&alert);
        Some(alert)
    }

    /// Persist accumulated frame counts for today
    ///
    /// # Returns
    /// The flushed counts when a non-empty interval was written; an
    /// `updateFrameStats` event is published for it.
    pub fn flush_stats(&mut self) -> Option<FrameCounts> {
        let today = self.clock.today();
        match self.stats.flush(self.store.as_ref(), today) {
            Ok(Some(counts)) if !counts.is_empty() => {
                self.publish(CoreEvent::UpdateFrameStats {
                    good_frames: counts.good_frames,
                    bad_frames: counts.bad_frames,
                });
                Some(counts)
            }
            Ok(_) => None,
            Err(err) => {
                log_storage_error(&err, "flush_stats");
                telemetry::hub().record_error(&err, "flush_stats");
                None
            }
        }
    }

    /// Stop sampling without touching the stored monitoring flag
    ///
    /// Used when the process exits so the next start resumes monitoring.
    pub fn shutdown(&mut self) {
        self.supervisor.stop();
        self.latest = None;
        self.debounce.reset();
        self.flush_stats();
        log::info!("[MonitorSession] Shut down");
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sensitivity(&self) -> SensitivityLevel {
        self.sensitivity
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_calibrated()
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline.current().ok().flatten()
    }

    pub fn latest_snapshot(&self) -> Option<&MetricsSnapshot> {
        self.latest.as_ref()
    }

    pub fn posture_state(&self) -> PostureState {
        self.debounce.state()
    }

    pub fn supervisor(&self) -> &CaptureSupervisor {
        &self.supervisor
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // HELPER METHODS
    // ========================================================================

    fn raise_alert(&mut self, alert: &PostureAlert) {
        telemetry::hub().record_alert(alert.reason);

        if let Some(reason) = alert.reason {
            if let Err(err) = self
                .stats
                .record_alert(reason, self.clock.today(), self.store.as_ref())
            {
                log_storage_error(&err, "record_alert");
            }
        }

        let message = self.notifications.message_for(alert.reason).to_string();
        self.notify(message, alert.reason);
    }

    fn notify(&mut self, message: String, reason: Option<MetricName>) {
        if let Err(err) = self.notifications.show(&message) {
            log::warn!("[MonitorSession] Notification failed: {}", err);
            telemetry::hub().record_error(&err, "notify");
        }
        self.publish(CoreEvent::SendNotification { message, reason });
    }

    fn publish(&self, event: CoreEvent) {
        if self.events.send(event).is_err() {
            log::debug!("[MonitorSession] No event listeners");
        }
    }

    fn persist_enabled(&self, enabled: bool) {
        if let Err(err) = write_value(self.store.as_ref(), keys::ENABLED, &enabled) {
            log_storage_error(&err, "persist_enabled");
        }
    }
}
