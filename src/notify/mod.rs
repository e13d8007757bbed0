// Notify module - user-facing posture notifications
//
// The host platform shows notifications through the Notifier trait. The
// NotificationManager on top of it keeps at most one notification
// outstanding: the previous one is cleared before a new one is shown, and
// stopping the monitor clears whatever is left.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::NotificationConfig;
use crate::error::NotifyError;
use crate::metrics::MetricName;

/// Handle to a shown notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(pub u64);

/// Platform notification sink
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<NotificationId, NotifyError>;
    fn clear(&self, id: NotificationId) -> Result<(), NotifyError>;
}

/// Notifier that writes notifications to the log
///
/// Used by the CLI and by headless deployments without a notification
/// surface.
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_id: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<NotificationId, NotifyError> {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        log::info!("[Notification #{}] {}: {}", id.0, title, message);
        Ok(id)
    }

    fn clear(&self, id: NotificationId) -> Result<(), NotifyError> {
        log::debug!("[Notification #{}] cleared", id.0);
        Ok(())
    }
}

/// Notifier that records every call, for tests and embedding hosts that
/// poll for notifications instead of receiving callbacks
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<(NotificationId, String, String)>>,
    cleared: Mutex<Vec<NotificationId>>,
    next_id: AtomicU64,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages shown so far, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.shown
            .lock()
            .map(|shown| shown.iter().map(|(_, _, message)| message.clone()).collect())
            .unwrap_or_default()
    }

    pub fn cleared(&self) -> Vec<NotificationId> {
        self.cleared
            .lock()
            .map(|cleared| cleared.clone())
            .unwrap_or_default()
    }

    /// Notifications shown and not yet cleared
    pub fn visible(&self) -> usize {
        let cleared = self.cleared();
        self.shown
            .lock()
            .map(|shown| {
                shown
                    .iter()
                    .filter(|(id, _, _)| !cleared.contains(id))
                    .count()
            })
            .unwrap_or(0)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<NotificationId, NotifyError> {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.shown
            .lock()
            .map_err(|_| NotifyError::DispatchFailed {
                reason: "recording notifier lock poisoned".to_string(),
            })?
            .push((id, title.to_string(), message.to_string()));
        Ok(id)
    }

    fn clear(&self, id: NotificationId) -> Result<(), NotifyError> {
        self.cleared
            .lock()
            .map_err(|_| NotifyError::DispatchFailed {
                reason: "recording notifier lock poisoned".to_string(),
            })?
            .push(id);
        Ok(())
    }
}

/// Keeps at most one notification on screen and picks the message copy
pub struct NotificationManager {
    notifier: Arc<dyn Notifier>,
    config: NotificationConfig,
    outstanding: Option<NotificationId>,
}

impl NotificationManager {
    pub fn new(notifier: Arc<dyn Notifier>, config: NotificationConfig) -> Self {
        Self {
            notifier,
            config,
            outstanding: None,
        }
    }

    /// Message shown for an alert with `reason`
    pub fn message_for(&self, reason: Option<MetricName>) -> &str {
        self.config.message_for(reason)
    }

    pub fn calibration_failed_message(&self) -> &str {
        &self.config.calibration_failed_message
    }

    /// Show `message`, replacing any outstanding notification
    ///
    /// A failure to clear the previous notification is logged and does not
    /// stop the new one from being shown.
    pub fn show(&mut self, message: &str) -> Result<NotificationId, NotifyError> {
        if let Err(err) = self.clear_outstanding() {
            log::warn!("[NotificationManager] Failed to clear previous notification: {}", err);
        }

        let id = self.notifier.notify(&self.config.title, message)?;
        self.outstanding = Some(id);
        Ok(id)
    }

    /// Clear the outstanding notification, if any
    pub fn clear_outstanding(&mut self) -> Result<(), NotifyError> {
        if let Some(id) = self.outstanding.take() {
            self.notifier.clear(id)?;
        }
        Ok(())
    }

    pub fn outstanding(&self) -> Option<NotificationId> {
        self.outstanding
    }
}
