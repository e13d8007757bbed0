// BaselineManager: ownership of the calibrated baseline
//
// Single Responsibility: baseline capture, persistence, restore and
// invalidation. The baseline itself is replaced as a whole value behind an
// RwLock so readers never see a partially updated baseline.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::calibration::Baseline;
use crate::error::{
    log_calibration_error, log_storage_error, CalibrationError, StorageError,
};
use crate::metrics::MetricsSnapshot;
use crate::storage::{keys, read_value, write_value, KeyValueStore};

/// Manages the calibrated baseline and its persisted copy
///
/// # Example
/// ```ignore
/// let manager = BaselineManager::new();
/// manager.load(&store)?;
/// let baseline = manager.calibrate(Some(&snapshot), Utc::now(), &store)?;
/// ```
pub struct BaselineManager {
    state: Arc<RwLock<Option<Baseline>>>,
}

impl BaselineManager {
    /// Create a manager with no baseline (uncalibrated)
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(None)),
        }
    }

    /// Capture a new baseline from the latest snapshot
    ///
    /// # Arguments
    /// * `latest` - Most recent snapshot, if any frame has been processed
    /// * `captured_at` - Wall-clock time recorded on the baseline
    /// * `store` - Persistent store for the new baseline
    ///
    /// # Returns
    /// * `Ok(Baseline)` - New baseline, already active in memory
    /// * `Err(CalibrationError)` - Prior baseline is left untouched
    ///
    /// # Errors
    /// - `NoSnapshot` when no frame has been processed yet
    /// - `IncompleteSnapshot` when any metric is missing
    /// - Lock poisoning on baseline state
    ///
    /// A failed write to `store` is logged; the in-memory baseline is still
    /// replaced.
    pub fn calibrate(
        &self,
        latest: Option<&MetricsSnapshot>,
        captured_at: DateTime<Utc>,
        store: &dyn KeyValueStore,
    ) -> Result<Baseline, CalibrationError> {
        let snapshot = latest.ok_or(CalibrationError::NoSnapshot).inspect_err(|err| {
            log_calibration_error(err, "calibrate");
        })?;

        let baseline = Baseline::from_snapshot(snapshot, captured_at).inspect_err(|err| {
            log_calibration_error(err, "calibrate");
        })?;

        self.replace(Some(baseline.clone()), "calibrate")?;
        log::info!(
            "[BaselineManager] Calibrated baseline at {}",
            baseline.captured_at.to_rfc3339()
        );

        if let Err(err) = write_value(store, keys::BASELINE, &baseline) {
            log_storage_error(&err, "persist_baseline");
        }

        Ok(baseline)
    }

    /// Install an externally supplied baseline (the `setBaseline` action)
    ///
    /// The baseline is validated the same way a freshly captured one is;
    /// an invalid baseline is rejected and the current one kept.
    pub fn set_baseline(&self, baseline: Baseline) -> Result<(), CalibrationError> {
        baseline.validate().inspect_err(|err| {
            log_calibration_error(err, "set_baseline");
        })?;
        self.replace(Some(baseline), "set_baseline")?;
        log::info!("[BaselineManager] Baseline replaced by controller");
        Ok(())
    }

    /// Restore the persisted baseline at session start
    ///
    /// A stored baseline that no longer decodes or was written with another
    /// schema version is removed from storage and the session starts
    /// uncalibrated.
    ///
    /// # Returns
    /// * `Ok(Some(baseline))` - Baseline restored
    /// * `Ok(None)` - Nothing stored, or the stored value was discarded
    /// * `Err(StorageError::Unavailable)` - Store could not be read
    pub fn load(&self, store: &dyn KeyValueStore) -> Result<Option<Baseline>, StorageError> {
        let stored = match read_value::<Baseline>(store, keys::BASELINE) {
            Ok(stored) => stored,
            Err(err @ StorageError::Corrupt { .. }) => {
                log::warn!("[BaselineManager] Discarding unreadable baseline: {}", err);
                self.discard_stored(store);
                None
            }
            Err(err) => {
                log_storage_error(&err, "load_baseline");
                return Err(err);
            }
        };

        let Some(baseline) = stored else {
            return Ok(None);
        };

        if let Err(err) = baseline.validate() {
            log::warn!("[BaselineManager] Discarding stored baseline: {}", err);
            self.discard_stored(store);
            return Ok(None);
        }

        self.replace(Some(baseline.clone()), "load_baseline")
            .map_err(|err| StorageError::Unavailable {
                reason: err.to_string(),
            })?;
        log::info!(
            "[BaselineManager] Restored baseline captured at {}",
            baseline.captured_at.to_rfc3339()
        );
        Ok(Some(baseline))
    }

    /// Drop the baseline from memory and storage
    pub fn invalidate(&self, store: &dyn KeyValueStore) -> Result<(), CalibrationError> {
        self.replace(None, "invalidate")?;
        if let Err(err) = store.remove(keys::BASELINE) {
            log_storage_error(&err, "invalidate_baseline");
        }
        log::info!("[BaselineManager] Baseline invalidated");
        Ok(())
    }

    /// Clone of the current baseline, if calibrated
    pub fn current(&self) -> Result<Option<Baseline>, CalibrationError> {
        let guard = self.read_state().inspect_err(|err| {
            log_calibration_error(err, "current_baseline");
        })?;
        Ok(guard.clone())
    }

    pub fn is_calibrated(&self) -> bool {
        self.read_state().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Shared handle to the baseline for concurrent readers
    pub fn get_state_arc(&self) -> Arc<RwLock<Option<Baseline>>> {
        Arc::clone(&self.state)
    }

    // ========================================================================
    // HELPER METHODS - Lock management
    // ========================================================================

    fn replace(&self, baseline: Option<Baseline>, context: &str) -> Result<(), CalibrationError> {
        let mut guard = self.write_state().inspect_err(|err| {
            log_calibration_error(err, context);
        })?;
        *guard = baseline;
        Ok(())
    }

    fn discard_stored(&self, store: &dyn KeyValueStore) {
        if let Err(err) = store.remove(keys::BASELINE) {
            log_storage_error(&err, "discard_baseline");
        }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, Option<Baseline>>, CalibrationError> {
        self.state
            .read()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, Option<Baseline>>, CalibrationError> {
        self.state
            .write()
            .map_err(|_| CalibrationError::StatePoisoned)
    }
}

impl Default for BaselineManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::BASELINE_SCHEMA_VERSION;
    use crate::metrics::MetricName;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn snapshot(neck: f64) -> MetricsSnapshot {
        MetricsSnapshot::new()
            .with(MetricName::NeckAngle, neck)
            .with(MetricName::SlumpDepth, -4.0)
            .with(MetricName::HeadTilt, 0.0)
            .with(MetricName::ShoulderTilt, 0.0)
    }

    #[test]
    fn test_new_is_uncalibrated() {
        let manager = BaselineManager::new();
        assert!(!manager.is_calibrated());
        assert!(manager.current().unwrap().is_none());
    }

    #[test]
    fn test_calibrate_without_snapshot() {
        let manager = BaselineManager::new();
        let store = MemoryStore::new();
        assert_eq!(
            manager.calibrate(None, now(), &store),
            Err(CalibrationError::NoSnapshot)
        );
    }

    #[test]
    fn test_calibrate_persists_baseline() {
        let manager = BaselineManager::new();
        let store = MemoryStore::new();

        let baseline = manager.calibrate(Some(&snapshot(160.0)), now(), &store).unwrap();
        assert_eq!(manager.current().unwrap(), Some(baseline.clone()));

        let stored: Option<Baseline> = read_value(&store, keys::BASELINE).unwrap();
        assert_eq!(stored, Some(baseline));
    }

    #[test]
    fn test_incomplete_snapshot_keeps_prior_baseline() {
        let manager = BaselineManager::new();
        let store = MemoryStore::new();
        let prior = manager.calibrate(Some(&snapshot(160.0)), now(), &store).unwrap();

        let partial = MetricsSnapshot::new().with(MetricName::NeckAngle, 120.0);
        let result = manager.calibrate(Some(&partial), now(), &store);

        assert!(matches!(
            result,
            Err(CalibrationError::IncompleteSnapshot { .. })
        ));
        assert_eq!(manager.current().unwrap(), Some(prior));
    }

    #[test]
    fn test_storage_failure_still_replaces_in_memory() {
        let manager = BaselineManager::new();
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let baseline = manager.calibrate(Some(&snapshot(150.0)), now(), &store).unwrap();
        assert_eq!(manager.current().unwrap(), Some(baseline));
        assert!(store.get(&[keys::BASELINE]).unwrap().is_empty());
    }

    #[test]
    fn test_load_restores_baseline() {
        let store = MemoryStore::new();
        let original = BaselineManager::new()
            .calibrate(Some(&snapshot(158.0)), now(), &store)
            .unwrap();

        let manager = BaselineManager::new();
        assert_eq!(manager.load(&store).unwrap(), Some(original.clone()));
        assert_eq!(manager.current().unwrap(), Some(original));
    }

    #[test]
    fn test_load_discards_legacy_shape() {
        let store = MemoryStore::new();
        write_value(
            &store,
            keys::BASELINE,
            &json!({ "turtle_diff_x": 0.12, "tilt_diff_y": 0.01 }),
        )
        .unwrap();

        let manager = BaselineManager::new();
        assert_eq!(manager.load(&store).unwrap(), None);
        assert!(!manager.is_calibrated());
        assert!(store.get(&[keys::BASELINE]).unwrap().is_empty());
    }

    #[test]
    fn test_load_discards_other_schema_version() {
        let store = MemoryStore::new();
        let mut baseline = Baseline::from_snapshot(&snapshot(160.0), now()).unwrap();
        baseline.schema_version = BASELINE_SCHEMA_VERSION + 1;
        write_value(&store, keys::BASELINE, &baseline).unwrap();

        let manager = BaselineManager::new();
        assert_eq!(manager.load(&store).unwrap(), None);
        assert!(store.get(&[keys::BASELINE]).unwrap().is_empty());
    }

    #[test]
    fn test_set_baseline_validates() {
        let manager = BaselineManager::new();
        let mut baseline = Baseline::from_snapshot(&snapshot(160.0), now()).unwrap();
        assert!(manager.set_baseline(baseline.clone()).is_ok());

        baseline.schema_version = 1;
        assert!(matches!(
            manager.set_baseline(baseline),
            Err(CalibrationError::SchemaMismatch { found: 1, .. })
        ));
        assert_eq!(
            manager.current().unwrap().map(|b| b.schema_version),
            Some(BASELINE_SCHEMA_VERSION)
        );
    }

    #[test]
    fn test_invalidate_clears_memory_and_store() {
        let manager = BaselineManager::new();
        let store = MemoryStore::new();
        manager.calibrate(Some(&snapshot(160.0)), now(), &store).unwrap();

        manager.invalidate(&store).unwrap();
        assert!(!manager.is_calibrated());
        assert!(store.get(&[keys::BASELINE]).unwrap().is_empty());
    }

    #[test]
    fn test_state_arc_shares_updates() {
        let manager = BaselineManager::new();
        let shared = manager.get_state_arc();
        manager
            .set_baseline(Baseline::from_snapshot(&snapshot(160.0), now()).unwrap())
            .unwrap();
        assert!(shared.read().unwrap().is_some());
    }
}
