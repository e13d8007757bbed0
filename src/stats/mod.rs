// Statistics module - per-day posture counters
//
// Frame counters accumulate in memory and are merged into the stored
// DailyStats record of the current calendar date on every flush. Alert
// counts are persisted as soon as the alert fires. Anything that could not
// be written stays pending and is merged into the next successful write, so
// a storage outage delays counts but never drops them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::metrics::MetricName;
use crate::storage::{keys, read_value, KeyValueStore, StoreEntries};

/// Good/bad frame counts for one flush interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameCounts {
    pub good_frames: u64,
    pub bad_frames: u64,
}

impl FrameCounts {
    pub fn is_empty(&self) -> bool {
        self.good_frames == 0 && self.bad_frames == 0
    }

    pub fn total(&self) -> u64 {
        self.good_frames + self.bad_frames
    }
}

/// Stored statistics for one calendar day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyStats {
    pub total_alerts: u64,
    pub by_reason: BTreeMap<String, u64>,
    pub good_frames: u64,
    pub bad_frames: u64,
}

impl DailyStats {
    fn add_frames(&mut self, counts: FrameCounts) {
        self.good_frames += counts.good_frames;
        self.bad_frames += counts.bad_frames;
    }

    fn add_alerts(&mut self, alerts: &BTreeMap<MetricName, u64>) {
        for (reason, count) in alerts {
            self.total_alerts += count;
            *self.by_reason.entry(reason.as_str().to_string()).or_insert(0) += count;
        }
    }

    /// Share of counted frames that were good, if any were counted
    pub fn good_ratio(&self) -> Option<f64> {
        let total = self.good_frames + self.bad_frames;
        (total > 0).then(|| self.good_frames as f64 / total as f64)
    }
}

/// Read the stored record for `date`
pub fn read_daily_stats(
    store: &dyn KeyValueStore,
    date: NaiveDate,
) -> Result<Option<DailyStats>, StorageError> {
    read_value(store, &keys::daily_stats(date))
}

/// In-memory counters awaiting persistence
#[derive(Debug, Default)]
pub struct StatsAggregator {
    frames: FrameCounts,
    pending_alerts: BTreeMap<NaiveDate, BTreeMap<MetricName, u64>>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, is_bad: bool) {
        if is_bad {
            self.frames.bad_frames += 1;
        } else {
            self.frames.good_frames += 1;
        }
    }

    /// Count an alert and persist it immediately
    ///
    /// On failure the count stays pending and is retried on the next write.
    pub fn record_alert(
        &mut self,
        reason: MetricName,
        date: NaiveDate,
        store: &dyn KeyValueStore,
    ) -> Result<(), StorageError> {
        *self
            .pending_alerts
            .entry(date)
            .or_default()
            .entry(reason)
            .or_insert(0) += 1;
        self.write(store, None)
    }

    /// Merge accumulated frame counts (and any pending alerts) into storage
    ///
    /// # Returns
    /// * `Ok(Some(counts))` - Counters written and reset; `counts` is what was flushed
    /// * `Ok(None)` - Nothing accumulated; no write was made
    /// * `Err(StorageError)` - Counters retained for the next flush
    pub fn flush(
        &mut self,
        store: &dyn KeyValueStore,
        today: NaiveDate,
    ) -> Result<Option<FrameCounts>, StorageError> {
        if !self.has_pending() {
            return Ok(None);
        }

        let frames = self.frames;
        self.write(store, Some((today, frames)))?;
        self.frames = FrameCounts::default();

        log::debug!(
            "[StatsAggregator] Flushed {} good / {} bad frames for {}",
            frames.good_frames,
            frames.bad_frames,
            today
        );
        Ok(Some(frames))
    }

    /// Frame counts not yet flushed
    pub fn pending_frames(&self) -> FrameCounts {
        self.frames
    }

    /// Alert counts not yet persisted
    pub fn pending_alert_count(&self) -> u64 {
        self.pending_alerts
            .values()
            .flat_map(|by_reason| by_reason.values())
            .sum()
    }

    pub fn has_pending(&self) -> bool {
        !self.frames.is_empty() || !self.pending_alerts.is_empty()
    }

    fn write(
        &mut self,
        store: &dyn KeyValueStore,
        frames: Option<(NaiveDate, FrameCounts)>,
    ) -> Result<(), StorageError> {
        let frames = frames.filter(|(_, counts)| !counts.is_empty());

        let mut dates: BTreeSet<NaiveDate> = self.pending_alerts.keys().copied().collect();
        if let Some((date, _)) = frames {
            dates.insert(date);
        }

        let mut entries = StoreEntries::new();
        for date in dates {
            let key = keys::daily_stats(date);
            let mut record = Self::load_record(store, date)?;
            if let Some(alerts) = self.pending_alerts.get(&date) {
                record.add_alerts(alerts);
            }
            if let Some((frames_date, counts)) = frames {
                if frames_date == date {
                    record.add_frames(counts);
                }
            }
            let value = serde_json::to_value(&record).map_err(|err| StorageError::Corrupt {
                key: key.clone(),
                reason: err.to_string(),
            })?;
            entries.insert(key, value);
        }

        if entries.is_empty() {
            return Ok(());
        }

        store.set(entries)?;
        self.pending_alerts.clear();
        Ok(())
    }

    fn load_record(store: &dyn KeyValueStore, date: NaiveDate) -> Result<DailyStats, StorageError> {
        match read_daily_stats(store, date) {
            Ok(record) => Ok(record.unwrap_or_default()),
            Err(err @ StorageError::Corrupt { .. }) => {
                log::warn!("[StatsAggregator] Replacing unreadable stats record: {}", err);
                Ok(DailyStats::default())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{write_value, MemoryStore};
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_flush_writes_and_resets() {
        let store = MemoryStore::new();
        let mut stats = StatsAggregator::new();
        stats.record_frame(false);
        stats.record_frame(false);
        stats.record_frame(true);

        let flushed = stats.flush(&store, day(1)).unwrap();
        assert_eq!(
            flushed,
            Some(FrameCounts {
                good_frames: 2,
                bad_frames: 1
            })
        );
        assert!(stats.pending_frames().is_empty());

        let record = read_daily_stats(&store, day(1)).unwrap().unwrap();
        assert_eq!(record.good_frames, 2);
        assert_eq!(record.bad_frames, 1);
    }

    #[test]
    fn test_flush_accumulates_into_existing_record() {
        let store = MemoryStore::new();
        let mut stats = StatsAggregator::new();
        for _ in 0..3 {
            stats.record_frame(true);
            stats.flush(&store, day(1)).unwrap();
        }
        assert_eq!(read_daily_stats(&store, day(1)).unwrap().unwrap().bad_frames, 3);
    }

    #[test]
    fn test_empty_flush_is_idempotent() {
        let store = MemoryStore::new();
        let mut stats = StatsAggregator::new();
        stats.record_frame(false);
        stats.flush(&store, day(1)).unwrap();
        let writes = store.write_count();

        assert_eq!(stats.flush(&store, day(1)).unwrap(), None);
        assert_eq!(stats.flush(&store, day(1)).unwrap(), None);
        assert_eq!(store.write_count(), writes);
    }

    #[test]
    fn test_alert_is_persisted_immediately() {
        let store = MemoryStore::new();
        let mut stats = StatsAggregator::new();
        stats.record_alert(MetricName::NeckAngle, day(2), &store).unwrap();
        stats.record_alert(MetricName::NeckAngle, day(2), &store).unwrap();
        stats.record_alert(MetricName::HeadTilt, day(2), &store).unwrap();

        let record = read_daily_stats(&store, day(2)).unwrap().unwrap();
        assert_eq!(record.total_alerts, 3);
        assert_eq!(record.by_reason["neckAngle"], 2);
        assert_eq!(record.by_reason["headTilt"], 1);
        assert_eq!(stats.pending_alert_count(), 0);
    }

    #[test]
    fn test_good_ratio_counts_frames_only() {
        let store = MemoryStore::new();
        let mut stats = StatsAggregator::new();
        stats.record_alert(MetricName::SlumpDepth, day(3), &store).unwrap();
        let alerts_only = read_daily_stats(&store, day(3)).unwrap().unwrap();
        assert_eq!(alerts_only.good_ratio(), None);

        for is_bad in [false, false, false, true] {
            stats.record_frame(is_bad);
        }
        stats.flush(&store, day(3)).unwrap();
        let record = read_daily_stats(&store, day(3)).unwrap().unwrap();
        assert_eq!(record.good_ratio(), Some(0.75));
    }

    #[test]
    fn test_storage_failure_retains_counts() {
        let store = MemoryStore::new();
        let mut stats = StatsAggregator::new();
        store.set_unavailable(true);

        stats.record_frame(true);
        stats.record_frame(false);
        assert!(stats
            .record_alert(MetricName::SlumpDepth, day(3), &store)
            .is_err());
        assert!(stats.flush(&store, day(3)).is_err());
        assert_eq!(stats.pending_frames().total(), 2);
        assert_eq!(stats.pending_alert_count(), 1);

        store.set_unavailable(false);
        stats.record_frame(true);
        stats.flush(&store, day(3)).unwrap();

        let record = read_daily_stats(&store, day(3)).unwrap().unwrap();
        assert_eq!(record.bad_frames, 2);
        assert_eq!(record.good_frames, 1);
        assert_eq!(record.total_alerts, 1);
        assert!(!stats.has_pending());
    }

    #[test]
    fn test_pending_alerts_keep_their_own_date() {
        let store = MemoryStore::new();
        let mut stats = StatsAggregator::new();
        store.set_unavailable(true);
        let _ = stats.record_alert(MetricName::HeadTilt, day(4), &store);
        store.set_unavailable(false);

        stats.record_frame(false);
        stats.flush(&store, day(5)).unwrap();

        assert_eq!(read_daily_stats(&store, day(4)).unwrap().unwrap().total_alerts, 1);
        let today = read_daily_stats(&store, day(5)).unwrap().unwrap();
        assert_eq!(today.total_alerts, 0);
        assert_eq!(today.good_frames, 1);
    }

    #[test]
    fn test_record_shape() {
        let store = MemoryStore::new();
        let mut stats = StatsAggregator::new();
        stats.record_alert(MetricName::ShoulderTilt, day(6), &store).unwrap();

        let raw = store.get(&["2024-06-06"]).unwrap();
        assert_eq!(
            raw["2024-06-06"],
            json!({
                "totalAlerts": 1,
                "byReason": { "shoulderTilt": 1 },
                "goodFrames": 0,
                "badFrames": 0
            })
        );
    }

    #[test]
    fn test_corrupt_record_is_replaced() {
        let store = MemoryStore::new();
        write_value(&store, "2024-06-07", &"garbage").unwrap();

        let mut stats = StatsAggregator::new();
        stats.record_frame(true);
        stats.flush(&store, day(7)).unwrap();
        assert_eq!(read_daily_stats(&store, day(7)).unwrap().unwrap().bad_frames, 1);
    }
}
