// DebounceMachine - one alert per sustained bad-posture episode
//
// State transitions:
//
//   Good     --bad-->  Pending(started_at, reason)
//   Pending  --good--> Good                      (episode cancelled)
//   Pending  --bad-->  Pending, or Alerted once now - started_at >= threshold
//   Alerted  --good--> Good                      (episode over)
//   Alerted  --bad-->  Alerted                   (no repeat)
//
// started_at is fixed for the life of an episode; reason follows the most
// recent deviating metric so the alert names the current problem.

use std::time::{Duration, Instant};

use super::classifier::Classification;
use crate::metrics::MetricName;

/// Posture episode state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureState {
    Good,
    Pending {
        started_at: Instant,
        reason: Option<MetricName>,
    },
    Alerted {
        started_at: Instant,
        reason: Option<MetricName>,
    },
}

/// Alert emitted when an episode crosses the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostureAlert {
    pub reason: Option<MetricName>,
    pub started_at: Instant,
    /// How long the episode had lasted when the alert fired
    pub sustained: Duration,
}

pub struct DebounceMachine {
    state: PostureState,
    threshold: Duration,
}

impl DebounceMachine {
    pub fn new(threshold: Duration) -> Self {
        Self {
            state: PostureState::Good,
            threshold,
        }
    }

    pub fn state(&self) -> PostureState {
        self.state
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Feed one classification observed at `now`
    ///
    /// # Returns
    /// `Some(alert)` exactly once per episode, on the first bad frame at or
    /// past the threshold.
    pub fn observe(&mut self, classification: &Classification, now: Instant) -> Option<PostureAlert> {
        if !classification.is_bad {
            if self.state != PostureState::Good {
                log::debug!("[Debounce] Posture recovered, episode closed");
            }
            self.state = PostureState::Good;
            return None;
        }

        let reason = classification.reason;
        match self.state {
            PostureState::Good => {
                log::debug!("[Debounce] Bad posture started ({:?})", reason);
                self.state = PostureState::Pending {
                    started_at: now,
                    reason,
                };
                self.check_threshold(now)
            }
            PostureState::Pending { started_at, .. } => {
                self.state = PostureState::Pending { started_at, reason };
                self.check_threshold(now)
            }
            PostureState::Alerted { started_at, .. } => {
                self.state = PostureState::Alerted { started_at, reason };
                None
            }
        }
    }

    /// Force the machine back to `Good`, dropping any pending episode
    pub fn reset(&mut self) {
        self.state = PostureState::Good;
    }

    fn check_threshold(&mut self, now: Instant) -> Option<PostureAlert> {
        let PostureState::Pending { started_at, reason } = self.state else {
            return None;
        };

        let sustained = now.saturating_duration_since(started_at);
        if sustained < self.threshold {
            return None;
        }

        log::info!(
            "[Debounce] Alert after {} ms of bad posture ({:?})",
            sustained.as_millis(),
            reason
        );
        self.state = PostureState::Alerted { started_at, reason };
        Some(PostureAlert {
            reason,
            started_at,
            sustained,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);
    const THRESHOLD: Duration = Duration::from_millis(3000);

    fn bad() -> Classification {
        Classification::bad(MetricName::NeckAngle)
    }

    /// Feed `count` ticks starting at `start`, returning alerts and the next tick time
    fn run(
        machine: &mut DebounceMachine,
        classification: Classification,
        start: Instant,
        count: u32,
    ) -> (Vec<PostureAlert>, Instant) {
        let mut alerts = Vec::new();
        let mut now = start;
        for _ in 0..count {
            alerts.extend(machine.observe(&classification, now));
            now += TICK;
        }
        (alerts, now)
    }

    #[test]
    fn test_alert_fires_at_threshold_boundary() {
        let mut machine = DebounceMachine::new(THRESHOLD);
        let t0 = Instant::now();

        // ticks 0..=29 cover 0..2900 ms
        for tick in 0..30u32 {
            let alert = machine.observe(&bad(), t0 + TICK * tick);
            assert!(alert.is_none(), "early alert at tick {}", tick);
        }

        let alert = machine.observe(&bad(), t0 + TICK * 30);
        let alert = alert.expect("alert at 3000 ms");
        assert_eq!(alert.sustained, THRESHOLD);
        assert_eq!(alert.started_at, t0);
        assert!(matches!(machine.state(), PostureState::Alerted { .. }));
    }

    #[test]
    fn test_one_alert_per_episode() {
        let mut machine = DebounceMachine::new(THRESHOLD);
        let (alerts, _) = run(&mut machine, bad(), Instant::now(), 100);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_good_frame_starts_fresh_episode() {
        let mut machine = DebounceMachine::new(THRESHOLD);
        let (first, now) = run(&mut machine, bad(), Instant::now(), 35);
        let (_, now) = run(&mut machine, Classification::good(), now, 1);
        let (second, _) = run(&mut machine, bad(), now, 35);

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_short_episode_is_cancelled() {
        let mut machine = DebounceMachine::new(THRESHOLD);
        let (alerts, now) = run(&mut machine, bad(), Instant::now(), 20);
        assert!(alerts.is_empty());

        machine.observe(&Classification::good(), now);
        assert_eq!(machine.state(), PostureState::Good);

        let (alerts, _) = run(&mut machine, bad(), now + TICK, 20);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_reason_tracks_latest_metric_but_start_is_fixed() {
        let mut machine = DebounceMachine::new(THRESHOLD);
        let t0 = Instant::now();
        machine.observe(&bad(), t0);
        machine.observe(&Classification::bad(MetricName::ShoulderTilt), t0 + TICK);

        match machine.state() {
            PostureState::Pending { started_at, reason } => {
                assert_eq!(started_at, t0);
                assert_eq!(reason, Some(MetricName::ShoulderTilt));
            }
            other => panic!("unexpected state {:?}", other),
        }

        let alert = machine
            .observe(&Classification::bad(MetricName::ShoulderTilt), t0 + THRESHOLD)
            .unwrap();
        assert_eq!(alert.reason, Some(MetricName::ShoulderTilt));
    }

    #[test]
    fn test_reset_returns_to_good() {
        let mut machine = DebounceMachine::new(THRESHOLD);
        let (_, now) = run(&mut machine, bad(), Instant::now(), 40);
        machine.reset();
        assert_eq!(machine.state(), PostureState::Good);

        // A new episode after reset needs the full threshold again
        let (alerts, _) = run(&mut machine, bad(), now, 30);
        assert!(alerts.is_empty());
    }
}
