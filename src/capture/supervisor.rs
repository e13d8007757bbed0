// CaptureSupervisor - sampling loop lifecycle with stall/fault recovery
//
// The supervisor is a synchronous state machine; the async service (or a
// test) calls `tick(now)` once per sampling period. It never runs two loops
// at once: every restart releases the source and closes the previous loop
// before acquiring again, so loop_starts - loop_stops is always 0 or 1.
//
//   Stopped ──start──▶ Running ──paused/stalled──▶ RestartScheduled(short)
//                         │                              │
//                         └──model/source fault──▶ RestartScheduled(long)
//                                                        │
//                  Running ◀──due, acquired, active──────┘

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{CaptureSource, PoseEstimator, RestartCause, SourceStatus};
use crate::config::MonitorConfig;
use crate::error::{log_capture_error, CaptureError, ErrorCode};
use crate::metrics::LandmarkFrame;
use crate::telemetry;

/// Lifecycle state of the sampling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    RestartScheduled { at: Instant, cause: RestartCause },
}

/// Result of one supervisor tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not sampling: stopped, or waiting for a scheduled restart
    Idle,
    /// The model ran but found no pose; prior state is kept
    Gap,
    Landmarks(LandmarkFrame),
    /// The loop came back up this tick; sampling resumes next tick
    Restarted,
    /// The loop stopped this tick and a restart was scheduled
    RestartScheduled { cause: RestartCause, backoff: Duration },
}

pub struct CaptureSupervisor {
    source: Arc<dyn CaptureSource>,
    estimator: Arc<dyn PoseEstimator>,
    stall_backoff: Duration,
    fault_backoff: Duration,
    state: LoopState,
    loop_starts: u64,
    loop_stops: u64,
}

impl CaptureSupervisor {
    pub fn new(
        source: Arc<dyn CaptureSource>,
        estimator: Arc<dyn PoseEstimator>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            source,
            estimator,
            stall_backoff: config.stall_backoff(),
            fault_backoff: config.fault_backoff(),
            state: LoopState::Stopped,
            loop_starts: 0,
            loop_stops: 0,
        }
    }

    /// Start (or restart) sampling
    ///
    /// Any running loop is closed and the source released first. If the
    /// source cannot be acquired a fault restart is scheduled and the error
    /// returned; the supervisor keeps retrying on later ticks.
    pub fn start(&mut self, now: Instant) -> Result<(), CaptureError> {
        self.close_loop();
        self.source.release();

        match self.open_loop() {
            Ok(()) => {
                log::info!("[CaptureSupervisor] Sampling loop started");
                Ok(())
            }
            Err(err) => {
                log_capture_error(&err, "start");
                self.schedule_restart(now, RestartCause::Fault);
                Err(err)
            }
        }
    }

    /// Stop sampling, cancel any scheduled restart and release the source
    pub fn stop(&mut self) {
        let was_active = self.is_active();
        self.close_loop();
        self.state = LoopState::Stopped;
        self.source.release();
        if was_active {
            log::info!("[CaptureSupervisor] Sampling loop stopped");
        }
    }

    /// Advance the supervisor by one sampling period
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        match self.state {
            LoopState::Stopped => TickOutcome::Idle,
            LoopState::RestartScheduled { at, .. } if now < at => TickOutcome::Idle,
            LoopState::RestartScheduled { cause, .. } => self.attempt_restart(now, cause),
            LoopState::Running => self.sample(now),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Whether the supervisor is running or waiting to restart
    pub fn is_active(&self) -> bool {
        self.state != LoopState::Stopped
    }

    /// When the pending restart is due, if one is scheduled
    pub fn next_restart_at(&self) -> Option<Instant> {
        match self.state {
            LoopState::RestartScheduled { at, .. } => Some(at),
            _ => None,
        }
    }

    pub fn loop_starts(&self) -> u64 {
        self.loop_starts
    }

    pub fn loop_stops(&self) -> u64 {
        self.loop_stops
    }

    /// Number of sampling loops currently open (0 or 1)
    pub fn open_loops(&self) -> u64 {
        self.loop_starts - self.loop_stops
    }

    // ========================================================================
    // HELPER METHODS - Loop bookkeeping
    // ========================================================================

    fn sample(&mut self, now: Instant) -> TickOutcome {
        if self.source.status() == SourceStatus::Paused {
            return self.fail(now, CaptureError::Stalled, "sample");
        }

        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(err) => return self.fail(now, err, "next_frame"),
        };

        let started = Instant::now();
        let detection = self.estimator.detect(&frame, now);
        telemetry::hub().record_detection_latency(started.elapsed());

        match detection {
            Ok(Some(landmarks)) if !landmarks.is_empty() => TickOutcome::Landmarks(landmarks),
            Ok(_) => TickOutcome::Gap,
            Err(err) => self.fail(now, err, "detect"),
        }
    }

    fn attempt_restart(&mut self, now: Instant, cause: RestartCause) -> TickOutcome {
        log::info!("[CaptureSupervisor] Restarting after {:?}", cause);
        self.source.release();

        if let Err(err) = self.source.acquire() {
            let err = as_acquire_failure(err);
            log_capture_error(&err, "restart");
            telemetry::hub().record_error(&err, "restart");
            return self.schedule_restart(now, RestartCause::Fault);
        }

        if self.source.status() == SourceStatus::Paused {
            log::debug!("[CaptureSupervisor] Source still paused, waiting");
            return self.schedule_restart(now, RestartCause::Stalled);
        }

        self.loop_starts += 1;
        self.state = LoopState::Running;
        TickOutcome::Restarted
    }

    fn fail(&mut self, now: Instant, err: CaptureError, context: &str) -> TickOutcome {
        let cause = match err {
            CaptureError::Stalled => RestartCause::Stalled,
            _ => RestartCause::Fault,
        };
        if cause == RestartCause::Fault {
            log_capture_error(&err, context);
            telemetry::hub().record_error(&err, context);
        } else {
            log::warn!("[CaptureSupervisor] Capture stalled, scheduling restart");
        }

        self.close_loop();
        self.schedule_restart(now, cause)
    }

    fn schedule_restart(&mut self, now: Instant, cause: RestartCause) -> TickOutcome {
        let backoff = match cause {
            RestartCause::Stalled => self.stall_backoff,
            RestartCause::Fault => self.fault_backoff,
        };
        self.state = LoopState::RestartScheduled {
            at: now + backoff,
            cause,
        };
        telemetry::hub().record_restart(cause, backoff);
        TickOutcome::RestartScheduled { cause, backoff }
    }

    fn open_loop(&mut self) -> Result<(), CaptureError> {
        self.source.acquire().map_err(as_acquire_failure)?;
        self.loop_starts += 1;
        self.state = LoopState::Running;
        Ok(())
    }

    fn close_loop(&mut self) {
        if self.state == LoopState::Running {
            self.loop_stops += 1;
        }
    }
}

fn as_acquire_failure(err: CaptureError) -> CaptureError {
    match err {
        CaptureError::AcquireFailed { .. } => err,
        other => CaptureError::AcquireFailed {
            reason: other.message(),
        },
    }
}

impl Drop for CaptureSupervisor {
    fn drop(&mut self) {
        self.source.release();
    }
}
