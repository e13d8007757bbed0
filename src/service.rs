// MonitorService - async event loop around a MonitorSession
//
// One task, three sources, no overlapping work:
//
//   sampling tick (tick_interval)  → session.tick()
//   flush tick (flush_interval)    → session.flush_stats()
//   control channel                → session.handle_action()
//
// Restart backoff is handled by the supervisor's own schedule, checked on
// every sampling tick. The loop ends when the shutdown future resolves or
// every control sender is dropped; the session is then shut down and
// handed back.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::{ErrorCode, SessionError};
use crate::protocol::ControlAction;
use crate::session::MonitorSession;
use crate::telemetry;

pub struct MonitorService {
    session: MonitorSession,
    control: mpsc::Receiver<ControlAction>,
}

impl MonitorService {
    pub fn new(session: MonitorSession, control: mpsc::Receiver<ControlAction>) -> Self {
        Self { session, control }
    }

    /// Run until every control sender is dropped
    pub async fn run(self) -> MonitorSession {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until `shutdown` resolves or the control channel closes
    ///
    /// # Returns
    /// The session, already shut down (sampling stopped, stats flushed)
    pub async fn run_until<F>(mut self, shutdown: F) -> MonitorSession
    where
        F: Future<Output = ()>,
    {
        let monitor = self.session.config().monitor.clone();

        let mut sampling = time::interval(monitor.tick_interval());
        sampling.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut flush = time::interval_at(
            Instant::now() + monitor.flush_interval(),
            monitor.flush_interval(),
        );
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        tracing::info!(
            "[MonitorService] Running (tick {} ms, flush {} ms)",
            monitor.tick_interval_ms,
            monitor.flush_interval_ms
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::info!("[MonitorService] Shutdown requested");
                    break;
                }
                action = self.control.recv() => match action {
                    Some(action) => {
                        let name = action.name();
                        if let Err(err) = self.session.handle_action(action) {
                            report(&err, name);
                        }
                    }
                    None => {
                        tracing::info!("[MonitorService] Control channel closed");
                        break;
                    }
                },
                _ = sampling.tick() => {
                    self.session.tick();
                }
                _ = flush.tick() => {
                    self.session.flush_stats();
                }
            }
        }

        self.session.shutdown();
        self.session
    }
}

/// Build the single-threaded runtime the service is designed for
pub fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
}

fn report(err: &SessionError, action: &str) {
    tracing::warn!(
        "[MonitorService] Action '{}' failed (code {}): {}",
        action,
        err.code(),
        err.message()
    );
    telemetry::hub().record_error(err, action);
}
