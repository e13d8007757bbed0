// Posture Monitor Core
// Landmark metrics, baseline deviation and debounced posture alerts

// Module declarations
pub mod analysis;
pub mod calibration;
pub mod capture;
pub mod config;
pub mod error;
pub mod managers;
pub mod metrics;
pub mod notify;
pub mod protocol;
pub mod service;
pub mod session;
pub mod stats;
pub mod storage;
pub mod telemetry;

// Re-exports for convenience
pub use config::AppConfig;
pub use protocol::{ControlAction, CoreEvent};
pub use service::MonitorService;
pub use session::{MonitorSession, SessionPorts};

/// Install the fmt subscriber for `log` and `tracing` output
///
/// Records at INFO and above go to stderr; `log` records are bridged.
/// Calling it again after a subscriber is installed does nothing.
pub fn init_logging() {
    if tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        log::debug!("Logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
    }
}
