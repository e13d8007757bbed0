// Calibration module - baseline capture and validation
//
// A baseline is a single snapshot of the user's neutral posture. Later
// snapshots are compared against it by the deviation classifier. The
// lifecycle (capture, persistence, invalidation) is owned by
// managers::BaselineManager; this module only defines the value type.

pub mod baseline;

pub use baseline::{Baseline, BASELINE_SCHEMA_VERSION};
