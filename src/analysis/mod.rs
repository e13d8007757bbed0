// Analysis module - posture decision pipeline
//
// Pipeline per detected frame:
//   MetricsSnapshot → DeviationClassifier (Baseline + SensitivityLevel)
//                   → DebounceMachine → optional PostureAlert
//
// The classifier is stateless; all episode state lives in the debounce
// machine, which is driven by the caller's clock.

pub mod classifier;
pub mod debounce;
pub mod sensitivity;

pub use classifier::{
    CalibrationStatus, Classification, ClassificationOutcome, DeviationClassifier, Polarity,
};
pub use debounce::{DebounceMachine, PostureAlert, PostureState};
pub use sensitivity::{SensitivityLevel, ThresholdPair};
