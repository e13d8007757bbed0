// Managers Module
//
// Each manager handles one specific concern:
// - BaselineManager: baseline capture, persistence and invalidation
// - MessageBus: control/event channels between controller and core

pub mod baseline_manager;
pub mod message_bus;

pub use baseline_manager::BaselineManager;
pub use message_bus::MessageBus;
