// executor crate

pub mod engine;
pub mod scheduler;
pub mod store;

// Re-export public items
pub use engine::{ExecutionError, ExecutorConfig, SubmissionExecutor};
pub use scheduler::{ExecutionScheduler, ExecutionSlot, SchedulerError};
pub use store::SubmissionStore;
