//! Configuration models for the scheduler.

pub mod scheduler;

pub use scheduler::{SchedulerConfig, DEFAULT_MAX_UNITS, DEFAULT_QUANTUM_MS};
