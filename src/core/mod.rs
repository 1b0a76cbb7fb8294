//! Core scheduling engine: identifier pool, control blocks, level queues,
//! the feedback scheduler, and the executable-unit capability.

pub mod control_block;
pub mod error;
pub mod id_pool;
pub mod level_queue;
pub mod scheduler;
pub mod unit;

pub use control_block::ControlBlock;
pub use error::{AppResult, SchedulerError};
pub use id_pool::{IdPool, UnitId};
pub use level_queue::{base_ticks, LevelQueue, LEVEL_COUNT};
pub use scheduler::{FeedbackScheduler, SchedulerStats, TickOutcome};
pub use unit::{CooperativeUnit, ExecutableUnit, UnitGate};
