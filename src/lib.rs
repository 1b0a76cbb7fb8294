//! # MLFQ Scheduler
//!
//! A user-space multilevel feedback queue scheduler with cooperative
//! preemption.
//!
//! A single controller thread decides, at a fixed tick granularity, which
//! of many registered execution units runs next. New units are admitted to
//! the highest-priority level with the smallest time slice; any unit that
//! keeps running past its budget is demoted to the next level and given a
//! larger slice, and the bottom level round-robins. Because the controller
//! re-scans from the top level on every tick, a freshly registered unit
//! preempts a long-running one at the next tick boundary without any
//! explicit signaling.
//!
//! ## Cooperative preemption
//!
//! Forcibly suspending a foreign thread is unsound on modern runtimes, so
//! scheduled units are cooperative: the controller only ever *signals*
//! pause and resume. The bundled [`core::CooperativeUnit`] runs an
//! arbitrary closure on a dedicated thread and parks it at
//! [`core::UnitGate::checkpoint`] calls while a pause signal is raised.
//! Any other execution primitive can participate by implementing
//! [`core::ExecutableUnit`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mlfq_scheduler::builders::{build_scheduler, spawn_controller};
//! use mlfq_scheduler::config::SchedulerConfig;
//! use mlfq_scheduler::core::CooperativeUnit;
//!
//! # fn main() -> Result<(), mlfq_scheduler::core::SchedulerError> {
//! let scheduler = build_scheduler(
//!     &SchedulerConfig::new().with_quantum_ms(100).with_max_units(64),
//! )?;
//! let controller = spawn_controller(&scheduler)?;
//!
//! let sched = Arc::clone(&scheduler);
//! scheduler.register(Arc::new(CooperativeUnit::new(move |gate| {
//!     for _ in 0..1000 {
//!         gate.checkpoint(); // safe preemption point
//!         // ... one slice of work ...
//!     }
//!     sched.request_termination();
//! })))?;
//!
//! // ... later ...
//! controller.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! Admission is bounded by a fixed-capacity identifier pool
//! (`max_units`); [`core::FeedbackScheduler::register`] fails once every
//! identifier is allocated and succeeds again after a terminated unit is
//! reaped. Termination is lazy: a unit marks itself terminated and keeps
//! its queue slot until the controller's loop visits it.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling engine and unit capability.
pub mod core;
/// Configuration models for the scheduler.
pub mod config;
/// Builders for schedulers and controller threads.
pub mod builders;
/// Shared utilities.
pub mod util;
