//! Construction of schedulers and controller threads from configuration.

mod controller;

pub use controller::{build_scheduler, spawn_controller, ControllerHandle};
