//! Controller thread lifecycle: spawn, shutdown, join with timeout.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::core::{FeedbackScheduler, SchedulerError};

/// How long `shutdown` waits for the controller thread before detaching it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Build a scheduler from configuration.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidConfig`] when validation fails.
pub fn build_scheduler(config: &SchedulerConfig) -> Result<Arc<FeedbackScheduler>, SchedulerError> {
    FeedbackScheduler::new(config).map(Arc::new)
}

/// Handle to a running controller thread.
///
/// Dropping the handle without calling [`ControllerHandle::shutdown`]
/// raises the shutdown flag but detaches the thread instead of joining it.
pub struct ControllerHandle {
    scheduler: Arc<FeedbackScheduler>,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// Spawn a dedicated controller thread running the scheduler loop.
///
/// # Errors
///
/// Returns [`SchedulerError::ControllerUnavailable`] if the thread cannot
/// be spawned.
pub fn spawn_controller(
    scheduler: &Arc<FeedbackScheduler>,
) -> Result<ControllerHandle, SchedulerError> {
    let runner = Arc::clone(scheduler);
    let join = thread::Builder::new()
        .name("mlfq-controller".into())
        .spawn(move || runner.run())
        .map_err(|e| SchedulerError::ControllerUnavailable(e.to_string()))?;

    info!("controller thread spawned");
    Ok(ControllerHandle {
        scheduler: Arc::clone(scheduler),
        join: Mutex::new(Some(join)),
    })
}

impl ControllerHandle {
    /// The scheduler this controller drives.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<FeedbackScheduler> {
        &self.scheduler
    }

    /// Request shutdown and join the controller thread with a timeout.
    ///
    /// A controller that does not exit within the timeout is detached so
    /// the caller never hangs.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ControllerUnavailable`] if the controller
    /// panicked or did not exit in time.
    pub fn shutdown(&self) -> Result<(), SchedulerError> {
        self.scheduler.request_shutdown();

        let Some(join) = self.join.lock().take() else {
            return Ok(());
        };

        // Join via a helper thread so the wait can be bounded.
        let (tx, rx) = crossbeam_channel::bounded(1);
        let waiter = thread::spawn(move || {
            let clean = join.join().is_ok();
            let _ = tx.send(clean);
        });

        match rx.recv_timeout(JOIN_TIMEOUT) {
            Ok(true) => {
                let _ = waiter.join();
                debug!("controller joined cleanly");
                Ok(())
            }
            Ok(false) => {
                let _ = waiter.join();
                warn!("controller thread panicked");
                Err(SchedulerError::ControllerUnavailable(
                    "controller thread panicked".into(),
                ))
            }
            Err(_) => {
                warn!("controller did not exit within timeout, detaching");
                Err(SchedulerError::ControllerUnavailable(
                    "controller did not exit within timeout".into(),
                ))
            }
        }
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        if self.join.lock().is_some() {
            self.scheduler.request_shutdown();
            debug!("controller handle dropped without shutdown, thread detached");
        }
    }
}

impl std::fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("running", &self.join.lock().is_some())
            .finish_non_exhaustive()
    }
}
