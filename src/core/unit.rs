//! Executable unit capability and the cooperative thread-backed adapter.
//!
//! The scheduler never runs unit logic itself; it only toggles lifecycle
//! transitions through [`ExecutableUnit`]. Forcibly suspending a foreign
//! thread is unsound on modern platforms (it can freeze the thread mid
//! mutation), so the bundled [`CooperativeUnit`] implements preemption as a
//! signal: `pause` raises a gate flag and the unit body parks itself at its
//! next [`UnitGate::checkpoint`] until `resume` lowers the flag.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

/// Lifecycle surface of a schedulable execution unit.
///
/// Implementations must tolerate redundant transitions: `start` on a unit
/// that already ran, or `pause`/`resume` on a unit that never started, are
/// no-ops rather than faults. The controller issues these calls from its own
/// thread while the unit body runs elsewhere.
pub trait ExecutableUnit: Send + Sync {
    /// Begin executing the unit body. Called at most once effectively;
    /// repeated calls do nothing.
    fn start(&self);

    /// Signal the unit to stop at its next safe checkpoint.
    fn pause(&self);

    /// Clear a pending pause signal and wake the unit if it is parked.
    fn resume(&self);

    /// Whether the unit body has started and not yet finished.
    fn is_alive(&self) -> bool;

    /// Identity of the execution context running the unit body, if any.
    ///
    /// Returns `None` until the unit has started. This is the hook the
    /// scheduler uses to answer "which control block belongs to the calling
    /// thread".
    fn identity(&self) -> Option<ThreadId>;

    /// Whether the calling thread is the one executing this unit's body.
    fn matches_current(&self) -> bool {
        self.identity() == Some(thread::current().id())
    }
}

/// Shared pause gate state, paired with a condvar for parking.
#[derive(Debug)]
struct GateState {
    /// Pause signal raised by the controller.
    paused: bool,
}

/// Handle passed to a [`CooperativeUnit`] body for yielding at checkpoints.
///
/// The body should call [`UnitGate::checkpoint`] at points where pausing is
/// safe (no invariants mid-update). Between checkpoints the body runs
/// uninterrupted regardless of pause signals.
#[derive(Clone)]
pub struct UnitGate {
    gate: Arc<(Mutex<GateState>, Condvar)>,
}

impl UnitGate {
    /// Park the calling thread while a pause signal is raised.
    ///
    /// Returns immediately when no pause is pending.
    pub fn checkpoint(&self) {
        let (lock, cvar) = &*self.gate;
        let mut state = lock.lock();
        while state.paused {
            cvar.wait(&mut state);
        }
    }

    /// Whether a pause signal is currently raised.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        let (lock, _) = &*self.gate;
        lock.lock().paused
    }
}

/// Counter for naming unit threads.
static UNIT_THREAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// Thread-backed [`ExecutableUnit`] with cooperative preemption.
///
/// The body closure receives a [`UnitGate`] and runs on a dedicated named
/// thread once the controller dispatches it for the first time (lazy start:
/// a registered but never dispatched unit has not begun executing).
pub struct CooperativeUnit {
    /// Body closure, taken exactly once by `start`.
    body: Mutex<Option<Box<dyn FnOnce(UnitGate) + Send + 'static>>>,
    /// Pause gate shared with the running body.
    gate: Arc<(Mutex<GateState>, Condvar)>,
    /// Thread identity, recorded by the body thread before it runs the
    /// closure so self-lookup works from the first body statement.
    thread_id: Arc<Mutex<Option<ThreadId>>>,
    /// Set once `start` has spawned (or failed to spawn) the body thread.
    started: AtomicBool,
    /// Set when the body returns.
    finished: Arc<AtomicBool>,
}

impl CooperativeUnit {
    /// Wrap a body closure into a schedulable unit.
    #[must_use]
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce(UnitGate) + Send + 'static,
    {
        Self {
            body: Mutex::new(Some(Box::new(body))),
            gate: Arc::new((
                Mutex::new(GateState { paused: false }),
                Condvar::new(),
            )),
            thread_id: Arc::new(Mutex::new(None)),
            started: AtomicBool::new(false),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ExecutableUnit for CooperativeUnit {
    fn start(&self) {
        // First caller wins; later dispatches fall through to resume.
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(body) = self.body.lock().take() else {
            self.finished.store(true, Ordering::Release);
            return;
        };

        let seq = UNIT_THREAD_SEQ.fetch_add(1, Ordering::Relaxed);
        let gate = UnitGate {
            gate: Arc::clone(&self.gate),
        };
        let finished = Arc::clone(&self.finished);
        let thread_id = Arc::clone(&self.thread_id);

        let spawned = thread::Builder::new()
            .name(format!("mlfq-unit-{seq}"))
            .spawn(move || {
                *thread_id.lock() = Some(thread::current().id());
                debug!("unit body started");
                body(gate);
                finished.store(true, Ordering::Release);
                debug!("unit body finished");
            });

        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn unit thread");
            self.finished.store(true, Ordering::Release);
        }
    }

    fn pause(&self) {
        let (lock, _) = &*self.gate;
        lock.lock().paused = true;
    }

    fn resume(&self) {
        let (lock, cvar) = &*self.gate;
        let mut state = lock.lock();
        state.paused = false;
        cvar.notify_all();
    }

    fn is_alive(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.finished.load(Ordering::Acquire)
    }

    fn identity(&self) -> Option<ThreadId> {
        *self.thread_id.lock()
    }
}

impl std::fmt::Debug for CooperativeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooperativeUnit")
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("finished", &self.finished.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_unit_not_alive_before_start() {
        let unit = CooperativeUnit::new(|_gate| {});
        assert!(!unit.is_alive());
        assert!(unit.identity().is_none());
        assert!(!unit.matches_current());
    }

    #[test]
    fn test_unit_runs_body_and_finishes() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        let unit = CooperativeUnit::new(move |_gate| {
            ran_clone.store(true, Ordering::Release);
        });

        unit.start();
        // Wait for the detached body thread to finish.
        for _ in 0..100 {
            if !unit.is_alive() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(ran.load(Ordering::Acquire));
        assert!(!unit.is_alive());
        assert!(unit.identity().is_some());
    }

    #[test]
    fn test_pause_parks_body_at_checkpoint() {
        let progress = Arc::new(AtomicUsize::new(0));
        let progress_clone = Arc::clone(&progress);
        let unit = Arc::new(CooperativeUnit::new(move |gate| {
            for _ in 0..1000 {
                gate.checkpoint();
                progress_clone.fetch_add(1, Ordering::Release);
                thread::sleep(Duration::from_millis(1));
            }
        }));

        unit.start();
        thread::sleep(Duration::from_millis(20));
        unit.pause();
        // Let the body reach its checkpoint and park.
        thread::sleep(Duration::from_millis(20));
        let at_pause = progress.load(Ordering::Acquire);
        thread::sleep(Duration::from_millis(40));
        let still_paused = progress.load(Ordering::Acquire);
        // At most one step can slip between the pause signal and the park.
        assert!(still_paused <= at_pause + 1);

        unit.resume();
        thread::sleep(Duration::from_millis(40));
        assert!(progress.load(Ordering::Acquire) > still_paused);
    }

    #[test]
    fn test_repeated_start_is_noop() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        let unit = CooperativeUnit::new(move |_gate| {
            runs_clone.fetch_add(1, Ordering::Release);
        });

        unit.start();
        unit.start();
        unit.start();
        for _ in 0..100 {
            if !unit.is_alive() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(runs.load(Ordering::Acquire), 1);
    }

    #[test]
    fn test_identity_matches_body_thread() {
        let pair = Arc::new((Mutex::new(None::<ThreadId>), Condvar::new()));
        let pair_clone = Arc::clone(&pair);
        let unit = CooperativeUnit::new(move |_gate| {
            let (lock, cvar) = &*pair_clone;
            *lock.lock() = Some(thread::current().id());
            cvar.notify_all();
        });

        unit.start();
        let (lock, cvar) = &*pair;
        let mut seen = lock.lock();
        while seen.is_none() {
            cvar.wait(&mut seen);
        }
        assert_eq!(unit.identity(), *seen);
    }
}
