//! Multilevel feedback queue scheduler and its controller loop.
//!
//! One controller thread repeatedly picks the front block of the highest
//! non-empty level, lets its unit run for one tick, then requeues it
//! according to the demotion rule. Registration, termination requests, and
//! self-lookup arrive concurrently from arbitrary threads.
//!
//! # Locking discipline
//!
//! All traversal and mutation of queue contents happens under one coarse
//! `parking_lot::Mutex` over the whole level array: cross-level moves
//! (demotion) must be atomic, and the selection/peek phase runs under the
//! same lock so the controller never observes a block mid-move. The
//! identifier pool and the identity index have their own locks and are
//! never acquired while waiting on the queue lock from a caller context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::core::control_block::ControlBlock;
use crate::core::error::SchedulerError;
use crate::core::id_pool::{IdPool, UnitId};
use crate::core::level_queue::{LevelQueue, LEVEL_COUNT};
use crate::core::unit::ExecutableUnit;

/// How long an idle controller parks before re-checking the shutdown flag.
const IDLE_RECHECK: Duration = Duration::from_millis(100);

/// Outcome of one controller decision, mainly for tests and tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every level was empty; no unit ran and no tick elapsed.
    Idle,
    /// A terminated block was removed and its identifier released.
    /// No tick elapsed.
    Reaped(UnitId),
    /// The front unit ran for one tick and kept its position.
    Continued(UnitId),
    /// The front unit exhausted its budget and moved down one level.
    Demoted {
        /// Identifier of the demoted unit.
        id: UnitId,
        /// Level the unit occupied this tick.
        from: usize,
        /// Level the unit was appended to.
        to: usize,
    },
    /// The front unit of the bottom level exhausted its budget and was
    /// re-appended to the same level (round robin).
    Rotated(UnitId),
}

/// Snapshot of scheduler occupancy and lifetime counters.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Queued blocks per level, index 0 = highest priority.
    pub level_depths: [usize; LEVEL_COUNT],
    /// Total queued blocks across all levels.
    pub queued_units: usize,
    /// Identifiers currently allocated.
    pub allocated_ids: usize,
    /// Total dispatch decisions (resume or start).
    pub dispatches: u64,
    /// Total demotions to a lower level.
    pub demotions: u64,
    /// Total bottom-level round-robin rotations.
    pub rotations: u64,
    /// Total terminated blocks reaped.
    pub reaps: u64,
}

/// Lifetime counters updated by the controller (lock-free atomics).
#[derive(Debug, Default)]
struct SchedulerCounters {
    dispatches: AtomicU64,
    demotions: AtomicU64,
    rotations: AtomicU64,
    reaps: AtomicU64,
}

/// Multilevel feedback queue scheduler.
///
/// New units enter the highest-priority level with the smallest time slice;
/// units that keep running past their budget sink to larger-slice levels,
/// and the bottom level round-robins. A non-empty higher level always wins
/// the next dispatch, so freshly registered units preempt long-running ones
/// at the next tick boundary without any explicit signaling.
pub struct FeedbackScheduler {
    /// Controller sleep per decision: half the configured quantum, giving
    /// finer-grained preemption checks than the nominal slice.
    tick_len: Duration,
    /// The level array. One coarse lock covers every level.
    levels: Mutex<Vec<LevelQueue>>,
    /// Signaled on registration so an idle controller wakes promptly.
    work_available: Condvar,
    /// Identifier allocator.
    id_pool: Mutex<IdPool>,
    /// Thread identity to control block, for O(1) self-lookup. Populated
    /// when a unit first starts; the exhaustive scan remains the fallback.
    identity_index: RwLock<HashMap<ThreadId, Arc<ControlBlock>>>,
    /// Lifetime counters.
    counters: SchedulerCounters,
    /// Raised to stop the controller loop.
    shutdown: AtomicBool,
}

impl FeedbackScheduler {
    /// Create a scheduler from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if the configuration is
    /// rejected by [`SchedulerConfig::validate`].
    pub fn new(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let levels = (0..LEVEL_COUNT).map(LevelQueue::new).collect();
        let scheduler = Self {
            tick_len: Duration::from_millis(config.quantum_ms / 2),
            levels: Mutex::new(levels),
            work_available: Condvar::new(),
            id_pool: Mutex::new(IdPool::new(config.max_units)),
            identity_index: RwLock::new(HashMap::new()),
            counters: SchedulerCounters::default(),
            shutdown: AtomicBool::new(false),
        };

        info!(
            quantum_ms = config.quantum_ms,
            max_units = config.max_units,
            levels = LEVEL_COUNT,
            "feedback scheduler initialized"
        );
        Ok(scheduler)
    }

    /// Register a unit for scheduling.
    ///
    /// The caller's own control block, if it has one, supplies the parent
    /// identifier. The new block enters the tail of level 0 and will be
    /// started lazily at its first dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Exhausted`] when no identifier is free.
    /// This is the only admission-control mechanism; callers are expected
    /// to back off or surface the rejection.
    pub fn register(
        &self,
        unit: Arc<dyn ExecutableUnit>,
    ) -> Result<Arc<ControlBlock>, SchedulerError> {
        let parent_id = self.find_own().map(|block| block.id());

        let Some(id) = self.id_pool.lock().allocate() else {
            warn!("registration rejected: identifier pool exhausted");
            return Err(SchedulerError::Exhausted(self.capacity()));
        };

        let block = Arc::new(ControlBlock::new(id, parent_id, unit));
        {
            let mut levels = self.levels.lock();
            levels[0].push_back(Arc::clone(&block));
        }
        self.work_available.notify_one();

        debug!(id, ?parent_id, "unit registered at level 0");
        Ok(block)
    }

    /// Mark the caller's own unit terminated.
    ///
    /// Removal is lazy: the block keeps its queue slot and identifier until
    /// the controller finds it at the front of its level. Returns `false`
    /// when the calling thread has no control block.
    pub fn request_termination(&self) -> bool {
        self.find_own().map_or(false, |block| {
            debug!(id = block.id(), "termination requested");
            block.set_terminated();
            true
        })
    }

    /// Find the control block belonging to the calling thread.
    ///
    /// Takes the O(1) identity-index path when the caller's unit has
    /// already started, falling back to the exhaustive scan otherwise.
    #[must_use]
    pub fn find_own(&self) -> Option<Arc<ControlBlock>> {
        let caller = thread::current().id();
        if let Some(block) = self.identity_index.read().get(&caller) {
            return Some(Arc::clone(block));
        }
        self.find_own_scan()
    }

    /// Find the caller's control block by scanning every level under the
    /// queue lock, highest priority first, front-to-back.
    ///
    /// O(total scheduled units). [`FeedbackScheduler::find_own`] is the
    /// usual entry point; the scan exists as the ground-truth lookup and
    /// for verification against the index.
    #[must_use]
    pub fn find_own_scan(&self) -> Option<Arc<ControlBlock>> {
        let levels = self.levels.lock();
        for level in levels.iter() {
            for block in level.iter() {
                if block.unit().matches_current() {
                    return Some(Arc::clone(block));
                }
            }
        }
        None
    }

    /// Maximum number of simultaneously registered units.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.id_pool.lock().capacity()
    }

    /// Controller sleep per scheduling decision.
    #[must_use]
    pub fn tick_len(&self) -> Duration {
        self.tick_len
    }

    /// Snapshot current occupancy and counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = SchedulerStats {
            allocated_ids: self.id_pool.lock().allocated(),
            dispatches: self.counters.dispatches.load(Ordering::Relaxed),
            demotions: self.counters.demotions.load(Ordering::Relaxed),
            rotations: self.counters.rotations.load(Ordering::Relaxed),
            reaps: self.counters.reaps.load(Ordering::Relaxed),
            ..SchedulerStats::default()
        };
        let levels = self.levels.lock();
        for (i, level) in levels.iter().enumerate() {
            stats.level_depths[i] = level.len();
            stats.queued_units += level.len();
        }
        stats
    }

    /// Execute one controller decision.
    ///
    /// Selects the highest non-empty level, reaps a terminated front block
    /// (consuming no tick), or dispatches the front unit for one tick and
    /// applies the demotion rule on wake. [`FeedbackScheduler::run`] calls
    /// this in a loop; tests drive it directly for deterministic stepping.
    pub fn tick(&self) -> TickOutcome {
        // Steps 1-3: select, peek, and possibly reap under the queue lock.
        let (level_idx, block) = {
            let mut levels = self.levels.lock();
            let Some(idx) = levels.iter().position(|level| !level.is_empty()) else {
                return TickOutcome::Idle;
            };
            let Some(front) = levels[idx].front().map(Arc::clone) else {
                // Cannot happen for a non-empty level; abandon the
                // iteration rather than fault the controller.
                return TickOutcome::Idle;
            };

            if front.is_terminated() {
                levels[idx].pop_front();
                self.reap(&front);
                return TickOutcome::Reaped(front.id());
            }
            (idx, front)
        };

        // Step 4: dispatch. Lazy start: a block that was never dispatched
        // has not begun executing.
        let unit = block.unit();
        if unit.is_alive() {
            unit.resume();
        } else {
            unit.start();
        }
        self.counters.dispatches.fetch_add(1, Ordering::Relaxed);
        if let Some(tid) = unit.identity() {
            self.identity_index
                .write()
                .entry(tid)
                .or_insert_with(|| Arc::clone(&block));
        }

        // Step 5: the unit runs exclusively while the controller sleeps.
        thread::sleep(self.tick_len);

        // Step 6: preempt and requeue under the queue lock.
        let mut levels = self.levels.lock();
        if block.unit().is_alive() {
            block.unit().pause();
        }

        if levels[level_idx].budget_exhausted() {
            let Some(occupant) = levels[level_idx].pop_front() else {
                return TickOutcome::Idle;
            };
            let id = occupant.id();
            if level_idx == LEVEL_COUNT - 1 {
                // Bottom level round-robins within itself.
                levels[level_idx].push_back(occupant);
                self.counters.rotations.fetch_add(1, Ordering::Relaxed);
                debug!(id, level = level_idx, "rotated at bottom level");
                TickOutcome::Rotated(id)
            } else {
                levels[level_idx + 1].push_back(occupant);
                self.counters.demotions.fetch_add(1, Ordering::Relaxed);
                debug!(id, from = level_idx, to = level_idx + 1, "demoted");
                TickOutcome::Demoted {
                    id,
                    from: level_idx,
                    to: level_idx + 1,
                }
            }
        } else {
            levels[level_idx].consume_tick();
            TickOutcome::Continued(block.id())
        }
    }

    /// Run the controller loop until shutdown is requested.
    ///
    /// When every level is empty the controller parks on the registration
    /// condvar instead of spinning, waking promptly when work appears.
    pub fn run(&self) {
        info!("controller loop started");
        while !self.shutdown.load(Ordering::Acquire) {
            if self.tick() == TickOutcome::Idle {
                let mut levels = self.levels.lock();
                if levels.iter().all(LevelQueue::is_empty)
                    && !self.shutdown.load(Ordering::Acquire)
                {
                    // Bounded wait so a shutdown without registrations is
                    // still noticed.
                    let _ = self.work_available.wait_for(&mut levels, IDLE_RECHECK);
                }
            }
        }
        info!("controller loop exited");
    }

    /// Raise the shutdown flag and wake an idle controller.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.work_available.notify_all();
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Release a reaped block's identifier and drop it from the index.
    fn reap(&self, block: &Arc<ControlBlock>) {
        let released = self.id_pool.lock().release(block.id());
        if let Some(tid) = block.unit().identity() {
            self.identity_index.write().remove(&tid);
        }
        self.counters.reaps.fetch_add(1, Ordering::Relaxed);
        debug!(id = block.id(), released, "reaped terminated unit");
    }
}

impl std::fmt::Debug for FeedbackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackScheduler")
            .field("tick_len", &self.tick_len)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
