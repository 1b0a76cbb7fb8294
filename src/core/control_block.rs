//! Control block: the scheduler's record of one registered unit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::id_pool::UnitId;
use super::unit::ExecutableUnit;

/// Per-unit scheduling record binding identity, lineage, and lifecycle.
///
/// Exactly one control block exists per registered unit. The level queue
/// holding the block owns its scheduling position until the block is either
/// demoted (moved to the next level) or reaped after termination, at which
/// point the identifier returns to the pool.
pub struct ControlBlock {
    /// Identifier allocated from the scheduler's pool.
    id: UnitId,
    /// Identifier of the registering unit, or `None` when the registrant is
    /// not itself a scheduled unit.
    parent_id: Option<UnitId>,
    /// The bound execution unit.
    unit: Arc<dyn ExecutableUnit>,
    /// Self-reported termination flag, set once and observed by the
    /// controller for lazy reaping.
    terminated: AtomicBool,
}

impl ControlBlock {
    /// Bind a unit to an allocated identifier.
    #[must_use]
    pub fn new(id: UnitId, parent_id: Option<UnitId>, unit: Arc<dyn ExecutableUnit>) -> Self {
        Self {
            id,
            parent_id,
            unit,
            terminated: AtomicBool::new(false),
        }
    }

    /// Identifier of this block's unit.
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Identifier of the registering unit, if it was itself scheduled.
    #[must_use]
    pub fn parent_id(&self) -> Option<UnitId> {
        self.parent_id
    }

    /// The bound execution unit.
    #[must_use]
    pub fn unit(&self) -> &Arc<dyn ExecutableUnit> {
        &self.unit
    }

    /// Mark the unit terminated. Removal is lazy: the block stays queued
    /// until the controller finds it at the front of its level.
    pub fn set_terminated(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    /// Whether termination has been requested.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ControlBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlBlock")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}
