//! One priority level of the feedback queue.

use std::collections::VecDeque;
use std::sync::Arc;

use super::control_block::ControlBlock;

/// Number of priority levels. Index 0 is the highest priority; new units
/// are admitted there and demoted downward as they exhaust their budgets.
pub const LEVEL_COUNT: usize = 3;

/// Tick budget a level grants its front occupant before requeuing: `2^i - 1`.
#[must_use]
pub fn base_ticks(level: usize) -> u32 {
    (1u32 << level) - 1
}

/// A single priority level: FIFO of control blocks plus the tick budget
/// remaining for the current front occupant.
#[derive(Debug)]
pub struct LevelQueue {
    /// Queued blocks, front is next to dispatch.
    blocks: VecDeque<Arc<ControlBlock>>,
    /// Ticks left for the current front occupant before it must be requeued.
    /// Reset to [`base_ticks`] whenever the front changes hands.
    remaining_ticks: u32,
    /// Base budget for this level.
    base: u32,
}

impl LevelQueue {
    /// Create an empty level with the budget for index `level`.
    #[must_use]
    pub fn new(level: usize) -> Self {
        let base = base_ticks(level);
        Self {
            blocks: VecDeque::new(),
            remaining_ticks: base,
            base,
        }
    }

    /// Append a block at the tail.
    pub fn push_back(&mut self, block: Arc<ControlBlock>) {
        self.blocks.push_back(block);
    }

    /// The block next in line, if any.
    #[must_use]
    pub fn front(&self) -> Option<&Arc<ControlBlock>> {
        self.blocks.front()
    }

    /// Remove and return the front block, resetting the budget for the
    /// next occupant.
    pub fn pop_front(&mut self) -> Option<Arc<ControlBlock>> {
        self.remaining_ticks = self.base;
        self.blocks.pop_front()
    }

    /// Whether the front occupant has exhausted its budget at this level.
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        self.remaining_ticks < 1
    }

    /// Consume one tick of the front occupant's budget.
    pub fn consume_tick(&mut self) {
        self.remaining_ticks = self.remaining_ticks.saturating_sub(1);
    }

    /// Ticks left for the current front occupant.
    #[must_use]
    pub fn remaining_ticks(&self) -> u32 {
        self.remaining_ticks
    }

    /// Number of queued blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the level holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate the queued blocks front-to-back.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ControlBlock>> {
        self.blocks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::unit::{CooperativeUnit, ExecutableUnit};

    fn block(id: usize) -> Arc<ControlBlock> {
        let unit: Arc<dyn ExecutableUnit> = Arc::new(CooperativeUnit::new(|_| {}));
        Arc::new(ControlBlock::new(id, None, unit))
    }

    #[test]
    fn test_base_budgets_per_level() {
        assert_eq!(base_ticks(0), 0);
        assert_eq!(base_ticks(1), 1);
        assert_eq!(base_ticks(2), 3);
    }

    #[test]
    fn test_level_zero_budget_exhausts_immediately() {
        let level = LevelQueue::new(0);
        assert!(level.budget_exhausted());
    }

    #[test]
    fn test_fifo_order() {
        let mut level = LevelQueue::new(1);
        level.push_back(block(0));
        level.push_back(block(1));
        assert_eq!(level.len(), 2);
        assert_eq!(level.front().map(|b| b.id()), Some(0));
        assert_eq!(level.pop_front().map(|b| b.id()), Some(0));
        assert_eq!(level.pop_front().map(|b| b.id()), Some(1));
        assert!(level.is_empty());
    }

    #[test]
    fn test_budget_consumption_and_reset_on_pop() {
        let mut level = LevelQueue::new(2);
        level.push_back(block(0));
        assert_eq!(level.remaining_ticks(), 3);
        level.consume_tick();
        level.consume_tick();
        level.consume_tick();
        assert!(level.budget_exhausted());
        // Pop resets the budget for the next occupant.
        level.pop_front();
        assert_eq!(level.remaining_ticks(), 3);
    }
}
