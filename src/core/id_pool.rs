//! Fixed-capacity identifier pool for naming scheduled units.
//!
//! Identifiers are small integers handed out from a fixed slot array. A
//! rotating cursor amortizes the search for a free slot so consecutive
//! allocations do not rescan the low indices every time.

use tracing::warn;

/// Identifier assigned to a registered unit. Indexes a pool slot.
pub type UnitId = usize;

/// Fixed-size allocator of unit identifiers.
///
/// Each slot is either free or allocated. An identifier is held by at most
/// one live control block at a time; it only becomes reusable after the
/// controller reaps that block and releases the slot.
#[derive(Debug)]
pub struct IdPool {
    /// Slot states; `true` means allocated.
    slots: Vec<bool>,
    /// Rotating cursor: the next circular scan starts here.
    next_free: usize,
}

impl IdPool {
    /// Create a pool with `capacity` free slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![false; capacity],
            next_free: 0,
        }
    }

    /// Allocate the first free identifier found by a circular scan from the
    /// cursor. Returns `None` when every slot is allocated.
    ///
    /// O(capacity) worst case.
    pub fn allocate(&mut self) -> Option<UnitId> {
        let capacity = self.slots.len();
        for offset in 0..capacity {
            let tentative = (self.next_free + offset) % capacity;
            if !self.slots[tentative] {
                self.slots[tentative] = true;
                self.next_free = (tentative + 1) % capacity;
                return Some(tentative);
            }
        }
        warn!(capacity, "identifier pool exhausted");
        None
    }

    /// Release an identifier back to the pool.
    ///
    /// Returns `true` only if `id` is in range and currently allocated.
    /// A double free or out-of-range id is a reported no-op.
    pub fn release(&mut self, id: UnitId) -> bool {
        if id < self.slots.len() && self.slots[id] {
            self.slots[id] = false;
            true
        } else {
            warn!(id, "release of free or out-of-range identifier ignored");
            false
        }
    }

    /// Total number of slots, free or allocated.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of currently allocated identifiers.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.slots.iter().filter(|s| **s).count()
    }
}
