//! Changeset - Structural Change Log for LiveGrid
//!
//! Row insertions and removals shift every display index after them. Rather
//! than making every consumer of display indices (range selections, host
//! caches) rebuild from scratch, the grid records what moved and consumers
//! adjust their stored indices incrementally.
//!
//! # Change Types
//!
//! - `RowsInserted`: a block of rows appeared at a display index
//! - `RowsRemoved`: a block of rows was spliced out at a display index
//! - `OrderRebuilt`: sort, group or ingest rewrote the whole order; stored
//!   indices cannot be carried over
//!
//! # Usage Pattern
//!
//! 1. Grid operations push `GridChange` records
//! 2. Index holders inside the grid follow each record through
//!    `IndexedState::apply_changes()`
//! 3. Hosts drain the log with `Grid::take_changes()`

/// A single structural change to the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridChange {
    /// `count` rows were inserted starting at `index`.
    RowsInserted { index: usize, count: usize },

    /// `count` rows starting at `index` were removed.
    RowsRemoved { index: usize, count: usize },

    /// The whole display order was rebuilt.
    OrderRebuilt,
}

/// Pending changes since the last drain
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    changes: Vec<GridChange>,
    /// Generation counter - incremented each time the log is drained
    generation: u64,
}

impl Changeset {
    pub fn new() -> Self {
        Changeset {
            changes: Vec::new(),
            generation: 0,
        }
    }

    pub fn push(&mut self, change: GridChange) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[GridChange] {
        &self.changes
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Drain changes, returning ownership and clearing the buffer
    pub fn drain(&mut self) -> Vec<GridChange> {
        self.generation += 1;
        std::mem::take(&mut self.changes)
    }
}

/// Anything that stores display indices and can follow structural changes.
pub trait IndexedState {
    /// Shift stored indices through `changes`.
    /// Returns true if any stored index moved or was dropped.
    fn apply_changes(&mut self, changes: &[GridChange]) -> bool;
}

/// Helper to adjust stored display indices after block inserts and removals.
///
/// Inserting `count` rows at I moves every index >= I up by `count`.
/// Removing `count` rows at I drops indices in `I..I+count` and moves every
/// later index down by `count`.
pub struct IndexAdjuster;

impl IndexAdjuster {
    pub fn adjust_for_insert(index: usize, insert_index: usize, count: usize) -> usize {
        if index >= insert_index {
            index + count
        } else {
            index
        }
    }

    /// Returns None if the index was inside the removed block
    pub fn adjust_for_delete(index: usize, delete_index: usize, count: usize) -> Option<usize> {
        if index < delete_index {
            Some(index)
        } else if index >= delete_index + count {
            Some(index - count)
        } else {
            None
        }
    }

    /// Shrink an inclusive `[start, end]` span around a removed block.
    /// Returns None when the whole span was removed.
    pub fn adjust_span_for_delete(
        start: usize,
        end: usize,
        delete_index: usize,
        count: usize,
    ) -> Option<(usize, usize)> {
        let new_start = Self::adjust_for_delete(start, delete_index, count).unwrap_or(delete_index);
        let new_end = match Self::adjust_for_delete(end, delete_index, count) {
            Some(e) => e,
            None => delete_index.checked_sub(1)?,
        };
        if new_end < new_start {
            None
        } else {
            Some((new_start, new_end))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changeset_basic() {
        let mut cs = Changeset::new();
        assert!(cs.is_empty());
        assert_eq!(cs.generation(), 0);

        cs.push(GridChange::RowsInserted { index: 0, count: 2 });
        assert!(!cs.is_empty());
        assert_eq!(cs.len(), 1);

        let drained = cs.drain();
        assert_eq!(drained.len(), 1);
        assert!(cs.is_empty());
        assert_eq!(cs.generation(), 1);
    }

    #[test]
    fn test_index_adjuster_insert() {
        assert_eq!(IndexAdjuster::adjust_for_insert(1, 2, 3), 1);
        assert_eq!(IndexAdjuster::adjust_for_insert(2, 2, 3), 5);
        assert_eq!(IndexAdjuster::adjust_for_insert(4, 2, 1), 5);
    }

    #[test]
    fn test_index_adjuster_delete() {
        // Remove rows 2 and 3
        assert_eq!(IndexAdjuster::adjust_for_delete(1, 2, 2), Some(1));
        assert_eq!(IndexAdjuster::adjust_for_delete(2, 2, 2), None);
        assert_eq!(IndexAdjuster::adjust_for_delete(3, 2, 2), None);
        assert_eq!(IndexAdjuster::adjust_for_delete(4, 2, 2), Some(2));
    }

    #[test]
    fn test_span_adjust_for_delete() {
        // Span 1..=5, remove 2..4
        assert_eq!(IndexAdjuster::adjust_span_for_delete(1, 5, 2, 2), Some((1, 3)));
        // Span starts inside the removed block
        assert_eq!(IndexAdjuster::adjust_span_for_delete(3, 6, 2, 2), Some((2, 4)));
        // Span ends inside the removed block
        assert_eq!(IndexAdjuster::adjust_span_for_delete(0, 2, 2, 2), Some((0, 1)));
        // Span fully removed
        assert_eq!(IndexAdjuster::adjust_span_for_delete(2, 3, 2, 2), None);
        assert_eq!(IndexAdjuster::adjust_span_for_delete(0, 0, 0, 1), None);
    }
}
