//! # Undo/Redo History
//!
//! Linear history of committed transactions.
//!
//! ## Design
//!
//! - Each entry stores the forward ops and their inverses
//! - Undo replays the inverses in reverse order
//! - Redo replays the forward ops in original order
//! - Committing after an undo discards the redo branch
//! - Batched commits inside the batch window merge into one entry, with the
//!   window measured from the first commit of the batch
//!
//! The history only does bookkeeping; the session replays the ops and then
//! confirms the move with [`History::step_back`] / [`History::step_forward`].

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::operations::Op;
use crate::selection::Selection;

/// One undo step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Forward ops, in application order
    pub ops: Vec<Op>,

    /// Inverse ops, parallel to `ops`; undo replays them back to front
    pub inverse_ops: Vec<Op>,

    pub selection_before: Selection,
    pub selection_after: Selection,
}

impl HistoryEntry {
    fn merge(&mut self, later: HistoryEntry) {
        self.ops.extend(later.ops);
        self.inverse_ops.extend(later.inverse_ops);
        self.selection_after = later.selection_after;
    }
}

#[derive(Debug)]
pub struct History {
    entries: Vec<HistoryEntry>,

    /// Number of entries currently applied
    position: usize,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    batch_window: Duration,

    /// When the batch the last entry belongs to started
    batch_started: Option<Instant>,
}

impl History {
    pub fn new(max_levels: usize, batch_window: Duration) -> Self {
        Self {
            entries: Vec::new(),
            position: 0,
            max_levels,
            batch_window,
            batch_started: None,
        }
    }

    /// Record a committed transaction
    pub fn record(&mut self, entry: HistoryEntry, batch: bool, now: Instant) {
        // New action invalidates the future
        self.entries.truncate(self.position);

        let in_window = self
            .batch_started
            .is_some_and(|started| now.saturating_duration_since(started) < self.batch_window);

        if batch && in_window {
            if let Some(last) = self.entries.last_mut() {
                last.merge(entry);
                return;
            }
        }

        self.entries.push(entry);

        // Trim if exceeded max levels
        if self.max_levels > 0 && self.entries.len() > self.max_levels {
            self.entries.remove(0);
        }

        self.position = self.entries.len();
        self.batch_started = batch.then_some(now);
    }

    /// Entry the next undo would revert
    pub fn undo_entry(&self) -> Option<&HistoryEntry> {
        self.position.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Entry the next redo would reapply
    pub fn redo_entry(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.position)
    }

    pub fn step_back(&mut self) {
        self.position = self.position.saturating_sub(1);
        self.batch_started = None;
    }

    pub fn step_forward(&mut self) {
        self.position = (self.position + 1).min(self.entries.len());
        self.batch_started = None;
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.entries.len()
    }

    /// Get the number of undo levels available
    pub fn undo_levels(&self) -> usize {
        self.position
    }

    /// Get the number of redo levels available
    pub fn redo_levels(&self) -> usize {
        self.entries.len() - self.position
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}
