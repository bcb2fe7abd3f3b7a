use std::collections::VecDeque;
use std::sync::Arc;

use fretseq_grid::{Grid, Note};

/// Maximum number of snapshots kept; the oldest is dropped first.
pub const UNDO_LIMIT: usize = 50;

/// Bounded stack of whole-collection snapshots. There is no redo.
#[derive(Debug, Default)]
pub struct UndoHistory {
    stack: VecDeque<Arc<Vec<Note>>>,
}

impl UndoHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `snapshot` unless it is the very same collection already on top.
    pub fn record(&mut self, snapshot: Arc<Vec<Note>>) {
        if let Some(top) = self.stack.back() {
            if Arc::ptr_eq(top, &snapshot) {
                return;
            }
        }
        self.stack.push_back(snapshot);
        if self.stack.len() > UNDO_LIMIT {
            self.stack.pop_front();
        }
    }

    /// Restore the most recent snapshot. Returns `false` when there is nothing
    /// to undo.
    pub fn undo(&mut self, grid: &mut Grid) -> bool {
        match self.stack.pop_back() {
            Some(snapshot) => {
                log::debug!("undo: restoring {} note(s)", snapshot.len());
                grid.restore(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }
}
