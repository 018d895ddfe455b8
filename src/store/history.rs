//! Bounded linear undo/redo over graph snapshots.

use std::collections::VecDeque;

use crate::model::{Relation, Table};

/// Deep copy of the undoable part of the graph. Selection, viewport and the
/// pending link are not part of history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub tables: Vec<Table>,
    pub relations: Vec<Relation>,
}

#[derive(Debug, Clone)]
pub struct History {
    past: VecDeque<Snapshot>,
    future: VecDeque<Snapshot>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            past: VecDeque::with_capacity(capacity),
            future: VecDeque::new(),
            capacity,
        }
    }

    /// Push the state as it was before a mutation. Drops the redo branch and
    /// evicts the oldest entry once over capacity.
    pub fn record(&mut self, snapshot: Snapshot) {
        self.past.push_back(snapshot);
        while self.past.len() > self.capacity {
            self.past.pop_front();
        }
        self.future.clear();
    }

    /// Step back. `current` becomes the first redo entry.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.past.pop_back()?;
        self.future.push_front(current);
        self.future.truncate(self.capacity);
        Some(previous)
    }

    /// Step forward. `current` goes back onto the undo stack.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.future.pop_front()?;
        self.past.push_back(current);
        while self.past.len() > self.capacity {
            self.past.pop_front();
        }
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
