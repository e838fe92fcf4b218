//! Bounded undo history of annotation snapshots.

use std::collections::VecDeque;

use log::debug;

use crate::geometry::{Ellipse, Point};
use crate::model::Category;

pub const HISTORY_CAPACITY: usize = 10;

/// Points and ellipses of every category at one moment. Owned copies only,
/// never shared with the live state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub(crate) points: [Vec<Point>; 4],
    pub(crate) ellipses: [Option<Ellipse>; 2],
}

impl Snapshot {
    pub fn points(&self, category: Category) -> &[Point] {
        &self.points[category.index()]
    }

    pub fn ellipse(&self, category: Category) -> Option<&Ellipse> {
        category
            .ellipse_index()
            .ok()
            .and_then(|i| self.ellipses[i].as_ref())
    }
}

/// Snapshot stack with a cursor. Pushing after an undo drops everything
/// past the cursor; once full, the oldest entry is evicted.
#[derive(Clone, Debug)]
pub struct History {
    stack: VecDeque<Snapshot>,
    index: usize,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(Snapshot::default())
    }
}

impl History {
    pub fn new(initial: Snapshot) -> Self {
        Self::with_capacity(initial, HISTORY_CAPACITY)
    }

    pub fn with_capacity(initial: Snapshot, capacity: usize) -> Self {
        let mut history = Self {
            stack: VecDeque::with_capacity(capacity),
            index: 0,
            capacity: capacity.max(1),
        };
        history.reset(initial);
        history
    }

    /// Drops every entry and makes `initial` the only (and floor) snapshot.
    pub fn reset(&mut self, initial: Snapshot) {
        self.stack.clear();
        self.stack.push_back(initial);
        self.index = 0;
        debug!("history reset");
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.stack.truncate(self.index + 1);
        self.stack.push_back(snapshot);
        while self.stack.len() > self.capacity {
            self.stack.pop_front();
        }
        self.index = self.stack.len() - 1;
        debug!("history push ({}/{})", self.index + 1, self.stack.len());
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.stack.len()
    }

    /// Steps back and returns the snapshot to restore.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.stack.get(self.index)
    }

    /// Steps forward over a snapshot left behind by `undo`.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.stack.get(self.index)
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.stack.get(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(n: usize) -> Snapshot {
        let mut s = Snapshot::default();
        s.points[Category::Pupil.index()] = (0..n).map(|i| Point::new(i as f64, 0.0)).collect();
        s
    }

    #[test]
    fn test_new_history_has_one_entry() {
        let history = History::default();
        assert_eq!(history.len(), 1);
        assert_eq!(history.index(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_walks_back_to_first_push() {
        let mut history = History::new(snap(0));
        for n in 1..=4 {
            history.push(snap(n));
        }
        // Five entries: N - 1 undos reach the floor.
        for expected in (0..4).rev() {
            assert_eq!(history.undo(), Some(&snap(expected)));
        }
        assert!(!history.can_undo());
        assert_eq!(history.undo(), None);
        assert_eq!(history.index(), 0);
    }

    #[test]
    fn test_push_after_undo_truncates_future() {
        let mut history = History::new(snap(0));
        history.push(snap(1));
        history.push(snap(2));
        history.push(snap(3));

        history.undo();
        history.undo();
        history.push(snap(9));

        assert_eq!(history.len(), 3);
        assert_eq!(history.current(), Some(&snap(9)));
        assert!(!history.can_redo());
        assert_eq!(history.undo(), Some(&snap(1)));
        assert_eq!(history.redo(), Some(&snap(9)));
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn test_capacity_is_bounded() {
        let mut history = History::new(snap(0));
        for n in 1..=25 {
            history.push(snap(n));
            assert!(history.len() <= HISTORY_CAPACITY);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.index(), HISTORY_CAPACITY - 1);

        let mut undos = 0;
        while history.undo().is_some() {
            undos += 1;
        }
        assert_eq!(undos, HISTORY_CAPACITY - 1);
        assert_eq!(history.current(), Some(&snap(16)));
    }

    #[test]
    fn test_reset_makes_a_new_floor() {
        let mut history = History::new(snap(0));
        history.push(snap(1));
        history.push(snap(2));

        history.reset(snap(7));

        assert_eq!(history.len(), 1);
        assert_eq!(history.current(), Some(&snap(7)));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_redo_after_undo() {
        let mut history = History::new(snap(0));
        history.push(snap(1));
        history.undo();

        assert!(history.can_redo());
        assert_eq!(history.redo(), Some(&snap(1)));
        assert!(history.can_undo());
    }
}
