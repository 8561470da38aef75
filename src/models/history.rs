// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Undo/redo history of event mark edits.

use super::annotation::EventMarks;

/// History system for undo/redo functionality.
#[derive(Debug)]
pub struct History {
    /// Undo stack (past states)
    undo_stack: Vec<EventMarks>,
    /// Redo stack (future states after undo)
    redo_stack: Vec<EventMarks>,
    /// Maximum history size
    max_size: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size: 50, // Keep last 50 states
        }
    }

    /// Save current state before making a change
    pub fn push(&mut self, marks: EventMarks) {
        if self.undo_stack.last() == Some(&marks) {
            return;
        }
        self.undo_stack.push(marks);
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
        // Clear redo stack when new action is performed
        self.redo_stack.clear();
    }

    /// Undo: restore previous state
    pub fn undo(&mut self, current: EventMarks) -> Option<EventMarks> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    /// Redo: restore next state
    pub fn redo(&mut self, current: EventMarks) -> Option<EventMarks> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::annotation::EventMark;

    fn with_first(frame: u64) -> EventMarks {
        let mut marks = EventMarks::new(2);
        marks.set(1, EventMark::new(frame, 0.0));
        marks
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut history = History::new();
        assert!(!history.can_undo());

        history.push(EventMarks::new(2));
        let undone = history.undo(with_first(5)).unwrap();
        assert!(undone.is_empty());
        assert!(history.can_redo());

        let redone = history.redo(undone).unwrap();
        assert_eq!(redone.get(1).unwrap().frame, 5);
        assert!(history.undo(redone).is_some());
        assert!(history.undo(EventMarks::new(2)).is_none());
    }

    #[test]
    fn test_push_clears_redo_and_skips_duplicates() {
        let mut history = History::new();
        history.push(with_first(1));
        history.push(with_first(1));
        let _ = history.undo(with_first(2));
        assert!(!history.can_undo());
        assert!(history.can_redo());

        history.push(with_first(3));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = History::new();
        for frame in 0..60 {
            history.push(with_first(frame));
        }
        let mut count = 0;
        let mut current = EventMarks::new(2);
        while let Some(previous) = history.undo(current.clone()) {
            current = previous;
            count += 1;
        }
        assert_eq!(count, 50);
        assert_eq!(current.get(1).unwrap().frame, 10);
    }
}
