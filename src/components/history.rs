use hashlink::LinkedHashMap;

// ============================================================================
// CHANGE LOG — coordinate-keyed overlay of stitched cells
// ============================================================================

/// A single cell edit.  `change_id` is shared by every cell touched by the
/// same user action, so undo works per action rather than per cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub x: u32,
    pub y: u32,
    pub new_code: String,
    pub original_code: String,
    pub change_id: u64,
}

/// Ordered overlay of edits on top of the base pattern.
///
/// Holds at most one change per coordinate: recording a cell again replaces
/// the old entry and moves it to the end of the log.
#[derive(Default)]
pub struct ChangeLog {
    entries: LinkedHashMap<(u32, u32), Change>,
    /// Id of the most recently opened action (0 = nothing recorded yet).
    counter: u64,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new action; subsequent `record` calls share its id.
    pub fn begin_action(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    pub fn current_id(&self) -> u64 {
        self.counter
    }

    /// Record an edit under the current action id and return that id.
    pub fn record(&mut self, x: u32, y: u32, new_code: &str, original_code: &str) -> u64 {
        let change = Change {
            x,
            y,
            new_code: new_code.to_string(),
            original_code: original_code.to_string(),
            change_id: self.counter,
        };
        self.entries.remove(&(x, y));
        self.entries.insert((x, y), change);
        self.counter
    }

    /// Remove every entry belonging to the newest action and step the
    /// counter back, even when the action left no entries behind.
    pub fn undo_last(&mut self) -> Vec<Change> {
        if self.entries.is_empty() {
            self.counter = 0;
            return Vec::new();
        }
        let id = self.counter;
        let keys: Vec<(u32, u32)> = self
            .entries
            .iter()
            .filter(|(_, c)| c.change_id == id)
            .map(|(k, _)| *k)
            .collect();
        let removed = keys
            .into_iter()
            .filter_map(|k| self.entries.remove(&k))
            .collect();
        self.counter = self.counter.saturating_sub(1);
        removed
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&Change> {
        self.entries.get(&(x, y))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_entry_per_cell() {
        let mut log = ChangeLog::new();
        log.begin_action();
        log.record(1, 1, "stitched", "310");
        log.begin_action();
        log.record(1, 1, "stitched", "stitched");
        assert_eq!(log.len(), 1);
        assert_eq!(log.get(1, 1).map(|c| c.change_id), Some(2));
    }

    #[test]
    fn undo_removes_only_newest_action() {
        let mut log = ChangeLog::new();
        log.begin_action();
        log.record(0, 0, "stitched", "A");
        log.begin_action();
        log.record(1, 0, "stitched", "A");
        log.record(2, 0, "stitched", "A");

        let undone = log.undo_last();
        assert_eq!(undone.len(), 2);
        assert!(undone.iter().all(|c| c.original_code == "A"));
        assert_eq!(log.current_id(), 1);
        assert!(log.get(0, 0).is_some());
    }

    #[test]
    fn undo_steps_counter_past_emptied_actions() {
        let mut log = ChangeLog::new();
        log.begin_action();
        log.record(0, 0, "stitched", "A");
        log.begin_action();
        // Action 2 re-stitches the same cell, leaving action 1 with no entries.
        log.record(0, 0, "stitched", "stitched");
        log.begin_action();
        log.record(1, 0, "stitched", "A");

        assert_eq!(log.undo_last().len(), 1);
        assert_eq!(log.undo_last().len(), 1);
        assert_eq!(log.current_id(), 1);
        assert!(log.undo_last().is_empty());
        assert_eq!(log.current_id(), 0);
    }

    #[test]
    fn undo_on_empty_log_is_noop() {
        let mut log = ChangeLog::new();
        assert!(log.undo_last().is_empty());
        assert_eq!(log.current_id(), 0);
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let mut log = ChangeLog::new();
        log.begin_action();
        log.record(2, 0, "stitched", "A");
        log.record(0, 0, "stitched", "A");
        log.record(2, 0, "stitched", "A");
        let order: Vec<(u32, u32)> = log.iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(order, vec![(0, 0), (2, 0)]);
    }
}
