//! Undo/Redo history for cell edits
//!
//! A single bounded log with a cursor. Entries after the cursor are the redo
//! branch; recording a new edit drops them. Each entry also carries a save
//! mark so the save coordinator can tell which edits still need persisting.

pub const DEFAULT_LIMIT: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditAction {
    pub row: usize,
    pub col: usize,
    pub old_value: String,
    pub new_value: String,
}

impl EditAction {
    pub fn new(row: usize, col: usize, old_value: impl Into<String>, new_value: impl Into<String>) -> Self {
        Self { row, col, old_value: old_value.into(), new_value: new_value.into() }
    }
}

/// Persistence state of one history entry (visual only; never removes entries).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveMark {
    Edited,
    Saving,
    Saved,
}

/// Stable id of a history entry, unaffected by eviction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub id: EntryId,
    pub action: EditAction,
    pub mark: SaveMark,
}

#[derive(Clone, Debug)]
pub struct EditHistory {
    entries: Vec<HistoryEntry>,
    /// Number of applied entries, i.e. `historyIndex + 1`.
    applied: usize,
    next_id: u64,
    max_entries: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl EditHistory {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            applied: 0,
            next_id: 0,
            max_entries: limit.max(1),
        }
    }

    /// Record an applied edit
    pub fn record(&mut self, action: EditAction) -> EntryId {
        self.entries.truncate(self.applied);

        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(HistoryEntry { id, action, mark: SaveMark::Edited });
        self.applied += 1;

        // Limit history size
        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
            self.applied -= 1;
        }
        id
    }

    /// Step back one edit; the caller writes `old_value` into the grid
    pub fn undo(&mut self) -> Option<EditAction> {
        if self.applied == 0 {
            return None;
        }
        self.applied -= 1;
        let entry = &mut self.entries[self.applied];
        // The cell no longer shows what was last persisted.
        entry.mark = SaveMark::Edited;
        Some(entry.action.clone())
    }

    /// Step forward one edit; the caller writes `new_value` into the grid
    pub fn redo(&mut self) -> Option<EditAction> {
        let entry = self.entries.get_mut(self.applied)?;
        entry.mark = SaveMark::Edited;
        self.applied += 1;
        Some(entry.action.clone())
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.entries.len()
    }

    /// Cursor at the most recently applied entry; -1 when nothing is applied.
    pub fn history_index(&self) -> isize {
        self.applied as isize - 1
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.applied.checked_sub(1).map(|i| &self.entries[i])
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.applied = 0;
    }

    /// Entries still waiting to be persisted, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(|e| e.mark == SaveMark::Edited)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Move the listed entries from `from` to `to`. Entries that were evicted,
    /// or whose mark changed meanwhile, are left alone. Returns how many moved.
    pub fn remark(&mut self, ids: &[EntryId], from: SaveMark, to: SaveMark) -> usize {
        let mut moved = 0;
        for entry in self.entries.iter_mut().filter(|e| e.mark == from && ids.contains(&e.id)) {
            entry.mark = to;
            moved += 1;
        }
        moved
    }

    /// Mark shown for a cell: any unsaved edit wins over an in-flight save,
    /// which wins over saved.
    pub fn cell_mark(&self, row: usize, col: usize) -> Option<SaveMark> {
        let marks = self
            .entries
            .iter()
            .filter(|e| e.action.row == row && e.action.col == col)
            .map(|e| e.mark);
        marks.fold(None, |best, mark| match (best, mark) {
            (Some(SaveMark::Edited), _) | (_, SaveMark::Edited) => Some(SaveMark::Edited),
            (Some(SaveMark::Saving), _) | (_, SaveMark::Saving) => Some(SaveMark::Saving),
            _ => Some(SaveMark::Saved),
        })
    }
}
