//! Save coordinator: turns unsaved history entries into one `saveEdits`
//! request and reconciles the acknowledgment.

use std::collections::HashSet;

use tensorlens_protocol::{CellChange, RequestId, ViewCommand};

use crate::error::{EngineError, Result};
use crate::grid::SliceGrid;
use crate::history::{EditHistory, EntryId, SaveMark};
use crate::requests::{Channel, RequestTracker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { modified: usize, message: String },
    Failed { error: String, reverted: usize },
}

#[derive(Debug, Clone)]
struct InFlightSave {
    request_id: RequestId,
    key: String,
    entries: Vec<EntryId>,
    cells: usize,
}

/// At most one save is in flight. Nothing is retried automatically.
#[derive(Debug, Default)]
pub struct SaveCoordinator {
    in_flight: Option<InFlightSave>,
}

impl SaveCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight_request(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|s| s.request_id)
    }

    /// Send every unsaved edit of tensor `key`.
    ///
    /// A cell edited several times is sent once, with the value the grid shows
    /// now. Rows and columns go out 1-based.
    pub fn flush(
        &mut self,
        key: &str,
        history: &mut EditHistory,
        grid: &SliceGrid,
        tracker: &mut RequestTracker,
    ) -> Result<ViewCommand> {
        if let Some(saving) = &self.in_flight {
            return Err(EngineError::UserInput(format!(
                "a save of '{}' is already in progress",
                saving.key
            )));
        }

        let mut seen = HashSet::new();
        let mut changes = Vec::new();
        let mut entries = Vec::new();
        for entry in history.pending() {
            entries.push(entry.id);
            let (row, col) = (entry.action.row, entry.action.col);
            if !seen.insert((row, col)) {
                continue;
            }
            let value = grid
                .get(row, col)
                .map(str::to_string)
                .unwrap_or_else(|| entry.action.new_value.clone());
            changes.push(CellChange { row: row + 1, col: col + 1, value });
        }

        if entries.is_empty() {
            return Err(EngineError::UserInput("no unsaved changes".into()));
        }

        history.remark(&entries, SaveMark::Edited, SaveMark::Saving);
        let request_id = tracker.issue(Channel::Save);
        log::debug!(
            "saving {} cell(s) from {} edit(s) of '{key}' as request {request_id}",
            changes.len(),
            entries.len()
        );
        self.in_flight = Some(InFlightSave {
            request_id,
            key: key.to_string(),
            entries,
            cells: changes.len(),
        });

        Ok(ViewCommand::SaveEdits { key: key.to_string(), changes, request_id: Some(request_id) })
    }

    /// Apply the acknowledgment of the in-flight save. `None` when nothing
    /// was in flight.
    pub fn acknowledge(
        &mut self,
        history: &mut EditHistory,
        success: bool,
        modified: Option<usize>,
        message: Option<String>,
        error: Option<String>,
    ) -> Option<SaveOutcome> {
        let Some(saving) = self.in_flight.take() else {
            log::warn!("save acknowledgment with no save in flight");
            return None;
        };

        if success {
            history.remark(&saving.entries, SaveMark::Saving, SaveMark::Saved);
            let modified = modified.unwrap_or(saving.cells);
            let message = message.unwrap_or_else(|| format!("Saved {modified} change(s)"));
            log::debug!("save {} of '{}' succeeded: {message}", saving.request_id, saving.key);
            Some(SaveOutcome::Saved { modified, message })
        } else {
            let reverted = history.remark(&saving.entries, SaveMark::Saving, SaveMark::Edited);
            let error = error.or(message).unwrap_or_else(|| "save failed".to_string());
            log::warn!("save {} of '{}' failed: {error}", saving.request_id, saving.key);
            Some(SaveOutcome::Failed { error, reverted })
        }
    }

    /// Give up on the in-flight save (its answer will never be applied) and
    /// put its entries back to unsaved.
    pub fn abandon(&mut self, history: &mut EditHistory) -> bool {
        match self.in_flight.take() {
            Some(saving) => {
                history.remark(&saving.entries, SaveMark::Saving, SaveMark::Edited);
                log::debug!("abandoned save {}", saving.request_id);
                true
            }
            None => false,
        }
    }
}
