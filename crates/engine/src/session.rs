//! One open tensor document: what the viewer shows and every request it
//! sends to the data source.
//!
//! The session never talks to the provider itself. Operations return the
//! [`ViewCommand`] to send, and provider answers come back through
//! [`TensorSession::handle_event`]. Failed operations leave their message in
//! the status line (and the banner, for anything but plain user mistakes)
//! before returning the error.

use std::path::{Path, PathBuf};

use tensorlens_config::{Settings, ViewerState};
use tensorlens_core::{cell_label, CellAddress, GridSelection};
use tensorlens_protocol::{
    ChartType, DependencyStatus, ExportFormat, HostEvent, PlotData, PlotParams, SearchOptions,
    SearchResultsPayload, SkippedTensor, SlicePayload, TensorEntry, ViewCommand,
};

use crate::error::{EngineError, Result};
use crate::format::{format_size, format_stat};
use crate::grid::{GridWindow, SliceGrid};
use crate::history::{EditAction, EditHistory};
use crate::navigation::{Descent, DimensionPath, LayerEntry};
use crate::requests::{Channel, ErrorScope, RequestTracker};
use crate::save::{SaveCoordinator, SaveOutcome};
use crate::slice::{build_slice_spec, SliceError, SliceRequest, SliceSpec, SliceToken};

/// Settings the session reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub max_rows: usize,
    pub max_cols: usize,
    /// Tensors above this many elements are never fetched whole.
    pub max_preview_elements: usize,
    pub history_limit: usize,
    pub chart_type: ChartType,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SessionOptions {
    fn from(settings: &Settings) -> Self {
        let chart_type = ChartType::from_name(&settings.default_chart_type).unwrap_or_else(|| {
            log::warn!("unknown chart type '{}', using line", settings.default_chart_type);
            ChartType::Line
        });
        Self {
            max_rows: settings.max_rows.max(1),
            max_cols: settings.max_cols.max(1),
            max_preview_elements: settings.max_preview_elements.max(1),
            history_limit: settings.history_limit,
            chart_type,
        }
    }
}

/// An operation that would throw away unsaved edits, held until the user
/// confirms it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingDiscard {
    Select { key: String },
    /// Entering the index that completes the path to the grid.
    Enter { index: usize },
    Slice { expr: String },
    Refresh,
}

impl PendingDiscard {
    pub fn prompt(&self, unsaved: usize) -> String {
        let action = match self {
            Self::Select { key } => format!("Open '{key}'"),
            Self::Enter { index } => format!("Open index [{index}]"),
            Self::Slice { expr } => format!("Load slice [{expr}]"),
            Self::Refresh => "Reload the file".to_string(),
        };
        format!("{action} and discard {unsaved} unsaved edit(s)? Confirm or cancel.")
    }
}

/// What the sidebar lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarView {
    Tensors,
    /// Index-selection layers of the selected tensor.
    Dimensions,
}

pub struct TensorSession {
    file: PathBuf,
    options: SessionOptions,

    tensors: Vec<TensorEntry>,
    total_size: u64,
    name_filter: String,
    /// Provider-side filter result; shown instead of the full listing.
    filtered: Option<Vec<TensorEntry>>,

    selected: Option<String>,
    nav: Option<DimensionPath>,
    view: SidebarView,

    grid: SliceGrid,
    grid_source: Option<String>,
    selection: GridSelection,
    history: EditHistory,
    saver: SaveCoordinator,
    requests: RequestTracker,
    pending_slice: Option<String>,
    pending: Option<PendingDiscard>,

    plot_params: PlotParams,
    plot: Option<PlotData>,
    search_query: Option<String>,
    search_results: Option<SearchResultsPayload>,
    dependencies: Option<DependencyStatus>,
    pending_restore: Option<ViewerState>,

    status: String,
    banner: Option<String>,
}

impl TensorSession {
    pub fn new(file: impl Into<PathBuf>, options: SessionOptions) -> Self {
        let plot_params = PlotParams { chart_type: options.chart_type, ..PlotParams::default() };
        let history = EditHistory::with_limit(options.history_limit);
        Self {
            file: file.into(),
            options,
            tensors: Vec::new(),
            total_size: 0,
            name_filter: String::new(),
            filtered: None,
            selected: None,
            nav: None,
            view: SidebarView::Tensors,
            grid: SliceGrid::empty(),
            grid_source: None,
            selection: GridSelection::new(),
            history,
            saver: SaveCoordinator::new(),
            requests: RequestTracker::new(),
            pending_slice: None,
            pending: None,
            plot_params,
            plot: None,
            search_query: None,
            search_results: None,
            dependencies: None,
            pending_restore: None,
            status: String::new(),
            banner: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn tensors(&self) -> &[TensorEntry] {
        &self.tensors
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Tensors whose key contains the local name filter (case-insensitive),
    /// taken from the provider's filter result while one is applied.
    pub fn visible_tensors(&self) -> Vec<&TensorEntry> {
        self.filtered
            .as_deref()
            .unwrap_or(&self.tensors)
            .iter()
            .filter(|t| t.key.to_lowercase().contains(&self.name_filter))
            .collect()
    }

    pub fn selected_key(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_tensor(&self) -> Option<&TensorEntry> {
        let key = self.selected.as_deref()?;
        self.tensors.iter().find(|t| t.key == key)
    }

    pub fn navigator(&self) -> Option<&DimensionPath> {
        self.nav.as_ref()
    }

    pub fn view(&self) -> SidebarView {
        self.view
    }

    /// 0 while the tensor list is shown; otherwise the index-selection layer
    /// (1 for the first one).
    pub fn current_depth(&self) -> usize {
        match self.view {
            SidebarView::Tensors => 0,
            SidebarView::Dimensions => self.nav.as_ref().map_or(0, DimensionPath::current_depth),
        }
    }

    pub fn layer_entries(&self) -> Vec<LayerEntry> {
        self.nav.as_ref().map(DimensionPath::layer_entries).unwrap_or_default()
    }

    pub fn grid(&self) -> &SliceGrid {
        &self.grid
    }

    /// What the grid currently shows: `preview` or a slice spec.
    pub fn grid_source(&self) -> Option<&str> {
        self.grid_source.as_deref()
    }

    pub fn grid_window(&self) -> GridWindow<'_> {
        self.grid.window(self.options.max_rows, self.options.max_cols)
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn selection(&self) -> &GridSelection {
        &self.selection
    }

    pub fn is_saving(&self) -> bool {
        self.saver.is_saving()
    }

    pub fn is_loading(&self) -> bool {
        self.requests.any_loading()
    }

    pub fn requests(&self) -> &RequestTracker {
        &self.requests
    }

    pub fn plot_params(&self) -> &PlotParams {
        &self.plot_params
    }

    pub fn plot(&self) -> Option<&PlotData> {
        self.plot.as_ref()
    }

    pub fn search_results(&self) -> Option<&SearchResultsPayload> {
        self.search_results.as_ref()
    }

    pub fn dependencies(&self) -> Option<&DependencyStatus> {
        self.dependencies.as_ref()
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered.is_some()
    }

    pub fn pending(&self) -> Option<&PendingDiscard> {
        self.pending.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    // ========================================================================
    // Loading and navigation
    // ========================================================================

    /// Ask the provider to (re)read the document. With unsaved edits this
    /// only stages the reload; see [`TensorSession::confirm`].
    pub fn request_refresh(&mut self) -> Option<ViewCommand> {
        if self.stage_discard(PendingDiscard::Refresh) {
            return None;
        }
        Some(self.issue_refresh())
    }

    fn issue_refresh(&mut self) -> ViewCommand {
        let id = self.requests.issue(Channel::Tensors);
        self.status = "Loading...".to_string();
        ViewCommand::Refresh { request_id: Some(id) }
    }

    /// Select a tensor. Navigation starts over at the first layer; rank <= 2
    /// tensors show their preview, or ask for the whole tensor when the
    /// listing carried none and it is small enough.
    pub fn select_tensor(&mut self, key: &str) -> Result<Option<ViewCommand>> {
        if self.tensors.iter().any(|t| t.key == key)
            && self.stage_discard(PendingDiscard::Select { key: key.to_string() })
        {
            return Ok(None);
        }
        let result = self.select_inner(key);
        self.report(result)
    }

    fn select_inner(&mut self, key: &str) -> Result<Option<ViewCommand>> {
        let entry = self
            .tensors
            .iter()
            .find(|t| t.key == key)
            .cloned()
            .ok_or_else(|| EngineError::UserInput(format!("no tensor named '{key}'")))?;

        self.requests.cancel(Channel::Slice);
        self.pending_slice = None;
        self.replace_grid(SliceGrid::empty(), None);
        self.selected = Some(entry.key.clone());

        let shape = entry.info.shape.clone();
        let last_axis = shape.rank() - 1;
        self.plot_params.x_axis = self.plot_params.x_axis.min(last_axis);
        self.plot_params.y_axis = self.plot_params.y_axis.min(last_axis);

        let navigable = shape.needs_navigation();
        self.nav = Some(DimensionPath::new(shape.clone()));
        log::debug!("selected '{}' {}", entry.key, shape);

        if navigable {
            self.view = SidebarView::Dimensions;
            self.status = format!("{} - choose an index for dimension 0", tensor_summary(&entry));
            return Ok(None);
        }

        self.view = SidebarView::Tensors;
        match &entry.preview {
            Some(preview) => {
                self.replace_grid(SliceGrid::from_payload(preview), Some("preview".into()));
                self.status = tensor_summary(&entry);
                Ok(None)
            }
            None if shape.size() > self.options.max_preview_elements => {
                log::info!(
                    "not fetching '{}': {} elements exceed the preview limit of {}",
                    entry.key,
                    shape.size(),
                    self.options.max_preview_elements
                );
                self.status = format!(
                    "{} - too large to preview, enter a slice expression",
                    tensor_summary(&entry)
                );
                Ok(None)
            }
            None => {
                let spec = SliceSpec::new(vec![SliceToken::All; shape.rank()]);
                Ok(Some(self.issue_slice(&entry.key, spec)))
            }
        }
    }

    /// Fix the next dimension. Returns the slice request once the remaining
    /// two dimensions form the grid.
    pub fn navigate_into(&mut self, index: usize) -> Result<Option<ViewCommand>> {
        let completes_path = self
            .nav
            .as_ref()
            .is_some_and(|nav| nav.layer_entries().get(index).is_some_and(|e| e.is_leaf));
        if completes_path && self.stage_discard(PendingDiscard::Enter { index }) {
            return Ok(None);
        }
        let result = self.navigate_inner(index);
        self.report(result)
    }

    fn navigate_inner(&mut self, index: usize) -> Result<Option<ViewCommand>> {
        let (Some(key), Some(nav)) = (self.selected.clone(), self.nav.as_mut()) else {
            return Err(EngineError::UserInput("select a tensor first".into()));
        };
        let descent = nav.enter(index).map_err(|e| EngineError::UserInput(e.to_string()))?;
        self.view = SidebarView::Dimensions;
        match descent {
            Descent::Layer { .. } => {
                self.status = format!("{key} {}", nav.breadcrumb());
                Ok(None)
            }
            Descent::Leaf => self.request_leaf_slice(&key).map(Some),
        }
    }

    fn request_leaf_slice(&mut self, key: &str) -> Result<ViewCommand> {
        let nav = self
            .nav
            .as_ref()
            .ok_or_else(|| EngineError::Precondition("no dimension path for the selected tensor".into()))?;
        let spec = build_slice_spec(nav.path(), nav.shape())?;
        Ok(self.issue_slice(key, spec))
    }

    fn issue_slice(&mut self, key: &str, spec: SliceSpec) -> ViewCommand {
        let id = self.requests.issue(Channel::Slice);
        self.status = format!("Loading slice [{spec}] of {key}...");
        self.pending_slice = Some(spec.to_string());
        SliceRequest::new(key, spec).into_command(Some(id))
    }

    /// Step back one layer. From the first layer this returns to the tensor
    /// list; at the list it does nothing.
    pub fn navigate_back(&mut self) {
        let Some(nav) = self.nav.as_mut() else {
            log::debug!("navigate back without a selected tensor ignored");
            return;
        };
        let left_leaf = nav.is_navigable() && nav.is_at_leaf_boundary();
        match nav.back() {
            Some(_) => {
                if left_leaf {
                    // The slice for the old path is no longer wanted.
                    self.requests.cancel(Channel::Slice);
                    self.pending_slice = None;
                }
                self.view = SidebarView::Dimensions;
                self.status = nav.breadcrumb();
            }
            None if self.view == SidebarView::Dimensions => {
                self.view = SidebarView::Tensors;
                self.status = "Tensor list".to_string();
            }
            None => {}
        }
    }

    /// Request an arbitrary slice, e.g. `0,:,3`. With unsaved edits a valid
    /// expression is staged instead of sent.
    pub fn apply_slice_expression(&mut self, expr: &str) -> Result<Option<ViewCommand>> {
        let result = self.parse_slice_expression(expr);
        let (key, spec) = self.report(result)?;
        if self.stage_discard(PendingDiscard::Slice { expr: spec.to_string() }) {
            return Ok(None);
        }
        Ok(Some(self.issue_slice(&key, spec)))
    }

    fn parse_slice_expression(&self, expr: &str) -> Result<(String, SliceSpec)> {
        if expr.trim().is_empty() {
            return Err(EngineError::UserInput("enter a slice expression, e.g. 0,:,:".into()));
        }
        let entry = self
            .selected_tensor()
            .ok_or_else(|| EngineError::UserInput("select a tensor first".into()))?;
        let key = entry.key.clone();
        let spec: SliceSpec = expr.parse().map_err(|e: SliceError| EngineError::UserInput(e.to_string()))?;
        spec.validate_against(&entry.info.shape)
            .map_err(|e| EngineError::UserInput(e.to_string()))?;
        Ok((key, spec))
    }

    // ========================================================================
    // Discard confirmation
    // ========================================================================

    /// Hold `action` back when it would drop unsaved edits. Returns true if
    /// it was staged; a new staged action replaces the previous one.
    fn stage_discard(&mut self, action: PendingDiscard) -> bool {
        let unsaved = self.history.pending_count();
        if unsaved == 0 {
            return false;
        }
        log::debug!("staged {action:?} over {unsaved} unsaved edit(s)");
        self.status = action.prompt(unsaved);
        self.pending = Some(action);
        true
    }

    /// Run the staged action, discarding the unsaved edits it would replace.
    pub fn confirm(&mut self) -> Result<Option<ViewCommand>> {
        let Some(action) = self.pending.take() else {
            log::debug!("nothing to confirm");
            return Ok(None);
        };
        match action {
            PendingDiscard::Select { key } => {
                let result = self.select_inner(&key);
                self.report(result)
            }
            PendingDiscard::Enter { index } => {
                let result = self.navigate_inner(index);
                self.report(result)
            }
            PendingDiscard::Slice { expr } => {
                let result = self.parse_slice_expression(&expr);
                let (key, spec) = self.report(result)?;
                Ok(Some(self.issue_slice(&key, spec)))
            }
            PendingDiscard::Refresh => Ok(Some(self.issue_refresh())),
        }
    }

    /// Drop the staged action. Returns false when nothing was staged.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.pending.take().is_some();
        if cancelled {
            self.status = "Cancelled".to_string();
        }
        cancelled
    }

    // ========================================================================
    // Search, filter, plot, export
    // ========================================================================

    pub fn search(&mut self, query: &str, options: SearchOptions) -> Result<ViewCommand> {
        let query = query.trim();
        if query.is_empty() {
            return self.report(Err(EngineError::UserInput("enter a search query".into())));
        }
        self.search_query = Some(query.to_string());
        let id = self.requests.issue(Channel::Search);
        self.status = format!("Searching for '{query}'...");
        Ok(ViewCommand::Search { query: query.to_string(), options, request_id: Some(id) })
    }

    /// Go back to the full listing after a provider-side filter.
    pub fn clear_filter(&mut self) -> bool {
        let cleared = self.filtered.take().is_some();
        if cleared {
            self.status = format!("Showing all {} tensor(s)", self.tensors.len());
        }
        cleared
    }

    /// Local, case-insensitive filter of the tensor list. Returns how many
    /// tensors remain visible.
    pub fn filter_tensors(&mut self, text: &str) -> usize {
        self.name_filter = text.trim().to_lowercase();
        self.visible_tensors().len()
    }

    /// Ask the provider for tensors matching key, shape or dtype.
    pub fn request_filter(
        &mut self,
        key: Option<String>,
        shape: Option<Vec<usize>>,
        dtype: Option<String>,
    ) -> Result<ViewCommand> {
        if key.is_none() && shape.is_none() && dtype.is_none() {
            return self.report(Err(EngineError::UserInput("give at least one filter criterion".into())));
        }
        let id = self.requests.issue(Channel::Filter);
        self.status = "Filtering...".to_string();
        Ok(ViewCommand::Filter { key, shape, dtype, request_id: Some(id) })
    }

    pub fn set_plot_params(&mut self, params: PlotParams) -> Result<()> {
        let result = self.check_plot_axes(&params);
        self.report(result)?;
        self.plot_params = params;
        Ok(())
    }

    fn check_plot_axes(&self, params: &PlotParams) -> Result<()> {
        if let Some(entry) = self.selected_tensor() {
            let rank = entry.info.shape.rank();
            for axis in [params.x_axis, params.y_axis] {
                if axis >= rank {
                    return Err(EngineError::UserInput(format!(
                        "axis {axis} does not exist in a {rank}-dimensional tensor"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn request_plot(&mut self) -> Result<ViewCommand> {
        let result = self.plot_inner();
        self.report(result)
    }

    fn plot_inner(&mut self) -> Result<ViewCommand> {
        let key = self
            .selected
            .clone()
            .ok_or_else(|| EngineError::UserInput("select a tensor first".into()))?;
        self.check_plot_axes(&self.plot_params)?;
        let id = self.requests.issue(Channel::Plot);
        self.status = format!("Preparing {} chart of {key}...", self.plot_params.chart_type.as_str());
        Ok(ViewCommand::Plot { key, params: self.plot_params.clone(), request_id: Some(id) })
    }

    /// Exports produce no answer event, so they are not tracked.
    pub fn request_export(&mut self, format: ExportFormat) -> Result<ViewCommand> {
        let Some(key) = self.selected.clone() else {
            return self.report(Err(EngineError::UserInput("select a tensor first".into())));
        };
        self.status = format!("Exporting {key}...");
        Ok(ViewCommand::Export { format, key, request_id: None })
    }

    // ========================================================================
    // Dependencies
    // ========================================================================

    pub fn install_dependency(&mut self) -> ViewCommand {
        self.status = "Installing dependencies...".to_string();
        ViewCommand::InstallDependency
    }

    pub fn check_dependencies(&mut self) -> ViewCommand {
        let id = self.requests.issue(Channel::Dependencies);
        ViewCommand::CheckDependencies { request_id: Some(id) }
    }

    pub fn open_settings(&self) -> ViewCommand {
        ViewCommand::OpenSettings
    }

    // ========================================================================
    // Grid selection and editing
    // ========================================================================

    fn in_grid(&self, row: usize, col: usize) -> bool {
        self.grid.get(row, col).is_some()
    }

    /// Pointer-down on a cell. Cells outside the grid are ignored.
    pub fn begin_selection(&mut self, row: usize, col: usize, additive: bool) -> bool {
        if !self.in_grid(row, col) {
            return false;
        }
        self.selection.begin(CellAddress::new(row, col), additive);
        true
    }

    pub fn extend_selection(&mut self, row: usize, col: usize) -> bool {
        self.in_grid(row, col) && self.selection.extend(CellAddress::new(row, col))
    }

    pub fn end_selection(&mut self) {
        self.selection.end();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// `B2:D4 (9 cells)` for a rectangle, else the current cell's label.
    pub fn selection_summary(&self) -> Option<String> {
        match self.selection.rectangle() {
            Some(range) if !range.is_single() => {
                Some(format!("{} ({} cells)", range.label(), range.cell_count()))
            }
            _ => self.selection.current_cell().map(|c| c.label()),
        }
    }

    /// Write a new value into a cell. Returns false when the value did not
    /// change (nothing is recorded then).
    pub fn edit_cell(&mut self, row: usize, col: usize, value: &str) -> Result<bool> {
        let Some(old) = self.grid.get(row, col).map(str::to_string) else {
            let err = EngineError::UserInput(format!("cell {} is outside the grid", cell_label(row, col)));
            return self.report(Err(err));
        };
        if old == value {
            return Ok(false);
        }
        self.grid.set(row, col, value);
        self.history.record(EditAction::new(row, col, old, value));
        self.status = format!(
            "Edited {} ({} unsaved)",
            cell_label(row, col),
            self.history.pending_count()
        );
        Ok(true)
    }

    pub fn undo(&mut self) -> Option<EditAction> {
        let Some(action) = self.history.undo() else {
            self.status = "Nothing to undo".to_string();
            return None;
        };
        self.grid.set(action.row, action.col, action.old_value.clone());
        self.status = format!("Undo {}", cell_label(action.row, action.col));
        Some(action)
    }

    pub fn redo(&mut self) -> Option<EditAction> {
        let Some(action) = self.history.redo() else {
            self.status = "Nothing to redo".to_string();
            return None;
        };
        self.grid.set(action.row, action.col, action.new_value.clone());
        self.status = format!("Redo {}", cell_label(action.row, action.col));
        Some(action)
    }

    /// Persist every unsaved edit of the selected tensor.
    pub fn save(&mut self) -> Result<ViewCommand> {
        let result = self.save_inner();
        self.report(result)
    }

    fn save_inner(&mut self) -> Result<ViewCommand> {
        let key = self
            .selected
            .clone()
            .ok_or_else(|| EngineError::UserInput("select a tensor first".into()))?;
        let cmd = self.saver.flush(&key, &mut self.history, &self.grid, &mut self.requests)?;
        if let ViewCommand::SaveEdits { changes, .. } = &cmd {
            self.status = format!("Saving {} change(s)...", changes.len());
        }
        Ok(cmd)
    }

    fn replace_grid(&mut self, grid: SliceGrid, source: Option<String>) {
        let unsaved = self.history.pending_count();
        if unsaved > 0 {
            log::warn!("discarding {unsaved} unsaved edit(s) with the old grid");
        }
        self.grid = grid;
        self.grid_source = source;
        self.selection.reset();
        self.history.clear();
    }

    // ========================================================================
    // Provider events
    // ========================================================================

    /// Parse and apply one raw provider message.
    pub fn handle_message(&mut self, line: &str) -> Result<Option<ViewCommand>> {
        match HostEvent::parse(line) {
            Ok(event) => self.handle_event(event),
            Err(e) => {
                // Whatever was loading will not be answered in a usable form.
                // A save still gets its own saveResponse.
                self.requests.resolve_error(None);
                self.report(Err(e.into()))
            }
        }
    }

    /// Apply a provider event. Stale answers are dropped. May return a
    /// follow-up request (e.g. the slice for a restored path).
    pub fn handle_event(&mut self, event: HostEvent) -> Result<Option<ViewCommand>> {
        if let HostEvent::Error { message, request_id } = &event {
            return match self.requests.resolve_error(*request_id) {
                ErrorScope::Stale => Ok(None),
                scope => {
                    if scope == ErrorScope::Channel(Channel::Save) {
                        self.saver.abandon(&mut self.history);
                    }
                    if scope == ErrorScope::Channel(Channel::Slice) {
                        self.pending_slice = None;
                    }
                    self.report(Err(EngineError::Source(message.clone())))
                }
            };
        }

        let Some(channel) = Channel::for_event(&event) else {
            return Ok(None);
        };
        if matches!(channel, Channel::Entries | Channel::Preview) {
            log::warn!("ignoring {} event in a tensor viewer", event.name());
            return Ok(None);
        }
        if !self.requests.accept(channel, event.request_id()) {
            return Ok(None);
        }

        match event {
            HostEvent::TensorData { data, .. } => {
                let count = data.tensors.len();
                self.tensors = data.tensors;
                self.total_size = data.total_size;
                self.filtered = None;
                self.report_skipped(&data.skipped);
                let follow_up = self.reselect();
                let mut loaded = format!("Loaded {count} tensor(s), {}", format_size(self.total_size));
                if !data.skipped.is_empty() {
                    loaded.push_str(&format!("; skipped {}", data.skipped.len()));
                }
                match follow_up {
                    Ok(None) => {
                        self.status = loaded;
                        Ok(None)
                    }
                    other => other,
                }
            }
            HostEvent::SliceData { data: SlicePayload::Failed { error }, .. } => {
                self.pending_slice = None;
                self.report(Err(EngineError::Source(format!("slice failed: {error}"))))
            }
            HostEvent::SliceData { data: SlicePayload::Values(values), .. } => {
                let source = self.pending_slice.take();
                self.replace_grid(SliceGrid::from_payload(&values), source.clone());
                let (rows, cols) = self.grid.dims();
                self.status = match source {
                    Some(spec) => format!("Slice [{spec}] loaded ({rows} × {cols})"),
                    None => format!("Slice loaded ({rows} × {cols})"),
                };
                Ok(None)
            }
            HostEvent::FilteredData { data, .. } => {
                self.report_skipped(&data.skipped);
                self.status = format!("Filter matched {} tensor(s)", data.tensors.len());
                self.filtered = Some(data.tensors);
                Ok(None)
            }
            HostEvent::SearchResults { data, .. } => {
                self.status = format!("Found {} match(es)", data.match_count());
                self.search_results = Some(data);
                Ok(None)
            }
            HostEvent::PlotData { data, .. } => {
                self.status = if data.title.is_empty() {
                    "Chart ready".to_string()
                } else {
                    format!("Chart ready: {}", data.title)
                };
                self.plot = Some(data);
                Ok(None)
            }
            HostEvent::SaveResponse { success, modified, message, error, .. } => {
                match self.saver.acknowledge(&mut self.history, success, modified, message, error) {
                    Some(SaveOutcome::Saved { message, .. }) => {
                        self.status = message;
                        Ok(None)
                    }
                    Some(SaveOutcome::Failed { error, .. }) => {
                        self.report(Err(EngineError::Source(format!("save failed: {error}"))))
                    }
                    None => Ok(None),
                }
            }
            HostEvent::DependencyStatus { data, .. } => {
                if !data.arrays_available() {
                    self.banner = Some(format!("Missing dependencies: {}", data.missing().join(", ")));
                }
                self.dependencies = Some(data);
                Ok(None)
            }
            HostEvent::ArchiveEntries { .. } | HostEvent::FilePreview { .. } | HostEvent::Error { .. } => {
                Ok(None)
            }
        }
    }

    fn report_skipped(&mut self, skipped: &[SkippedTensor]) {
        if skipped.is_empty() {
            return;
        }
        for tensor in skipped {
            log::warn!("skipping tensor {tensor}");
        }
        let names: Vec<String> = skipped.iter().map(ToString::to_string).collect();
        self.banner = Some(format!("Skipped {} tensor(s): {}", skipped.len(), names.join("; ")));
    }

    /// After a listing arrives: apply a pending restore, else keep the current
    /// tensor and path when they still exist, else pick the first tensor.
    fn reselect(&mut self) -> Result<Option<ViewCommand>> {
        if let Some(state) = self.pending_restore.take() {
            if let Some(key) = state.selected_key.filter(|k| self.tensors.iter().any(|t| &t.key == k)) {
                self.search_query = state.search_query.or(self.search_query.take());
                return self.select_and_replay(&key, &state.dimension_path);
            }
            log::info!("stored selection for {} no longer exists", self.file.display());
        }

        let current = self
            .selected
            .clone()
            .filter(|k| self.tensors.iter().any(|t| &t.key == k));
        match current {
            Some(key) => {
                let path = self.nav.as_ref().map(|n| n.path().to_vec()).unwrap_or_default();
                let view = self.view;
                let cmd = self.select_and_replay(&key, &path)?;
                if path.is_empty() && view == SidebarView::Tensors {
                    self.view = view;
                }
                Ok(cmd)
            }
            None => match self.tensors.first().map(|t| t.key.clone()) {
                Some(first) => {
                    let result = self.select_inner(&first);
                    self.report(result)
                }
                None => {
                    self.selected = None;
                    self.nav = None;
                    self.view = SidebarView::Tensors;
                    self.replace_grid(SliceGrid::empty(), None);
                    Ok(None)
                }
            },
        }
    }

    fn select_and_replay(&mut self, key: &str, path: &[usize]) -> Result<Option<ViewCommand>> {
        let result = self.select_inner(key);
        let cmd = self.report(result)?;
        if path.is_empty() {
            return Ok(cmd);
        }
        let Some(nav) = self.nav.as_mut() else {
            return Ok(cmd);
        };
        let applied = nav.replay(path);
        if applied < path.len() {
            log::info!("stored path {path:?} only valid up to depth {applied} for '{key}'");
        }
        if applied == 0 {
            return Ok(cmd);
        }
        if nav.is_at_leaf_boundary() {
            let result = self.request_leaf_slice(key);
            return self.report(result).map(Some);
        }
        self.status = format!("{key} {}", nav.breadcrumb());
        Ok(cmd)
    }

    // ========================================================================
    // Persisted viewer state
    // ========================================================================

    pub fn viewer_state(&self) -> ViewerState {
        ViewerState {
            file: self.file.clone(),
            selected_key: self.selected.clone(),
            dimension_path: self.nav.as_ref().map(|n| n.path().to_vec()).unwrap_or_default(),
            expanded_paths: Vec::new(),
            search_query: self.search_query.clone(),
        }
    }

    /// Restore a stored state. Applied now if the listing is loaded, else
    /// when it arrives. States stored for another file are ignored.
    pub fn restore(&mut self, state: ViewerState) -> Result<Option<ViewCommand>> {
        if state.file != self.file {
            log::warn!(
                "viewer state for {} does not belong to {}",
                state.file.display(),
                self.file.display()
            );
            return Ok(None);
        }
        self.pending_restore = Some(state);
        if self.tensors.is_empty() {
            Ok(None)
        } else {
            self.reselect()
        }
    }

    // ========================================================================
    // Error reporting
    // ========================================================================

    fn report<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            log::warn!("{err}");
            self.status = err.to_string();
            if err.wants_banner() {
                self.banner = Some(err.to_string());
            }
        }
        result
    }
}

/// `w: 3 × 4 float32 (min 0, max 1, mean 0.500000, std 0.250000)`
fn tensor_summary(entry: &TensorEntry) -> String {
    let info = &entry.info;
    let mut summary = format!("{}: {} {}", entry.key, info.shape, info.dtype);
    if [info.min, info.max, info.mean, info.std].iter().any(Option::is_some) {
        summary.push_str(&format!(
            " (min {}, max {}, mean {}, std {})",
            format_stat(info.min),
            format_stat(info.max),
            format_stat(info.mean),
            format_stat(info.std)
        ));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tensorlens_protocol::TensorListing;

    fn listing() -> HostEvent {
        HostEvent::parse(
            &json!({
                "type": "tensorData",
                "data": {
                    "tensors": [
                        {"key": "weights", "info": {"shape": [2, 3, 4, 5], "dtype": "float32", "size": 120}},
                        {"key": "bias", "info": {"shape": [2, 2], "dtype": "int64", "size": 4},
                         "preview": [[1, 2], [3, 4]]},
                        {"key": "vec", "info": {"shape": [3], "dtype": "int64", "size": 3}}
                    ],
                    "totalSize": 2048
                }
            })
            .to_string(),
        )
        .unwrap()
    }

    fn loaded() -> TensorSession {
        let mut s = TensorSession::new("/data/model.npz", SessionOptions::default());
        s.handle_event(listing()).unwrap();
        s
    }

    fn slice_token(cmd: &ViewCommand) -> Option<u64> {
        match cmd {
            ViewCommand::Slice { request_id, .. } => *request_id,
            _ => None,
        }
    }

    fn slice_answer(id: Option<u64>, data: Value) -> HostEvent {
        HostEvent::SliceData { data: SlicePayload::Values(data), request_id: id }
    }

    #[test]
    fn test_listing_selects_first_tensor() {
        let s = loaded();
        assert_eq!(s.selected_key(), Some("weights"));
        assert_eq!(s.view(), SidebarView::Dimensions);
        assert_eq!(s.current_depth(), 1);
        assert_eq!(s.status(), "Loaded 3 tensor(s), 2.00 KB");
        assert_eq!(s.layer_entries().len(), 2);
    }

    #[test]
    fn test_low_rank_uses_preview() {
        let mut s = loaded();
        assert_eq!(s.select_tensor("bias").unwrap(), None);
        assert_eq!(s.current_depth(), 0);
        assert_eq!(s.grid().dims(), (2, 2));
        assert_eq!(s.grid_source(), Some("preview"));

        // No preview in the listing: fetch the whole tensor.
        let cmd = s.select_tensor("vec").unwrap().unwrap();
        assert!(matches!(cmd, ViewCommand::Slice { ref slice, .. } if slice == ":"));
    }

    #[test]
    fn test_navigation_to_leaf_requests_slice() {
        let mut s = loaded();
        assert_eq!(s.navigate_into(1).unwrap(), None);
        assert_eq!(s.current_depth(), 2);

        let cmd = s.navigate_into(2).unwrap().unwrap();
        match &cmd {
            ViewCommand::Slice { key, slice, request_id } => {
                assert_eq!(key, "weights");
                assert_eq!(slice, "1,2,:,:");
                assert!(request_id.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(s.is_loading());

        let rows = vec![vec![1, 2, 3, 4, 5]; 4];
        s.handle_event(slice_answer(slice_token(&cmd), json!(rows))).unwrap();
        assert_eq!(s.grid().dims(), (4, 5));
        assert_eq!(s.grid_source(), Some("1,2,:,:"));
        assert!(!s.is_loading());
    }

    #[test]
    fn test_navigation_errors_are_user_errors() {
        let mut s = loaded();
        let err = s.navigate_into(5).unwrap_err();
        assert!(matches!(err, EngineError::UserInput(_)));
        assert!(s.status().contains("out of range"));
        assert!(s.banner().is_none());
        assert_eq!(s.navigator().unwrap().path(), &[] as &[usize]);

        s.select_tensor("bias").unwrap();
        assert!(s.navigate_into(0).is_err());
    }

    #[test]
    fn test_back_from_leaf_drops_slice_answer() {
        let mut s = loaded();
        s.navigate_into(0).unwrap();
        let cmd = s.navigate_into(1).unwrap().unwrap();
        s.navigate_back();
        assert_eq!(s.navigator().unwrap().path(), &[0]);
        assert!(!s.is_loading());

        s.handle_event(slice_answer(slice_token(&cmd), json!([[9]]))).unwrap();
        assert!(s.grid().is_empty());

        s.navigate_back();
        assert_eq!(s.current_depth(), 1);
        s.navigate_back();
        assert_eq!(s.current_depth(), 0);
        assert_eq!(s.view(), SidebarView::Tensors);
        // At the list: nothing happens.
        s.navigate_back();
        assert_eq!(s.current_depth(), 0);
    }

    #[test]
    fn test_rapid_navigation_keeps_latest_slice() {
        let mut s = loaded();
        s.navigate_into(0).unwrap();
        let first = s.navigate_into(0).unwrap().unwrap();
        s.navigate_back();
        let second = s.navigate_into(2).unwrap().unwrap();

        s.handle_event(slice_answer(slice_token(&second), json!([[2]]))).unwrap();
        s.handle_event(slice_answer(slice_token(&first), json!([[1]]))).unwrap();
        assert_eq!(s.grid().get(0, 0), Some("2"));
    }

    #[test]
    fn test_failed_slice_keeps_state() {
        let mut s = loaded();
        s.navigate_into(1).unwrap();
        let cmd = s.navigate_into(0).unwrap().unwrap();
        let err = s
            .handle_event(HostEvent::SliceData {
                data: SlicePayload::Failed { error: "index out of bounds".into() },
                request_id: slice_token(&cmd),
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::Source(_)));
        assert_eq!(s.banner(), Some("slice failed: index out of bounds"));
        assert_eq!(s.navigator().unwrap().path(), &[1, 0]);
    }

    #[test]
    fn test_slice_expression() {
        let mut s = loaded();
        assert!(matches!(s.apply_slice_expression("  "), Err(EngineError::UserInput(_))));
        assert!(matches!(s.apply_slice_expression("0,:"), Err(EngineError::UserInput(_))));
        assert!(matches!(s.apply_slice_expression("0,x,:,:"), Err(EngineError::UserInput(_))));
        assert!(matches!(s.apply_slice_expression("2,0,:,:"), Err(EngineError::UserInput(_))));

        let cmd = s.apply_slice_expression("1, :, 0, :").unwrap().unwrap();
        assert!(matches!(cmd, ViewCommand::Slice { ref slice, .. } if slice == "1,:,0,:"));

        let mut empty = TensorSession::new("x.npy", SessionOptions::default());
        let err = empty.apply_slice_expression("0").unwrap_err();
        assert_eq!(err.to_string(), "select a tensor first");
    }

    #[test]
    fn test_search_and_filter() {
        let mut s = loaded();
        assert!(s.search("   ", SearchOptions::default()).is_err());
        let cmd = s.search(" w ", SearchOptions { regex: true, case_sensitive: false }).unwrap();
        assert!(matches!(cmd, ViewCommand::Search { ref query, .. } if query == "w"));

        assert_eq!(s.filter_tensors("BI"), 1);
        assert_eq!(s.visible_tensors()[0].key, "bias");
        assert_eq!(s.filter_tensors(""), 3);

        assert!(s.request_filter(None, None, None).is_err());
        assert!(s.request_filter(None, None, Some("int64".into())).is_ok());
        let bias = s.tensors()[1].clone();
        s.handle_event(HostEvent::FilteredData {
            data: TensorListing::new(vec![bias], 32),
            request_id: None,
        })
        .unwrap();
        assert!(s.is_filtered());
        assert_eq!(s.visible_tensors().len(), 1);
        assert_eq!(s.grid_source(), None);
        assert_eq!(s.selected_key(), Some("weights"));

        // A new listing drops the provider filter.
        s.handle_event(listing()).unwrap();
        assert!(!s.is_filtered());
        assert!(!s.clear_filter());
    }

    #[test]
    fn test_plot_axes_checked_against_rank() {
        let mut s = loaded();
        s.select_tensor("vec").unwrap();
        // Default y axis 1 was clamped for the rank-1 tensor.
        assert_eq!(s.plot_params().y_axis, 0);
        let bad = PlotParams { y_axis: 1, ..PlotParams::default() };
        assert!(s.set_plot_params(bad).is_err());

        s.select_tensor("weights").unwrap();
        let params = PlotParams { chart_type: ChartType::Heatmap, x_axis: 2, y_axis: 3, ..PlotParams::default() };
        s.set_plot_params(params.clone()).unwrap();
        let cmd = s.request_plot().unwrap();
        assert!(matches!(cmd, ViewCommand::Plot { params: ref p, .. } if *p == params));
    }

    #[test]
    fn test_edit_undo_redo_save_cycle() {
        let mut s = loaded();
        s.select_tensor("bias").unwrap();
        assert!(s.edit_cell(0, 0, "9").unwrap());
        assert!(!s.edit_cell(0, 0, "9").unwrap());
        assert!(s.edit_cell(5, 5, "1").is_err());

        let action = s.undo().unwrap();
        assert_eq!(action.old_value, "1");
        assert_eq!(s.grid().get(0, 0), Some("1"));
        s.redo().unwrap();
        assert_eq!(s.grid().get(0, 0), Some("9"));

        let cmd = s.save().unwrap();
        let id = cmd.request_id();
        assert!(s.is_saving());
        s.handle_event(HostEvent::SaveResponse {
            success: true,
            modified: Some(1),
            message: None,
            error: None,
            request_id: id,
        })
        .unwrap();
        assert!(!s.is_saving());
        assert_eq!(s.status(), "Saved 1 change(s)");
        assert!(s.save().is_err());
    }

    #[test]
    fn test_untokened_error_clears_loading() {
        let mut s = loaded();
        s.navigate_into(0).unwrap();
        s.navigate_into(0).unwrap();
        assert!(s.is_loading());
        let err = s
            .handle_event(HostEvent::Error { message: "python crashed".into(), request_id: None })
            .unwrap_err();
        assert_eq!(err, EngineError::Source("python crashed".into()));
        assert!(!s.is_loading());
    }

    #[test]
    fn test_leaf_entry_with_unsaved_edits_is_staged() {
        let mut s = loaded();
        s.navigate_into(0).unwrap();
        let cmd = s.navigate_into(1).unwrap().unwrap();
        s.handle_event(slice_answer(slice_token(&cmd), json!([[1, 2], [3, 4]]))).unwrap();
        s.edit_cell(0, 0, "5").unwrap();

        s.navigate_back();
        assert_eq!(s.navigate_into(2).unwrap(), None);
        assert_eq!(s.pending(), Some(&PendingDiscard::Enter { index: 2 }));
        assert_eq!(s.navigator().unwrap().path(), &[0]);
        assert_eq!(s.status(), "Open index [2] and discard 1 unsaved edit(s)? Confirm or cancel.");

        // Out-of-range indices fail instead of being staged.
        assert!(s.navigate_into(9).is_err());

        let cmd = s.confirm().unwrap().unwrap();
        assert!(matches!(cmd, ViewCommand::Slice { ref slice, .. } if slice == "0,2,:,:"));
        assert_eq!(s.confirm().unwrap(), None);
        assert!(!s.cancel());
    }

    #[test]
    fn test_preview_status_shows_stats() {
        let mut s = TensorSession::new("a.npz", SessionOptions::default());
        s.handle_event(
            HostEvent::parse(
                &json!({
                    "type": "tensorData",
                    "data": {"tensors": [
                        {"key": "m", "info": {"shape": [2, 2], "dtype": "float32", "size": 4,
                                              "min": 1.0, "max": 4.0, "mean": 2.5, "std": 1.118},
                         "preview": [[1, 2], [3, 4]]},
                        {"key": "names", "info": {"shape": [2], "dtype": "<U3", "size": 2},
                         "preview": ["ab", "cd"]}
                    ]}
                })
                .to_string(),
            )
            .unwrap(),
        )
        .unwrap();
        s.select_tensor("m").unwrap();
        assert_eq!(s.status(), "m: 2 × 2 float32 (min 1, max 4, mean 2.500000, std 1.118000)");
        s.select_tensor("names").unwrap();
        assert_eq!(s.status(), "names: 2 <U3");
    }

    #[test]
    fn test_malformed_message_is_transport_error() {
        let mut s = loaded();
        let err = s.handle_message("{\"type\": 42}").unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
        assert!(s.banner().is_some());
    }

    #[test]
    fn test_dependency_banner() {
        let mut s = TensorSession::new("a.npy", SessionOptions::default());
        s.handle_event(HostEvent::DependencyStatus {
            data: DependencyStatus { python: true, ..DependencyStatus::default() },
            request_id: None,
        })
        .unwrap();
        assert_eq!(s.banner(), Some("Missing dependencies: numpy"));
        assert!(matches!(s.check_dependencies(), ViewCommand::CheckDependencies { request_id: Some(_) }));
    }

    #[test]
    fn test_refresh_keeps_selection_and_path() {
        let mut s = loaded();
        s.navigate_into(1).unwrap();
        let refresh = s.request_refresh().unwrap();
        let mut again = listing();
        if let HostEvent::TensorData { request_id, .. } = &mut again {
            *request_id = refresh.request_id();
        }
        assert_eq!(s.handle_event(again).unwrap(), None);
        assert_eq!(s.selected_key(), Some("weights"));
        assert_eq!(s.navigator().unwrap().path(), &[1]);
    }

    #[test]
    fn test_restore_replays_path_to_leaf() {
        let mut s = TensorSession::new("/data/model.npz", SessionOptions::default());
        let state = ViewerState {
            file: "/data/model.npz".into(),
            selected_key: Some("weights".into()),
            dimension_path: vec![1, 2],
            expanded_paths: Vec::new(),
            search_query: Some("w".into()),
        };
        assert_eq!(s.restore(state).unwrap(), None);

        let cmd = s.handle_event(listing()).unwrap().unwrap();
        assert!(matches!(cmd, ViewCommand::Slice { ref slice, .. } if slice == "1,2,:,:"));
        let saved = s.viewer_state();
        assert_eq!(saved.dimension_path, vec![1, 2]);
        assert_eq!(saved.search_query.as_deref(), Some("w"));

        // Another file's state is ignored.
        let other = ViewerState::new("/data/other.npz");
        assert_eq!(s.restore(other).unwrap(), None);
        assert_eq!(s.navigator().unwrap().path(), &[1, 2]);
    }

    #[test]
    fn test_options_from_settings() {
        let settings = Settings {
            default_chart_type: "heatmap".into(),
            history_limit: 5,
            ..Settings::default()
        };
        let s = TensorSession::new("a.npy", SessionOptions::from(&settings));
        assert_eq!(s.plot_params().chart_type, ChartType::Heatmap);
        assert_eq!(s.history().limit(), 5);

        let bad = Settings { default_chart_type: "pie".into(), ..Settings::default() };
        assert_eq!(SessionOptions::from(&bad).chart_type, ChartType::Line);
    }

    #[test]
    fn test_selection_summary() {
        let mut s = loaded();
        s.select_tensor("bias").unwrap();
        assert_eq!(s.selection_summary(), None);
        assert!(!s.begin_selection(9, 9, false));
        assert!(s.begin_selection(0, 0, false));
        assert_eq!(s.selection_summary().as_deref(), Some("A1"));
        assert!(s.extend_selection(1, 1));
        s.end_selection();
        assert_eq!(s.selection_summary().as_deref(), Some("A1:B2 (4 cells)"));
    }
}
