//! Archive browsing: a file tree built once from the flat entry list, plus
//! the session state around it (expansion, preview, extraction).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tensorlens_config::{Settings, ViewerState};
use tensorlens_protocol::{
    ArchiveEntry, HostEvent, PreviewContent, SearchOptions, SearchResultsPayload, ViewCommand,
};

use crate::error::{EngineError, Result};
use crate::format::format_size;
use crate::requests::{Channel, ErrorScope, RequestTracker};

// ============================================================================
// Tree
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveNode {
    pub name: String,
    /// Slash-joined path from the archive root, without leading or trailing `/`.
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub children: Vec<ArchiveNode>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub files: usize,
    pub directories: usize,
    pub total_size: u64,
}

/// One line of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow<'a> {
    pub depth: usize,
    pub name: &'a str,
    pub path: &'a str,
    pub is_dir: bool,
    pub size: u64,
    pub expanded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveTree {
    roots: Vec<ArchiveNode>,
    stats: ArchiveStats,
}

#[derive(Default)]
struct NodeBuilder {
    path: String,
    is_dir: bool,
    size: u64,
    children: BTreeMap<String, NodeBuilder>,
}

impl NodeBuilder {
    fn finish(self, name: String) -> ArchiveNode {
        let is_dir = self.is_dir || !self.children.is_empty();
        let mut children: Vec<ArchiveNode> = self
            .children
            .into_iter()
            .map(|(name, child)| child.finish(name))
            .collect();
        children.sort_by(compare_nodes);
        ArchiveNode { name, path: self.path, is_dir, size: self.size, children }
    }
}

/// Directories first, then by name ignoring case (exact name breaks ties).
fn compare_nodes(a: &ArchiveNode, b: &ArchiveNode) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

impl ArchiveTree {
    /// Build from the provider's flat list. Intermediate directories missing
    /// from the list are synthesized; a node with children is a directory
    /// whatever its entry says.
    pub fn build(entries: &[ArchiveEntry]) -> Self {
        let mut root = NodeBuilder::default();
        let mut stats = ArchiveStats::default();

        for entry in entries {
            if entry.is_directory {
                stats.directories += 1;
            } else {
                stats.files += 1;
            }
            stats.total_size += entry.size;

            let parts: Vec<&str> = entry.path.split('/').filter(|p| !p.is_empty()).collect();
            let mut current = &mut root;
            for (i, part) in parts.iter().enumerate() {
                let path = parts[..=i].join("/");
                current = current
                    .children
                    .entry(part.to_string())
                    .or_insert_with(|| NodeBuilder { path, ..NodeBuilder::default() });
            }
            if !parts.is_empty() {
                current.is_dir |= entry.is_directory;
                current.size = entry.size;
            }
        }

        let ArchiveNode { children: roots, .. } = root.finish(String::new());
        Self { roots, stats }
    }

    pub fn roots(&self) -> &[ArchiveNode] {
        &self.roots
    }

    pub fn stats(&self) -> ArchiveStats {
        self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn find(&self, path: &str) -> Option<&ArchiveNode> {
        let path = path.trim_matches('/');
        let mut nodes = &self.roots;
        let mut found = None;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let node = nodes.iter().find(|n| n.name == part)?;
            nodes = &node.children;
            found = Some(node);
        }
        found
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.find(path).is_some_and(|n| n.is_dir)
    }

    /// Flatten the tree, descending only into expanded directories.
    pub fn visible_rows(&self, expanded: &BTreeSet<String>) -> Vec<TreeRow<'_>> {
        let mut rows = Vec::new();
        collect_rows(&self.roots, 0, &|node: &ArchiveNode| expanded.contains(&node.path), &mut rows);
        rows
    }

    /// Every node, as if all directories were expanded.
    pub fn all_rows(&self) -> Vec<TreeRow<'_>> {
        let mut rows = Vec::new();
        collect_rows(&self.roots, 0, &|_: &ArchiveNode| true, &mut rows);
        rows
    }

    /// Paths of every directory, e.g. for "expand all".
    pub fn directory_paths(&self) -> BTreeSet<String> {
        self.all_rows()
            .into_iter()
            .filter(|r| r.is_dir)
            .map(|r| r.path.to_string())
            .collect()
    }
}

fn collect_rows<'a>(
    nodes: &'a [ArchiveNode],
    depth: usize,
    is_expanded: &dyn Fn(&ArchiveNode) -> bool,
    rows: &mut Vec<TreeRow<'a>>,
) {
    for node in nodes {
        let expanded = node.is_dir && is_expanded(node);
        rows.push(TreeRow {
            depth,
            name: &node.name,
            path: &node.path,
            is_dir: node.is_dir,
            size: node.size,
            expanded,
        });
        if expanded {
            collect_rows(&node.children, depth + 1, is_expanded, rows);
        }
    }
}

impl std::fmt::Display for TreeRow<'_> {
    /// `  name/` for directories, `  name  1.20 KB` for files.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let indent = "  ".repeat(self.depth);
        if self.is_dir {
            write!(f, "{indent}{}/", self.name)
        } else {
            write!(f, "{indent}{}  {}", self.name, format_size(self.size))
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Destructive action waiting for the user's go-ahead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    ExtractAll,
    ExtractFile { path: String },
}

impl PendingAction {
    pub fn prompt(&self) -> String {
        match self {
            Self::ExtractAll => "Extract all files?".to_string(),
            Self::ExtractFile { path } => format!("Extract {path}?"),
        }
    }

    fn into_command(self) -> ViewCommand {
        match self {
            Self::ExtractAll => ViewCommand::ExtractAll { request_id: None },
            Self::ExtractFile { path } => ViewCommand::ExtractFile { entry_path: path, request_id: None },
        }
    }
}

pub struct ArchiveSession {
    file: PathBuf,
    confirm_extract_all: bool,

    tree: ArchiveTree,
    expanded: BTreeSet<String>,
    selected: Option<String>,
    local_query: String,
    search_query: Option<String>,
    search_results: Option<ArchiveTree>,
    preview: Option<(String, PreviewContent)>,
    pending: Option<PendingAction>,
    requests: RequestTracker,

    status: String,
    banner: Option<String>,
}

impl ArchiveSession {
    pub fn new(file: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            file: file.into(),
            confirm_extract_all: settings.confirm_extract_all,
            tree: ArchiveTree::default(),
            expanded: BTreeSet::new(),
            selected: None,
            local_query: String::new(),
            search_query: None,
            search_results: None,
            preview: None,
            pending: None,
            requests: RequestTracker::new(),
            status: String::new(),
            banner: None,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn tree(&self) -> &ArchiveTree {
        &self.tree
    }

    pub fn expanded(&self) -> &BTreeSet<String> {
        &self.expanded
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn preview(&self) -> Option<(&str, &PreviewContent)> {
        self.preview.as_ref().map(|(path, content)| (path.as_str(), content))
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn search_results(&self) -> Option<&ArchiveTree> {
        self.search_results.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.requests.any_loading()
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

    pub fn request_refresh(&mut self) -> ViewCommand {
        let id = self.requests.issue(Channel::Entries);
        self.status = "Loading...".to_string();
        ViewCommand::Refresh { request_id: Some(id) }
    }

    /// Rows to display: the search results when a remote search is active,
    /// else the archive tree, narrowed by the local filter.
    pub fn visible_rows(&self) -> Vec<TreeRow<'_>> {
        let tree = self.search_results.as_ref().unwrap_or(&self.tree);
        let rows = tree.visible_rows(&self.expanded);
        if self.local_query.is_empty() {
            return rows;
        }
        rows.into_iter()
            .filter(|r| {
                r.name.to_lowercase().contains(&self.local_query)
                    || r.path.to_lowercase().contains(&self.local_query)
            })
            .collect()
    }

    /// Expand or collapse a directory. Returns whether it is now expanded.
    pub fn toggle(&mut self, path: &str) -> Result<bool> {
        let path = path.trim_matches('/');
        if !self.current_tree().is_dir(path) {
            return self.report(Err(EngineError::UserInput(format!("'{path}' is not a directory"))));
        }
        let expanded = if self.expanded.remove(path) {
            false
        } else {
            self.expanded.insert(path.to_string());
            true
        };
        log::debug!("{} {path}", if expanded { "expand" } else { "collapse" });
        Ok(expanded)
    }

    /// Expand every directory of the tree on display. Returns how many were
    /// newly expanded.
    pub fn expand_all(&mut self) -> usize {
        let dirs = self.current_tree().directory_paths();
        let before = self.expanded.len();
        self.expanded.extend(dirs);
        self.expanded.len() - before
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Click on a row: directories toggle, files are selected and previewed.
    pub fn select(&mut self, path: &str) -> Result<Option<ViewCommand>> {
        let path = path.trim_matches('/');
        let Some(node) = self.current_tree().find(path) else {
            return self.report(Err(EngineError::UserInput(format!("no entry '{path}' in the archive"))));
        };
        if node.is_dir {
            self.toggle(path)?;
            return Ok(None);
        }
        self.selected = Some(path.to_string());
        let id = self.requests.issue(Channel::Preview);
        self.status = format!("Loading preview of {path}...");
        Ok(Some(ViewCommand::PreviewFile { entry_path: path.to_string(), request_id: Some(id) }))
    }

    /// Instant, local narrowing of the visible rows. Returns how many remain.
    pub fn search_local(&mut self, query: &str) -> usize {
        self.local_query = query.trim().to_lowercase();
        self.visible_rows().len()
    }

    /// Search entry names on the provider side.
    pub fn search(&mut self, query: &str) -> Result<ViewCommand> {
        let query = query.trim();
        if query.is_empty() {
            return self.report(Err(EngineError::UserInput("enter a search query".into())));
        }
        self.search_query = Some(query.to_string());
        let id = self.requests.issue(Channel::Search);
        self.status = format!("Searching for '{query}'...");
        Ok(ViewCommand::Search {
            query: query.to_string(),
            options: SearchOptions::default(),
            request_id: Some(id),
        })
    }

    /// Back to the full tree after a remote search.
    pub fn clear_search(&mut self) {
        self.requests.cancel(Channel::Search);
        self.search_query = None;
        self.search_results = None;
    }

    /// Extract everything, after confirmation when the settings ask for it.
    pub fn request_extract_all(&mut self) -> Option<ViewCommand> {
        if self.confirm_extract_all {
            self.stage(PendingAction::ExtractAll);
            None
        } else {
            self.status = "Extracting all files...".to_string();
            Some(PendingAction::ExtractAll.into_command())
        }
    }

    /// Extract one entry; always needs confirmation.
    pub fn request_extract_file(&mut self, path: &str) -> Result<()> {
        let path = path.trim_matches('/');
        if self.current_tree().find(path).is_none() {
            return self.report(Err(EngineError::UserInput(format!("no entry '{path}' in the archive"))));
        }
        self.stage(PendingAction::ExtractFile { path: path.to_string() });
        Ok(())
    }

    fn stage(&mut self, action: PendingAction) {
        if let Some(previous) = self.pending.replace(action) {
            log::debug!("pending {previous:?} replaced");
        }
        if let Some(pending) = &self.pending {
            self.status = pending.prompt();
        }
    }

    /// Go ahead with the pending action.
    pub fn confirm(&mut self) -> Option<ViewCommand> {
        let Some(action) = self.pending.take() else {
            log::debug!("confirm without a pending action ignored");
            return None;
        };
        self.status = match &action {
            PendingAction::ExtractAll => "Extracting all files...".to_string(),
            PendingAction::ExtractFile { path } => format!("Extracting {path}..."),
        };
        Some(action.into_command())
    }

    pub fn cancel(&mut self) -> bool {
        let cancelled = self.pending.take().is_some();
        if cancelled {
            self.status = "Cancelled".to_string();
        }
        cancelled
    }

    fn current_tree(&self) -> &ArchiveTree {
        self.search_results.as_ref().unwrap_or(&self.tree)
    }

    // ========================================================================
    // Provider events
    // ========================================================================

    pub fn handle_message(&mut self, line: &str) -> Result<()> {
        match HostEvent::parse(line) {
            Ok(event) => self.handle_event(event),
            Err(e) => {
                self.requests.resolve_error(None);
                self.report(Err(e.into()))
            }
        }
    }

    pub fn handle_event(&mut self, event: HostEvent) -> Result<()> {
        if let HostEvent::Error { message, request_id } = &event {
            return match self.requests.resolve_error(*request_id) {
                ErrorScope::Stale => Ok(()),
                _ => self.report(Err(EngineError::Source(message.clone()))),
            };
        }

        let Some(channel) = Channel::for_event(&event) else {
            return Ok(());
        };
        if !matches!(channel, Channel::Entries | Channel::Preview | Channel::Search) {
            log::warn!("ignoring {} event in an archive viewer", event.name());
            return Ok(());
        }
        if !self.requests.accept(channel, event.request_id()) {
            return Ok(());
        }

        match event {
            HostEvent::ArchiveEntries { data, .. } => {
                self.tree = ArchiveTree::build(&data);
                let tree = &self.tree;
                self.expanded.retain(|path| tree.is_dir(path));
                if self.selected.as_deref().is_some_and(|p| tree.find(p).is_none()) {
                    self.selected = None;
                    self.preview = None;
                }
                let stats = tree.stats();
                self.status = format!(
                    "{} file(s), {} director(ies), {}",
                    stats.files,
                    stats.directories,
                    format_size(stats.total_size)
                );
            }
            HostEvent::SearchResults { data, .. } => {
                let entries = match data {
                    SearchResultsPayload::Archive(entries) => entries,
                    SearchResultsPayload::Tensor(results) => {
                        if !results.is_empty() {
                            log::warn!("tensor search results in an archive viewer ignored");
                        }
                        Vec::new()
                    }
                };
                self.status = format!("Found {} match(es)", entries.len());
                self.search_results = Some(ArchiveTree::build(&entries));
            }
            HostEvent::FilePreview { path, content, .. } => {
                self.status = path.clone();
                self.preview = Some((path, content));
            }
            _ => {}
        }
        Ok(())
    }

    // ========================================================================
    // Persisted viewer state
    // ========================================================================

    pub fn viewer_state(&self) -> ViewerState {
        ViewerState {
            file: self.file.clone(),
            selected_key: self.selected.clone(),
            dimension_path: Vec::new(),
            expanded_paths: self.expanded.iter().cloned().collect(),
            search_query: self.search_query.clone(),
        }
    }

    /// Restore expansion and selection. Paths that are not directories of the
    /// loaded tree are dropped (all are kept until a tree has loaded).
    pub fn restore(&mut self, state: ViewerState) {
        if state.file != self.file {
            log::warn!(
                "viewer state for {} does not belong to {}",
                state.file.display(),
                self.file.display()
            );
            return;
        }
        self.expanded = state.expanded_paths.into_iter().collect();
        self.selected = state.selected_key;
        if !self.tree.is_empty() {
            let tree = &self.tree;
            self.expanded.retain(|path| tree.is_dir(path));
        }
    }

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
