//! TensorLens viewer protocol - JSON wire format
//!
//! This crate defines the message types exchanged between a viewer panel and
//! its editor-provider collaborator. Every message is a single JSON object:
//!
//! - viewer → provider: [`ViewCommand`], discriminated by `"command"`
//! - provider → viewer: [`HostEvent`], discriminated by `"type"`
//!
//! Field names are camelCase on the wire. Every request may carry an optional
//! `requestId`; providers echo it on the matching response so the viewer can
//! drop stale replies. Providers that do not echo it are still understood.
//!
//! # Usage
//!
//! ```ignore
//! use tensorlens_protocol::{HostEvent, ViewCommand};
//!
//! let cmd = ViewCommand::Slice { key: "w".into(), slice: "0,:,:".into(), request_id: Some(7) };
//! let json = cmd.to_json()?;
//!
//! let event = HostEvent::parse(&line)?;
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use tensorlens_core::Shape;

/// Identifier attached to an outbound request and echoed by its response.
pub type RequestId = u64;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Not valid JSON, or the JSON does not match the message shape.
    Malformed(String),
    /// Valid JSON object without a recognised discriminator.
    UnknownMessage(String),
    /// Well-formed message whose payload breaks a contract rule.
    InvalidPayload(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed message: {msg}"),
            Self::UnknownMessage(kind) => write!(f, "unknown message type: {kind}"),
            Self::InvalidPayload(msg) => write!(f, "invalid payload: {msg}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

// =============================================================================
// Viewer → Provider Commands
// =============================================================================

/// Messages sent from the viewer panel to the editor provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ViewCommand {
    /// Reload the document from disk.
    Refresh {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    /// Search tensor keys and values.
    Search {
        query: String,
        #[serde(default)]
        options: SearchOptions,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    /// Ask the provider for tensors matching the criteria.
    Filter {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shape: Option<Vec<usize>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dtype: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    /// Prepare chart data for one tensor.
    Plot {
        key: String,
        params: PlotParams,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    /// Write one tensor out in another format.
    Export {
        format: ExportFormat,
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    /// Fetch a sub-view; `slice` is a comma-separated token list, one token
    /// per dimension, each a non-negative integer or `:`.
    Slice {
        key: String,
        slice: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    /// Persist edited cells. Row and column are 1-based.
    SaveEdits {
        key: String,
        changes: Vec<CellChange>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    ExtractAll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    ExtractFile {
        entry_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    PreviewFile {
        entry_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    InstallDependency,
    CheckDependencies {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    OpenSettings,
}

impl ViewCommand {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Refresh { .. } => "refresh",
            Self::Search { .. } => "search",
            Self::Filter { .. } => "filter",
            Self::Plot { .. } => "plot",
            Self::Export { .. } => "export",
            Self::Slice { .. } => "slice",
            Self::SaveEdits { .. } => "saveEdits",
            Self::ExtractAll { .. } => "extractAll",
            Self::ExtractFile { .. } => "extractFile",
            Self::PreviewFile { .. } => "previewFile",
            Self::InstallDependency => "installDependency",
            Self::CheckDependencies { .. } => "checkDependencies",
            Self::OpenSettings => "openSettings",
        }
    }

    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Refresh { request_id }
            | Self::Search { request_id, .. }
            | Self::Filter { request_id, .. }
            | Self::Plot { request_id, .. }
            | Self::Export { request_id, .. }
            | Self::Slice { request_id, .. }
            | Self::SaveEdits { request_id, .. }
            | Self::ExtractAll { request_id }
            | Self::ExtractFile { request_id, .. }
            | Self::PreviewFile { request_id, .. }
            | Self::CheckDependencies { request_id } => *request_id,
            Self::InstallDependency | Self::OpenSettings => None,
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Parse a command as received by the provider side.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let value = parse_object(line, "command", COMMAND_NAMES)?;
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

const COMMAND_NAMES: &[&str] = &[
    "refresh", "search", "filter", "plot", "export", "slice", "saveEdits",
    "extractAll", "extractFile", "previewFile", "installDependency",
    "checkDependencies", "openSettings",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// One edited cell in a save batch (1-based coordinates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChange {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Line,
    Bar,
    Scatter,
    Heatmap,
    Histogram,
    Box,
    Image,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Scatter => "scatter",
            Self::Heatmap => "heatmap",
            Self::Histogram => "histogram",
            Self::Box => "box",
            Self::Image => "image",
        }
    }

    /// Parse a chart name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "line" => Some(Self::Line),
            "bar" => Some(Self::Bar),
            "scatter" => Some(Self::Scatter),
            "heatmap" => Some(Self::Heatmap),
            "histogram" => Some(Self::Histogram),
            "box" => Some(Self::Box),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorScheme {
    #[default]
    Viridis,
    Plasma,
    Blues,
    Reds,
    Greens,
}

/// Chart configuration chosen in the plot dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotParams {
    pub chart_type: ChartType,
    pub x_axis: usize,
    pub y_axis: usize,
    pub show_legend: bool,
    pub show_grid: bool,
    pub color_scheme: ColorScheme,
}

impl Default for PlotParams {
    fn default() -> Self {
        Self {
            chart_type: ChartType::Line,
            x_axis: 0,
            y_axis: 1,
            show_legend: true,
            show_grid: true,
            color_scheme: ColorScheme::Viridis,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Npy,
    Csv,
    Json,
    Txt,
    Png,
}

impl ExportFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "npy" => Some(Self::Npy),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "txt" => Some(Self::Txt),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

// =============================================================================
// Provider → Viewer Events
// =============================================================================

/// Messages sent from the editor provider to the viewer panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostEvent {
    TensorData {
        data: TensorListing,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    SearchResults {
        data: SearchResultsPayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    FilteredData {
        data: TensorListing,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    SliceData {
        data: SlicePayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    PlotData {
        data: PlotData,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    SaveResponse {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modified: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    DependencyStatus {
        data: DependencyStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    ArchiveEntries {
        data: Vec<ArchiveEntry>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    FilePreview {
        path: String,
        content: PreviewContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
    },
}

const EVENT_NAMES: &[&str] = &[
    "tensorData", "searchResults", "filteredData", "sliceData", "plotData",
    "saveResponse", "dependencyStatus", "archiveEntries", "filePreview", "error",
];

impl HostEvent {
    /// Parse and validate an inbound event.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let value = parse_object(line, "type", EVENT_NAMES)?;
        let event: Self =
            serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TensorData { .. } => "tensorData",
            Self::SearchResults { .. } => "searchResults",
            Self::FilteredData { .. } => "filteredData",
            Self::SliceData { .. } => "sliceData",
            Self::PlotData { .. } => "plotData",
            Self::SaveResponse { .. } => "saveResponse",
            Self::DependencyStatus { .. } => "dependencyStatus",
            Self::ArchiveEntries { .. } => "archiveEntries",
            Self::FilePreview { .. } => "filePreview",
            Self::Error { .. } => "error",
        }
    }

    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::TensorData { request_id, .. }
            | Self::SearchResults { request_id, .. }
            | Self::FilteredData { request_id, .. }
            | Self::SliceData { request_id, .. }
            | Self::PlotData { request_id, .. }
            | Self::SaveResponse { request_id, .. }
            | Self::DependencyStatus { request_id, .. }
            | Self::ArchiveEntries { request_id, .. }
            | Self::FilePreview { request_id, .. }
            | Self::Error { request_id, .. } => *request_id,
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Contract rules serde cannot express.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::TensorData { data, .. } | Self::FilteredData { data, .. } => {
                let mut seen = HashSet::new();
                for tensor in &data.tensors {
                    if tensor.key.is_empty() {
                        return Err(ProtocolError::InvalidPayload("tensor with empty key".into()));
                    }
                    if !seen.insert(tensor.key.as_str()) {
                        return Err(ProtocolError::InvalidPayload(format!(
                            "duplicate tensor key '{}'",
                            tensor.key
                        )));
                    }
                }
                Ok(())
            }
            Self::PlotData { data, .. } => data.data.iter().try_for_each(|series| {
                series.validate(data.chart_type)
            }),
            Self::ArchiveEntries { data, .. } => {
                if data.iter().any(|e| e.path.trim_matches('/').is_empty()) {
                    return Err(ProtocolError::InvalidPayload("archive entry with empty path".into()));
                }
                Ok(())
            }
            Self::FilePreview { path, .. } if path.is_empty() => {
                Err(ProtocolError::InvalidPayload("file preview without path".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Check the outer object and its discriminator before handing it to serde,
/// so that unknown message kinds are told apart from malformed ones.
fn parse_object(line: &str, tag: &str, known: &[&str]) -> Result<Value, ProtocolError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let kind = value
        .get(tag)
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed(format!("missing \"{tag}\" field")))?;
    if !known.contains(&kind) {
        return Err(ProtocolError::UnknownMessage(kind.to_string()));
    }
    Ok(value)
}

// =============================================================================
// Event Payloads
// =============================================================================

/// Contents of a tensor file, or the subset matching a filter.
///
/// Entries are decoded one at a time: an entry the viewer cannot represent
/// (a rank-0 scalar, a zero-extent axis) lands in `skipped` instead of
/// failing the whole listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawListing")]
pub struct TensorListing {
    pub tensors: Vec<TensorEntry>,
    #[serde(default)]
    pub total_size: u64,
    #[serde(skip)]
    pub skipped: Vec<SkippedTensor>,
}

impl TensorListing {
    pub fn new(tensors: Vec<TensorEntry>, total_size: u64) -> Self {
        Self { tensors, total_size, skipped: Vec::new() }
    }
}

/// A listing entry that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTensor {
    pub key: Option<String>,
    pub reason: String,
}

impl fmt::Display for SkippedTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} ({})", key, self.reason),
            None => write!(f, "<unnamed> ({})", self.reason),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListing {
    tensors: Vec<Value>,
    #[serde(default)]
    total_size: u64,
}

impl From<RawListing> for TensorListing {
    fn from(raw: RawListing) -> Self {
        let mut listing = TensorListing::new(Vec::with_capacity(raw.tensors.len()), raw.total_size);
        for value in raw.tensors {
            let key = value.get("key").and_then(Value::as_str).map(str::to_string);
            match serde_json::from_value::<TensorEntry>(value) {
                Ok(entry) => listing.tensors.push(entry),
                Err(e) => listing.skipped.push(SkippedTensor { key, reason: e.to_string() }),
            }
        }
        listing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorEntry {
    pub key: String,
    pub info: TensorInfo,
    /// Leading rows/columns, present for small or low-rank tensors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorInfo {
    pub shape: Shape,
    pub dtype: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
}

/// Search hits: per-tensor matches, or matching entries when searching an
/// archive. An empty list decodes as `Tensor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchResultsPayload {
    Tensor(Vec<SearchResult>),
    Archive(Vec<ArchiveEntry>),
}

impl SearchResultsPayload {
    pub fn match_count(&self) -> usize {
        match self {
            Self::Tensor(results) => results.iter().map(|r| r.matches.len()).sum(),
            Self::Archive(entries) => entries.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub key: String,
    pub matches: Vec<SearchMatch>,
    /// Matches found before the provider truncated `matches`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_matches: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub position: MatchPosition,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Where a match sits: an element index, or a label such as `"key"` for a
/// match on the tensor name or `"(0, 1)"` as the provider prints tuples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchPosition {
    Index(Vec<usize>),
    Label(String),
}

impl fmt::Display for MatchPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(idx) => {
                let parts: Vec<String> = idx.iter().map(usize::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// Either an error report or the sliced values (a scalar, a 1D list or a
/// 2D list of lists; never interpreted beyond display).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlicePayload {
    Failed { error: String },
    Values(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotData {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<ChartType>,
    pub title: String,
    pub data: Vec<PlotSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<PlotLayout>,
}

/// One trace. Grid charts (heatmap, image) carry `z`; the others carry `y`
/// and optionally `x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<Vec<Vec<f64>>>,
}

impl PlotSeries {
    fn validate(&self, chart: Option<ChartType>) -> Result<(), ProtocolError> {
        let grid = matches!(chart, Some(ChartType::Heatmap | ChartType::Image));
        match (&self.y, &self.z) {
            (_, None) if grid => {
                return Err(ProtocolError::InvalidPayload(format!(
                    "series '{}': grid chart without z values",
                    self.name
                )))
            }
            (None, _) if chart.is_some() && !grid => {
                return Err(ProtocolError::InvalidPayload(format!(
                    "series '{}': no y values",
                    self.name
                )))
            }
            (None, None) => {
                return Err(ProtocolError::InvalidPayload(format!(
                    "series '{}': no y or z values",
                    self.name
                )))
            }
            _ => {}
        }
        if let (Some(x), Some(y)) = (&self.x, &self.y) {
            if x.len() != y.len() {
                return Err(ProtocolError::InvalidPayload(format!(
                    "series '{}': {} x values for {} y values",
                    self.name,
                    x.len(),
                    y.len()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<AxisTitle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<AxisTitle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisTitle {
    pub title: String,
}

/// Availability of the external tools the provider shells out to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DependencyStatus {
    pub python: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    pub numpy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numpy_version: Option<String>,
    pub torch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torch_version: Option<String>,
    pub seven_zip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seven_zip_version: Option<String>,
}

impl DependencyStatus {
    /// Array files (.npy/.npz) can be opened.
    pub fn arrays_available(&self) -> bool {
        self.python && self.numpy
    }

    /// Names of missing required tools, most fundamental first.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.python {
            missing.push("python");
        }
        if !self.numpy {
            missing.push("numpy");
        }
        missing
    }
}

/// One file or directory record inside an archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PreviewContent {
    Text {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
    },
    /// `content` is a data URL or base64 body.
    Image {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
    },
    Binary {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
    },
}
