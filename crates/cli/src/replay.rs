//! Session replay: drive a `TensorSession` headlessly from a JSONL script.
//!
//! Usage: tlens replay script.jsonl [--file model.npz] [--strict]
//!
//! Every non-empty line is one of
//!
//! - `{"action": "select", "key": "weights"}`: a user operation
//! - `{"event": {"type": "sliceData", ...}}`: a provider message
//!
//! Lines starting with `#` are comments. An event whose `requestId` is the
//! string `"last"` is answered with the token of the most recent tracked
//! command, so scripts do not need to predict token values.
//!
//! Outbound commands are written to stdout, one JSON object per line.
//! Reported errors and `show` output go to stderr.
//!
//! Operations that would drop unsaved edits are held back until a
//! `{"action": "confirm"}` line (or dropped by `{"action": "cancel"}`).

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tensorlens_config::ViewerState;
use tensorlens_core::parse_cell_label;
use tensorlens_engine::{EngineError, SessionOptions, TensorSession};
use tensorlens_protocol::{ChartType, ExportFormat, RequestId, SearchOptions, ViewCommand};

use crate::exit_codes::{engine_exit_code, EXIT_ERROR, EXIT_PARSE, EXIT_PRECONDITION};
use crate::CliError;

/// A user operation in a replay script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    Refresh,
    Select {
        key: String,
    },
    Enter {
        index: usize,
    },
    Back,
    Slice {
        expr: String,
    },
    Edit {
        cell: String,
        value: String,
    },
    Undo,
    Redo,
    Save,
    Search {
        query: String,
        #[serde(default)]
        regex: bool,
        #[serde(default, rename = "caseSensitive")]
        case_sensitive: bool,
    },
    Filter {
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        shape: Option<Vec<usize>>,
        #[serde(default)]
        dtype: Option<String>,
    },
    Plot {
        #[serde(default, rename = "chartType")]
        chart_type: Option<String>,
        #[serde(default, rename = "xAxis")]
        x_axis: Option<usize>,
        #[serde(default, rename = "yAxis")]
        y_axis: Option<usize>,
    },
    Export {
        format: String,
    },
    /// Run the operation held back over unsaved edits.
    Confirm,
    Cancel,
    ClearFilter,
    /// Print the grid window to stderr.
    Show,
}

/// One decoded script line.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptLine {
    Action(Action),
    /// Raw provider message, token placeholder still unresolved.
    Event(Value),
}

/// Summary of a replay run.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub actions: usize,
    pub events: usize,
    pub commands: usize,
    /// Errors reported by the session, with their 1-based script line.
    pub errors: Vec<(usize, EngineError)>,
    pub status: String,
    pub banner: Option<String>,
    /// Viewer state at the end of the run.
    pub state: ViewerState,
}

/// Decode one script line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ScriptLine>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let mut value: Value = serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON: {e}"))?;
    if let Some(event) = value.get_mut("event") {
        return Ok(Some(ScriptLine::Event(event.take())));
    }
    if value.get("action").is_some() {
        let action: Action = serde_json::from_value(value).map_err(|e| format!("invalid action: {e}"))?;
        return Ok(Some(ScriptLine::Action(action)));
    }
    Err("expected an \"action\" or \"event\" line".to_string())
}

/// Replace a `"requestId": "last"` placeholder with the given token.
fn resolve_token(mut event: Value, last: Option<RequestId>) -> Value {
    if let Some(obj) = event.as_object_mut() {
        if obj.get("requestId").and_then(Value::as_str) == Some("last") {
            match last {
                Some(id) => {
                    obj.insert("requestId".into(), Value::from(id));
                }
                None => {
                    obj.remove("requestId");
                }
            }
        }
    }
    event
}

/// Runs a script against a fresh session.
pub struct Replayer<O: Write, E: Write> {
    session: TensorSession,
    out: O,
    err: E,
    last_request: Option<RequestId>,
    report: ReplayReport,
}

impl<O: Write, E: Write> Replayer<O, E> {
    pub fn new(file: &Path, options: SessionOptions, out: O, err: E) -> Self {
        Self {
            session: TensorSession::new(file, options),
            out,
            err,
            last_request: None,
            report: ReplayReport::default(),
        }
    }

    /// Carry a stored viewer state into the session; it is applied when the
    /// script's first listing arrives.
    pub fn with_state(mut self, state: ViewerState) -> Self {
        // Nothing is loaded yet, so restoring never asks for anything here.
        if let Err(e) = self.session.restore(state) {
            log::warn!("could not restore viewer state: {e}");
        }
        self
    }

    /// Execute a whole script. Stops at the first undecodable line or
    /// precondition failure.
    pub fn run(mut self, script: &str) -> Result<ReplayReport, CliError> {
        for (idx, line) in script.lines().enumerate() {
            let line_no = idx + 1;
            let parsed = parse_line(line).map_err(|msg| CliError {
                code: EXIT_PARSE,
                message: format!("line {line_no}: {msg}"),
                hint: None,
            })?;
            let Some(parsed) = parsed else { continue };
            self.step(line_no, parsed)?;
        }
        self.report.status = self.session.status().to_string();
        self.report.banner = self.session.banner().map(str::to_string);
        self.report.state = self.session.viewer_state();
        Ok(self.report)
    }

    fn step(&mut self, line_no: usize, line: ScriptLine) -> Result<(), CliError> {
        let result = match line {
            ScriptLine::Action(action) => {
                self.report.actions += 1;
                self.apply(action)
            }
            ScriptLine::Event(event) => {
                self.report.events += 1;
                let event = resolve_token(event, self.last_request);
                self.session.handle_message(&event.to_string())
            }
        };
        match result {
            Ok(Some(cmd)) => self.emit(&cmd),
            Ok(None) => Ok(()),
            Err(err @ EngineError::Precondition(_)) => Err(CliError {
                code: EXIT_PRECONDITION,
                message: format!("line {line_no}: {err}"),
                hint: None,
            }),
            Err(err) => {
                writeln!(self.err, "line {line_no}: {err}").map_err(io_error)?;
                self.report.errors.push((line_no, err));
                Ok(())
            }
        }
    }

    fn apply(&mut self, action: Action) -> Result<Option<ViewCommand>, EngineError> {
        let s = &mut self.session;
        match action {
            Action::Refresh => Ok(s.request_refresh()),
            Action::Select { key } => s.select_tensor(&key),
            Action::Enter { index } => s.navigate_into(index),
            Action::Back => {
                s.navigate_back();
                Ok(None)
            }
            Action::Slice { expr } => s.apply_slice_expression(&expr),
            Action::Edit { cell, value } => {
                let addr = parse_cell_label(&cell).map_err(|e| EngineError::UserInput(e.to_string()))?;
                s.edit_cell(addr.row, addr.col, &value).map(|_| None)
            }
            Action::Undo => {
                s.undo();
                Ok(None)
            }
            Action::Redo => {
                s.redo();
                Ok(None)
            }
            Action::Save => s.save().map(Some),
            Action::Search { query, regex, case_sensitive } => {
                s.search(&query, SearchOptions { regex, case_sensitive }).map(Some)
            }
            Action::Filter { key, shape, dtype } => s.request_filter(key, shape, dtype).map(Some),
            Action::Plot { chart_type, x_axis, y_axis } => {
                let mut params = s.plot_params().clone();
                if let Some(name) = chart_type {
                    params.chart_type = ChartType::from_name(&name)
                        .ok_or_else(|| EngineError::UserInput(format!("unknown chart type '{name}'")))?;
                }
                params.x_axis = x_axis.unwrap_or(params.x_axis);
                params.y_axis = y_axis.unwrap_or(params.y_axis);
                s.set_plot_params(params)?;
                s.request_plot().map(Some)
            }
            Action::Export { format } => {
                let format = ExportFormat::from_name(&format)
                    .ok_or_else(|| EngineError::UserInput(format!("unknown export format '{format}'")))?;
                s.request_export(format).map(Some)
            }
            Action::Confirm => s.confirm(),
            Action::Cancel => {
                s.cancel();
                Ok(None)
            }
            Action::ClearFilter => {
                s.clear_filter();
                Ok(None)
            }
            Action::Show => {
                let (rows, cols) = (s.options().max_rows, s.options().max_cols);
                let window = s.grid().window(rows, cols);
                write!(self.err, "{window}").map_err(|e| EngineError::Transport(e.to_string()))?;
                Ok(None)
            }
        }
    }

    fn emit(&mut self, cmd: &ViewCommand) -> Result<(), CliError> {
        if let Some(id) = cmd.request_id() {
            self.last_request = Some(id);
        }
        let line = serde_json::to_string(cmd).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: e.to_string(),
            hint: None,
        })?;
        writeln!(self.out, "{line}").map_err(io_error)?;
        self.report.commands += 1;
        Ok(())
    }
}

fn io_error(e: std::io::Error) -> CliError {
    CliError { code: EXIT_ERROR, message: e.to_string(), hint: None }
}

/// Read and replay a script file.
pub fn execute_script<O: Write, E: Write>(
    script_path: &Path,
    file: &Path,
    options: SessionOptions,
    state: Option<ViewerState>,
    out: O,
    err: E,
) -> Result<ReplayReport, CliError> {
    let script = fs::read_to_string(script_path).map_err(|e| CliError {
        code: EXIT_ERROR,
        message: format!("{}: {}", script_path.display(), e),
        hint: None,
    })?;
    let replayer = Replayer::new(file, options, out, err);
    match state {
        Some(state) => replayer.with_state(state).run(&script),
        None => replayer.run(&script),
    }
}

/// Exit code for a finished run in `--strict` mode: the code of the first
/// reported error, if any.
pub fn strict_exit_code(report: &ReplayReport) -> Option<u8> {
    report.errors.first().map(|(_, err)| engine_exit_code(err))
}
