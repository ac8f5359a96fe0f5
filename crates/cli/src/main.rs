// TensorLens CLI - headless navigation, slicing and session replay

mod exit_codes;
mod logger;
mod replay;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tensorlens_config::{Settings, ViewerState};
use tensorlens_core::{cell_label, column_label, label_to_column, Shape};
use tensorlens_engine::slice::SliceError;
use tensorlens_engine::{build_slice_spec, ArchiveTree, EngineError, SessionOptions};
use tensorlens_protocol::{ArchiveEntry, HostEvent};

use exit_codes::{engine_exit_code, EXIT_ERROR, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "tlens")]
#[command(about = "Navigate tensors, build slices and replay viewer sessions (headless)")]
#[command(version)]
struct Cli {
    /// Log engine state transitions to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spreadsheet label for a 0-based column index
    #[command(after_help = "\
Examples:
  tlens label 0           # A
  tlens label 27          # AB
  tlens label 27 --row 10 # AB10")]
    Label {
        /// 0-based column index
        col: usize,

        /// 1-based row number; prints a cell label instead
        #[arg(long)]
        row: Option<usize>,
    },

    /// 0-based column index for a letter label
    Column {
        /// Column letters, e.g. AA
        label: String,
    },

    /// Slice expression for a dimension path
    #[command(after_help = "\
Examples:
  tlens slice --shape 2,3,4,5 --path 1,2   # 1,2,:,:
  tlens slice --shape 4,5                  # :,:")]
    Slice {
        /// Tensor shape, comma-separated
        #[arg(long, value_delimiter = ',', required = true)]
        shape: Vec<usize>,

        /// Fixed indices of the leading dimensions, comma-separated
        #[arg(long, value_delimiter = ',')]
        path: Vec<usize>,
    },

    /// Render an archive listing as a tree
    Tree {
        /// JSON file with an entry array or an archiveEntries message
        entries: PathBuf,

        /// Show every directory's contents, not just the top level
        #[arg(long)]
        expand_all: bool,
    },

    /// Drive a tensor session from a JSONL script
    #[command(after_help = "\
Script lines:
  {\"action\": \"refresh\"}
  {\"event\": {\"type\": \"tensorData\", \"requestId\": \"last\", \"data\": {...}}}
  {\"action\": \"enter\", \"index\": 1}
  {\"action\": \"edit\", \"cell\": \"B2\", \"value\": \"4.5\"}
  {\"action\": \"save\"}
  {\"action\": \"confirm\"}   # run an operation held back over unsaved edits

Outbound commands are printed to stdout as JSONL.")]
    Replay {
        /// Script file (JSONL)
        script: PathBuf,

        /// Document path the session reports (defaults to the script path)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Settings file (defaults to the user settings, if present)
        #[arg(long, env = "TENSORLENS_SETTINGS")]
        settings: Option<PathBuf>,

        /// Restore the viewer state stored for the file and store it again afterwards
        #[arg(long)]
        keep_state: bool,

        /// Directory for stored viewer states (implies --keep-state)
        #[arg(long, value_name = "DIR")]
        state_dir: Option<PathBuf>,

        /// Exit non-zero if the session reported any error
        #[arg(long)]
        strict: bool,

        /// Suppress the summary on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let result = match cli.command {
        Commands::Label { col, row } => cmd_label(col, row),
        Commands::Column { label } => cmd_column(&label),
        Commands::Slice { shape, path } => cmd_slice(shape, &path),
        Commands::Tree { entries, expand_all } => cmd_tree(&entries, expand_all),
        Commands::Replay { script, file, settings, keep_state, state_dir, strict, quiet } => {
            let store = (keep_state || state_dir.is_some()).then_some(StateStore { dir: state_dir });
            cmd_replay(&script, file, settings, store, strict, quiet)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    pub fn engine(err: &EngineError) -> Self {
        Self { code: engine_exit_code(err), message: err.to_string(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// label / column
// ============================================================================

fn cmd_label(col: usize, row: Option<usize>) -> Result<(), CliError> {
    match row {
        None => println!("{}", column_label(col)),
        Some(0) => return Err(CliError::args("rows start at 1")),
        Some(row) => println!("{}", cell_label(row - 1, col)),
    }
    Ok(())
}

fn cmd_column(label: &str) -> Result<(), CliError> {
    let col = label_to_column(label.trim()).map_err(|e| CliError::args(e.to_string()))?;
    println!("{}", col);
    Ok(())
}

// ============================================================================
// slice
// ============================================================================

fn cmd_slice(dims: Vec<usize>, path: &[usize]) -> Result<(), CliError> {
    let shape = Shape::new(dims).map_err(|e| CliError::args(e.to_string()))?;
    let spec = build_slice_spec(path, &shape).map_err(|e| {
        CliError::engine(&e).with_hint(format!(
            "a rank-{} tensor needs a path of {} index(es)",
            shape.rank(),
            shape.navigable_depth()
        ))
    })?;
    spec.validate_against(&shape).map_err(|e| match e {
        SliceError::IndexOutOfRange { .. } => CliError::args(e.to_string()),
        other => CliError::engine(&EngineError::Precondition(other.to_string())),
    })?;
    println!("{}", spec);
    Ok(())
}

// ============================================================================
// tree
// ============================================================================

/// Accepts a bare entry array or a full `archiveEntries` message.
fn read_entries(path: &Path) -> Result<Vec<ArchiveEntry>, CliError> {
    let text = fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| CliError::parse(format!("{}: {}", path.display(), e)))?;
    if value.is_array() {
        return serde_json::from_value(value)
            .map_err(|e| CliError::parse(format!("{}: {}", path.display(), e)));
    }
    match HostEvent::parse(&text) {
        Ok(HostEvent::ArchiveEntries { data, .. }) => Ok(data),
        Ok(other) => Err(CliError::parse(format!("expected archiveEntries, got {}", other.name()))),
        Err(e) => Err(CliError::parse(e.to_string())
            .with_hint("pass an array of entries or an archiveEntries message")),
    }
}

fn cmd_tree(path: &Path, expand_all: bool) -> Result<(), CliError> {
    let entries = read_entries(path)?;
    let tree = ArchiveTree::build(&entries);
    let expanded = if expand_all { tree.directory_paths() } else { Default::default() };
    let rows = tree.visible_rows(&expanded);
    for row in rows {
        println!("{}", row);
    }
    let stats = tree.stats();
    eprintln!(
        "{} file(s), {} director(ies), {}",
        stats.files,
        stats.directories,
        tensorlens_engine::format::format_size(stats.total_size)
    );
    Ok(())
}

// ============================================================================
// replay
// ============================================================================

fn load_settings(path: Option<PathBuf>) -> Settings {
    match path {
        Some(path) => Settings::load_from(&path),
        None => Settings::load(),
    }
}

/// Where replay keeps viewer state: the user config directory unless a
/// directory is given.
struct StateStore {
    dir: Option<PathBuf>,
}

impl StateStore {
    fn load(&self, file: &Path) -> Option<ViewerState> {
        match &self.dir {
            Some(dir) => ViewerState::load_in(dir, file),
            None => ViewerState::load(file),
        }
    }

    fn save(&self, state: &ViewerState) -> Result<(), CliError> {
        let result = match &self.dir {
            Some(dir) => state.save_in(dir),
            None => state.save(),
        };
        result.map_err(|e| CliError::io(format!("could not store viewer state: {e}")))
    }
}

fn cmd_replay(
    script: &Path,
    file: Option<PathBuf>,
    settings: Option<PathBuf>,
    store: Option<StateStore>,
    strict: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let settings = load_settings(settings);
    let file = file.unwrap_or_else(|| script.to_path_buf());
    let stored = store.as_ref().and_then(|store| store.load(&file));
    if stored.is_some() {
        log::info!("restoring viewer state for {}", file.display());
    }
    let report = replay::execute_script(
        script,
        &file,
        SessionOptions::from(&settings),
        stored,
        io::stdout().lock(),
        io::stderr(),
    )?;
    if let Some(store) = &store {
        store.save(&report.state)?;
    }

    if !quiet {
        eprintln!(
            "Replayed {} action(s), {} event(s); sent {} command(s)",
            report.actions, report.events, report.commands
        );
        eprintln!("Status: {}", report.status);
        if let Some(banner) = &report.banner {
            eprintln!("Banner: {}", banner);
        }
    }

    if strict {
        if let Some(code) = replay::strict_exit_code(&report) {
            return Err(CliError {
                code,
                message: format!("{} error(s) during replay", report.errors.len()),
                hint: None,
            });
        }
    }
    Ok(())
}
