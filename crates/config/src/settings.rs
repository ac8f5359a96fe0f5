// Application settings
// Loaded from ~/.config/tensorlens/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Interpreter
    #[serde(rename = "python.path")]
    pub python_path: String,  // empty = auto-detect

    // Preview window
    #[serde(rename = "preview.maxRows")]
    pub max_rows: usize,

    #[serde(rename = "preview.maxCols")]
    pub max_cols: usize,

    #[serde(rename = "preview.maxElements")]
    pub max_preview_elements: usize,

    // Editing
    #[serde(rename = "history.limit")]
    pub history_limit: usize,

    // Plotting
    #[serde(rename = "plot.defaultChartType")]
    pub default_chart_type: String,

    // Archives
    #[serde(rename = "archive.confirmExtractAll")]
    pub confirm_extract_all: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            python_path: String::new(),
            max_rows: 100,
            max_cols: 20,
            max_preview_elements: 10_000,
            history_limit: 100,
            default_chart_type: "line".to_string(),
            confirm_extract_all: true,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        crate::config_dir().join("settings.json")
    }

    /// Load settings from the default location, creating it on first run
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load settings from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings.normalized(),
                Err(e) => {
                    log::warn!("Error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON, ignoring full-line `//` comments
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Clamp values that would make the viewer unusable
    fn normalized(mut self) -> Self {
        self.history_limit = self.history_limit.max(1);
        self.max_rows = self.max_rows.max(1);
        self.max_cols = self.max_cols.max(1);
        self.max_preview_elements = self.max_preview_elements.max(1);
        self
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Python interpreter used to read tensor files ("" = auto-detect)
    "python.path": "",

    // Grid preview window
    "preview.maxRows": 100,
    "preview.maxCols": 20,
    "preview.maxElements": 10000,

    // Undo history size (cell edits)
    "history.limit": 100,

    // Chart type preselected in the plot dialog
    // Options: "line", "bar", "scatter", "heatmap", "histogram", "box", "image"
    "plot.defaultChartType": "line",

    // Ask before extracting a whole archive
    "archive.confirmExtractAll": true
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            log::warn!("Error writing default settings.json: {}", e);
        }
    }
}
