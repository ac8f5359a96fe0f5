use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Per-file viewer state, restored when the same file is reopened.
///
/// Stored separately for each document under `viewers/<hash>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerState {
    pub file: PathBuf,
    pub selected_key: Option<String>,
    pub dimension_path: Vec<usize>,
    pub expanded_paths: Vec<String>,
    pub search_query: Option<String>,
}

impl ViewerState {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into(), ..Self::default() }
    }

    /// Get the viewer-state directory
    pub fn viewers_dir() -> PathBuf {
        crate::config_dir().join("viewers")
    }

    /// Hash a path to create a unique filename
    fn hash_path(path: &Path) -> String {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    fn state_path(dir: &Path, file: &Path) -> PathBuf {
        dir.join(format!("{}.json", Self::hash_path(file)))
    }

    /// Load state for a document from `dir`
    pub fn load_in(dir: &Path, file: &Path) -> Option<Self> {
        let path = Self::state_path(dir, file);
        let state: Self = fs::read_to_string(&path).ok()
            .and_then(|s| serde_json::from_str(&s).ok())?;
        // Hash collision or a moved config dir: never hand back another file's state.
        (state.file == file).then_some(state)
    }

    pub fn load(file: &Path) -> Option<Self> {
        Self::load_in(&Self::viewers_dir(), file)
    }

    /// Save state into `dir`
    pub fn save_in(&self, dir: &Path) -> Result<(), String> {
        fs::create_dir_all(dir).map_err(|e| e.to_string())?;

        let path = Self::state_path(dir, &self.file);
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(&path, json).map_err(|e| e.to_string())
    }

    pub fn save(&self) -> Result<(), String> {
        self.save_in(&Self::viewers_dir())
    }
}
