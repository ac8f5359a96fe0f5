// Configuration loading

pub mod settings;
pub mod viewer_state;

pub use settings::Settings;
pub use viewer_state::ViewerState;

use std::path::PathBuf;

/// Root directory for all TensorLens configuration files.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tensorlens")
}
