//! Tensor navigation and grid editing engine.
//!
//! Everything here is synchronous and single-threaded: sessions turn user
//! operations into protocol commands and apply the provider's events.

pub mod archive;
pub mod error;
pub mod format;
pub mod grid;
pub mod history;
pub mod navigation;
pub mod requests;
pub mod save;
pub mod session;
pub mod slice;

pub use archive::{ArchiveSession, ArchiveTree, PendingAction, TreeRow};
pub use error::{EngineError, Result};
pub use grid::SliceGrid;
pub use history::{EditAction, EditHistory, SaveMark};
pub use navigation::{Descent, DimensionPath, NavState};
pub use requests::{Channel, RequestTracker};
pub use save::{SaveCoordinator, SaveOutcome};
pub use session::{PendingDiscard, SessionOptions, SidebarView, TensorSession};
pub use slice::{build_slice_spec, SliceSpec, SliceToken};
