use std::fmt;

use tensorlens_protocol::ProtocolError;

/// Everything a viewer operation can fail with, grouped by who is at fault.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Bad or missing input from the user (empty query, no tensor selected, ...).
    /// The operation is aborted and nothing changes.
    UserInput(String),
    /// The data source answered with an error (bad slice, save rejected, ...).
    Source(String),
    /// An internal invariant did not hold, so the request was never sent.
    Precondition(String),
    /// The collaborator could not be reached or sent something unreadable.
    Transport(String),
}

impl EngineError {
    /// Whether the viewer stays usable and the user may simply retry.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Precondition(_))
    }

    /// Errors shown in the banner rather than only the status line.
    pub fn wants_banner(&self) -> bool {
        !matches!(self, Self::UserInput(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::UserInput(msg)
            | Self::Source(msg)
            | Self::Precondition(msg)
            | Self::Transport(msg) => msg,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserInput(msg) => write!(f, "{msg}"),
            Self::Source(msg) => write!(f, "{msg}"),
            Self::Precondition(msg) => write!(f, "internal error: {msg}"),
            Self::Transport(msg) => write!(f, "connection error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ProtocolError> for EngineError {
    fn from(err: ProtocolError) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
