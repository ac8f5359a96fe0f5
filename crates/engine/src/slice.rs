//! Slice specifications: one token per axis, a fixed index or `:` for all.

use std::fmt;
use std::str::FromStr;

use tensorlens_core::Shape;
use tensorlens_protocol::{RequestId, ViewCommand};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceToken {
    Index(usize),
    All,
}

impl SliceToken {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for SliceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::All => f.write_str(":"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceError {
    Empty,
    InvalidToken { position: usize, token: String },
    RankMismatch { expected: usize, found: usize },
    IndexOutOfRange { axis: usize, index: usize, extent: usize },
}

impl fmt::Display for SliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "slice expression is empty"),
            Self::InvalidToken { position, token } => {
                write!(f, "token {} ('{token}') must be a non-negative integer or ':'", position + 1)
            }
            Self::RankMismatch { expected, found } => {
                write!(f, "expected {expected} slice token(s), one per dimension, found {found}")
            }
            Self::IndexOutOfRange { axis, index, extent } => {
                write!(f, "index {index} is out of range for dimension {axis} (size {extent})")
            }
        }
    }
}

impl std::error::Error for SliceError {}

/// Parsed form of the `slice` string sent to the data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceSpec(Vec<SliceToken>);

impl SliceSpec {
    pub fn new(tokens: Vec<SliceToken>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[SliceToken] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Axes kept whole, i.e. the rank of the returned sub-view.
    pub fn result_rank(&self) -> usize {
        self.0.iter().filter(|t| t.is_all()).count()
    }

    /// Check token count and fixed indices against a tensor shape.
    pub fn validate_against(&self, shape: &Shape) -> Result<(), SliceError> {
        if self.len() != shape.rank() {
            return Err(SliceError::RankMismatch { expected: shape.rank(), found: self.len() });
        }
        for (axis, (token, &extent)) in self.0.iter().zip(shape.dims()).enumerate() {
            if let SliceToken::Index(index) = *token {
                if index >= extent {
                    return Err(SliceError::IndexOutOfRange { axis, index, extent });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

impl FromStr for SliceSpec {
    type Err = SliceError;

    /// Whitespace around tokens is ignored: `0, :, :` is `0,:,:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(SliceError::Empty);
        }
        s.split(',')
            .enumerate()
            .map(|(position, raw)| {
                let token = raw.trim();
                if token == ":" {
                    Ok(SliceToken::All)
                } else {
                    token
                        .parse::<usize>()
                        .map(SliceToken::Index)
                        .map_err(|_| SliceError::InvalidToken { position, token: token.to_string() })
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// The dimension path plus two trailing wildcards.
///
/// The path stack never lets this mismatch; if it does anyway the request
/// must not be sent, so the mismatch comes back as a precondition error.
pub fn build_slice_spec(path: &[usize], shape: &Shape) -> Result<SliceSpec, EngineError> {
    if path.len() + 2 != shape.rank() {
        return Err(EngineError::Precondition(format!(
            "slice for a rank-{} tensor needs {} fixed indices, path has {}",
            shape.rank(),
            shape.navigable_depth(),
            path.len()
        )));
    }
    let mut tokens: Vec<SliceToken> = path.iter().copied().map(SliceToken::Index).collect();
    tokens.extend([SliceToken::All, SliceToken::All]);
    Ok(SliceSpec(tokens))
}

/// Slice fetch addressed to one tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRequest {
    pub key: String,
    pub spec: SliceSpec,
}

impl SliceRequest {
    pub fn new(key: impl Into<String>, spec: SliceSpec) -> Self {
        Self { key: key.into(), spec }
    }

    pub fn into_command(self, request_id: Option<RequestId>) -> ViewCommand {
        ViewCommand::Slice { key: self.key, slice: self.spec.to_string(), request_id }
    }
}
