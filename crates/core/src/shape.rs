use std::fmt;

use serde::{Deserialize, Serialize};

/// Extent of each dimension of a tensor.
///
/// Always has at least one dimension and every extent is at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Shape(Vec<usize>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// Zero dimensions.
    Empty,
    /// A dimension with extent 0.
    ZeroExtent { axis: usize },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "shape must have at least one dimension"),
            Self::ZeroExtent { axis } => write!(f, "dimension {axis} has extent 0"),
        }
    }
}

impl std::error::Error for ShapeError {}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Result<Self, ShapeError> {
        if dims.is_empty() {
            return Err(ShapeError::Empty);
        }
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(ShapeError::ZeroExtent { axis });
        }
        Ok(Self(dims))
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.0.get(axis).copied()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    /// Rank ≥ 3 tensors are browsed one dimension at a time.
    pub fn needs_navigation(&self) -> bool {
        self.rank() >= 3
    }

    /// Number of leading dimensions that must be fixed before a 2D slice
    /// is reachable.
    pub fn navigable_depth(&self) -> usize {
        self.rank().saturating_sub(2)
    }

    /// `2 × 3 × 4`
    pub fn display_dims(dims: &[usize]) -> String {
        dims.iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(" × ")
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Self::display_dims(&self.0))
    }
}

impl TryFrom<Vec<usize>> for Shape {
    type Error = ShapeError;

    fn try_from(dims: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(dims)
    }
}

impl From<Shape> for Vec<usize> {
    fn from(shape: Shape) -> Self {
        shape.0
    }
}
