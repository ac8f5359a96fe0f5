//! Dimension path stack for tensors of rank 3 and up.
//!
//! The last two axes of a tensor are always shown as a grid. Every axis in
//! front of them is fixed to one index by descending through index-selection
//! layers; once only two axes remain the path is at the leaf and a slice can
//! be requested.

use std::fmt;

use tensorlens_core::Shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Root,
    Navigating { depth: usize },
    LeafReached,
}

/// Result of a successful [`DimensionPath::enter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descent {
    /// Another index-selection layer follows.
    Layer { depth: usize },
    /// The remaining two axes form the grid; fetch the slice.
    Leaf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    /// Navigation only applies to rank >= 3.
    NotNavigable { rank: usize },
    /// The path already fixes every axis it may fix.
    AtLeaf,
    IndexOutOfRange { axis: usize, index: usize, extent: usize },
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotNavigable { rank } => {
                write!(f, "a tensor with {rank} dimension(s) is shown directly; nothing to navigate")
            }
            Self::AtLeaf => write!(f, "already at a 2D slice; go back first"),
            Self::IndexOutOfRange { axis, index, extent } => {
                write!(f, "index {index} is out of range for dimension {axis} (size {extent})")
            }
        }
    }
}

impl std::error::Error for NavError {}

/// One choice in the current index-selection layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEntry {
    pub index: usize,
    /// Choosing this index reaches the leaf.
    pub is_leaf: bool,
    /// Shape left after choosing it.
    pub remaining: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionPath {
    shape: Shape,
    path: Vec<usize>,
}

impl DimensionPath {
    pub fn new(shape: Shape) -> Self {
        Self { shape, path: Vec::new() }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn is_navigable(&self) -> bool {
        self.shape.needs_navigation()
    }

    /// Fix the next axis to `index`. Rejected attempts leave the path untouched.
    pub fn enter(&mut self, index: usize) -> Result<Descent, NavError> {
        if !self.is_navigable() {
            return Err(NavError::NotNavigable { rank: self.shape.rank() });
        }
        if self.is_at_leaf_boundary() {
            return Err(NavError::AtLeaf);
        }
        let axis = self.path.len();
        let extent = self.shape.dim(axis).unwrap_or(0);
        if index >= extent {
            return Err(NavError::IndexOutOfRange { axis, index, extent });
        }

        self.path.push(index);
        log::debug!("enter [{index}] on axis {axis}; path now {:?}", self.path);

        if self.is_at_leaf_boundary() {
            Ok(Descent::Leaf)
        } else {
            Ok(Descent::Layer { depth: self.path.len() })
        }
    }

    /// Pop the last fixed index. At the root nothing happens and `None` is returned.
    pub fn back(&mut self) -> Option<usize> {
        let popped = self.path.pop();
        match popped {
            Some(index) => log::debug!("back from [{index}]; path now {:?}", self.path),
            None => log::debug!("back at root ignored"),
        }
        popped
    }

    pub fn reset(&mut self) {
        self.path.clear();
    }

    /// Replay a stored path against the current shape, stopping at the first
    /// index that no longer fits. Returns how many indices were applied.
    pub fn replay(&mut self, indices: &[usize]) -> usize {
        self.reset();
        indices
            .iter()
            .take_while(|&&index| self.enter(index).is_ok())
            .count()
    }

    pub fn remaining_shape(&self) -> &[usize] {
        &self.shape.dims()[self.path.len().min(self.shape.rank())..]
    }

    pub fn is_at_leaf_boundary(&self) -> bool {
        self.path.len() == self.shape.navigable_depth()
    }

    pub fn state(&self) -> NavState {
        if self.is_navigable() && self.is_at_leaf_boundary() {
            NavState::LeafReached
        } else if self.path.is_empty() {
            NavState::Root
        } else {
            NavState::Navigating { depth: self.path.len() }
        }
    }

    /// Layer number shown to the user: 0 for tensors displayed directly,
    /// otherwise 1 for the first index-selection layer and one more per
    /// fixed index.
    pub fn current_depth(&self) -> usize {
        if self.is_navigable() {
            self.path.len() + 1
        } else {
            0
        }
    }

    /// Choices offered by the current index-selection layer. Empty at the leaf.
    pub fn layer_entries(&self) -> Vec<LayerEntry> {
        if !self.is_navigable() || self.is_at_leaf_boundary() {
            return Vec::new();
        }
        let axis = self.path.len();
        let extent = self.shape.dim(axis).unwrap_or(0);
        let remaining = self.shape.dims()[axis + 1..].to_vec();
        let is_leaf = axis + 1 == self.shape.navigable_depth();
        (0..extent)
            .map(|index| LayerEntry { index, is_leaf, remaining: remaining.clone() })
            .collect()
    }

    /// `[1][2] → 4 × 5`
    pub fn breadcrumb(&self) -> String {
        let fixed: String = self.path.iter().map(|i| format!("[{i}]")).collect();
        let remaining = Shape::display_dims(self.remaining_shape());
        if fixed.is_empty() {
            remaining
        } else {
            format!("{fixed} → {remaining}")
        }
    }
}
