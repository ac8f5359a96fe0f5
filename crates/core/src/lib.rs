//! Pure, data-independent types shared by the navigation engine and the
//! wire protocol: spreadsheet-style cell addresses, tensor shapes and the
//! pointer-driven grid selection model.

pub mod address;
pub mod selection;
pub mod shape;

pub use address::{cell_label, column_label, label_to_column, parse_cell_label, CellAddress, LabelError};
pub use selection::{GridSelection, Range};
pub use shape::{Shape, ShapeError};
