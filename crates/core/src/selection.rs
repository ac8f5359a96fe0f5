use std::collections::BTreeSet;

use crate::address::CellAddress;

/// A rectangular range of cells, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl Range {
    /// Range spanning two corners, normalized so start <= end.
    pub fn between(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start_row: a.row.min(b.row),
            start_col: a.col.min(b.col),
            end_row: a.row.max(b.row),
            end_col: a.col.max(b.col),
        }
    }

    pub fn single(cell: CellAddress) -> Self {
        Self::between(cell, cell)
    }

    pub fn contains(&self, cell: CellAddress) -> bool {
        cell.row >= self.start_row && cell.row <= self.end_row &&
        cell.col >= self.start_col && cell.col <= self.end_col
    }

    pub fn cell_count(&self) -> usize {
        (self.end_row - self.start_row + 1) * (self.end_col - self.start_col + 1)
    }

    /// Row-major iteration.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> {
        let (start_col, end_col) = (self.start_col, self.end_col);
        (self.start_row..=self.end_row)
            .flat_map(move |r| (start_col..=end_col).map(move |c| CellAddress::new(r, c)))
    }

    pub fn is_single(&self) -> bool {
        self.start_row == self.end_row && self.start_col == self.end_col
    }

    /// `A1:C4`, or just `A1` for a single cell.
    pub fn label(&self) -> String {
        let start = CellAddress::new(self.start_row, self.start_col);
        if self.is_single() {
            start.label()
        } else {
            format!("{}:{}", start, CellAddress::new(self.end_row, self.end_col))
        }
    }
}

/// Pointer-driven selection over the displayed grid.
///
/// Two independent notions of "selected" coexist:
/// - `selected_cells`: discrete cells toggled by clicks (ctrl/cmd adds to the set)
/// - the drag rectangle between anchor and focus, recomputed while dragging
#[derive(Debug, Clone, Default)]
pub struct GridSelection {
    selected_cells: BTreeSet<CellAddress>,
    current_cell: Option<CellAddress>,
    anchor: Option<CellAddress>,
    focus: Option<CellAddress>,
    rectangle: Option<Range>,
    dragging: bool,
}

impl GridSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer-down over `cell`.
    pub fn begin(&mut self, cell: CellAddress, additive: bool) {
        if !additive {
            self.selected_cells.clear();
        }
        self.anchor = Some(cell);
        self.focus = Some(cell);
        self.current_cell = Some(cell);
        self.rectangle = None;
        if !self.selected_cells.remove(&cell) {
            self.selected_cells.insert(cell);
        }
        self.dragging = true;
    }

    /// Pointer-move while dragging. Returns false (and changes nothing)
    /// when no drag is in progress.
    pub fn extend(&mut self, cell: CellAddress) -> bool {
        if !self.dragging {
            return false;
        }
        let Some(anchor) = self.anchor else {
            return false;
        };
        self.focus = Some(cell);
        self.rectangle = Some(Range::between(anchor, cell));
        true
    }

    /// Pointer-up. The last rectangle stays as the committed highlight.
    pub fn end(&mut self) {
        self.dragging = false;
    }

    /// Drop toggled cells; the current cell is kept.
    pub fn clear(&mut self) {
        self.selected_cells.clear();
    }

    /// Forget everything, e.g. when a new slice replaces the grid.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn current_cell(&self) -> Option<CellAddress> {
        self.current_cell
    }

    pub fn anchor(&self) -> Option<CellAddress> {
        self.anchor
    }

    pub fn focus(&self) -> Option<CellAddress> {
        self.focus
    }

    pub fn rectangle(&self) -> Option<Range> {
        self.rectangle
    }

    pub fn selected_cells(&self) -> &BTreeSet<CellAddress> {
        &self.selected_cells
    }

    pub fn is_toggled(&self, cell: CellAddress) -> bool {
        self.selected_cells.contains(&cell)
    }

    pub fn in_rectangle(&self, cell: CellAddress) -> bool {
        self.rectangle.is_some_and(|r| r.contains(cell))
    }

    /// Whether a cell renders highlighted by either mechanism.
    pub fn is_highlighted(&self, cell: CellAddress) -> bool {
        self.is_toggled(cell) || self.in_rectangle(cell)
    }

    /// Label shown in the grid corner: the focus while dragging, else the
    /// current cell.
    pub fn position_label(&self) -> Option<String> {
        self.focus
            .filter(|_| self.rectangle.is_some())
            .or(self.current_cell)
            .map(|c| c.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: usize, col: usize) -> CellAddress {
        CellAddress::new(row, col)
    }

    #[test]
    fn test_range_single() {
        let r = Range::single(cell(5, 3));
        assert!(r.contains(cell(5, 3)));
        assert!(!r.contains(cell(5, 4)));
        assert!(r.is_single());
        assert_eq!(r.cell_count(), 1);
        assert_eq!(r.label(), "D6");
    }

    #[test]
    fn test_range_normalizes() {
        let r = Range::between(cell(5, 5), cell(1, 1));
        assert_eq!((r.start_row, r.start_col, r.end_row, r.end_col), (1, 1, 5, 5));
        assert_eq!(r.cell_count(), 25);
        assert_eq!(r.label(), "B2:F6");
    }

    #[test]
    fn test_range_cells_row_major() {
        let r = Range::between(cell(0, 0), cell(1, 1));
        let cells: Vec<_> = r.cells().collect();
        assert_eq!(cells, vec![cell(0, 0), cell(0, 1), cell(1, 0), cell(1, 1)]);
    }

    #[test]
    fn test_begin_replaces_unless_additive() {
        let mut sel = GridSelection::new();
        sel.begin(cell(0, 0), false);
        sel.end();
        sel.begin(cell(1, 1), false);
        sel.end();
        assert!(!sel.is_toggled(cell(0, 0)));
        assert!(sel.is_toggled(cell(1, 1)));

        sel.begin(cell(2, 2), true);
        sel.end();
        assert!(sel.is_toggled(cell(1, 1)));
        assert!(sel.is_toggled(cell(2, 2)));
        assert_eq!(sel.current_cell(), Some(cell(2, 2)));
    }

    #[test]
    fn test_additive_click_toggles_off() {
        let mut sel = GridSelection::new();
        sel.begin(cell(1, 1), false);
        sel.end();
        sel.begin(cell(1, 1), true);
        sel.end();
        assert!(!sel.is_toggled(cell(1, 1)));
        assert_eq!(sel.current_cell(), Some(cell(1, 1)));
    }

    #[test]
    fn test_drag_rectangle() {
        let mut sel = GridSelection::new();
        sel.begin(cell(2, 2), false);
        assert!(sel.is_dragging());
        assert!(sel.extend(cell(4, 5)));
        assert!(sel.extend(cell(0, 1)));
        sel.end();

        assert!(!sel.is_dragging());
        assert_eq!(sel.anchor(), Some(cell(2, 2)));
        assert_eq!(sel.focus(), Some(cell(0, 1)));
        assert!(sel.in_rectangle(cell(1, 2)));
        assert!(!sel.in_rectangle(cell(3, 3)));
        assert_eq!(sel.rectangle().map(|r| r.cell_count()), Some(6));
        assert_eq!(sel.position_label().as_deref(), Some("B1"));
    }

    #[test]
    fn test_extend_ignored_without_drag() {
        let mut sel = GridSelection::new();
        assert!(!sel.extend(cell(3, 3)));
        sel.begin(cell(0, 0), false);
        sel.end();
        assert!(!sel.extend(cell(3, 3)));
        assert_eq!(sel.focus(), Some(cell(0, 0)));
        assert!(sel.rectangle().is_none());
    }

    #[test]
    fn test_clear_keeps_current() {
        let mut sel = GridSelection::new();
        sel.begin(cell(1, 0), false);
        sel.end();
        sel.clear();
        assert!(sel.selected_cells().is_empty());
        assert_eq!(sel.current_cell(), Some(cell(1, 0)));

        sel.reset();
        assert_eq!(sel.current_cell(), None);
    }
}
