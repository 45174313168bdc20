//! Flow placement on a fixed-width grid
//!
//! Components are placed left to right and wrap to a new row when the next
//! one would cross the right edge, so every placement satisfies
//! `col + w <= columns`.

use crate::model::GridPosition;

/// Row-wrapping placement cursor
#[derive(Debug, Clone)]
pub struct GridLayout {
    columns: u32,
    col: u32,
    row: u32,
    row_height: u32,
}

impl GridLayout {
    /// Create cursor for a grid of `columns` (at least one)
    #[inline]
    #[must_use]
    pub fn new(columns: u32) -> Self {
        Self {
            columns: columns.max(1),
            col: 0,
            row: 0,
            row_height: 0,
        }
    }

    /// Place a `w` x `h` cell, clamping width to the grid
    pub fn place(&mut self, w: u32, h: u32) -> GridPosition {
        let w = w.clamp(1, self.columns);
        let h = h.max(1);

        if self.col + w > self.columns {
            self.row += self.row_height;
            self.col = 0;
            self.row_height = 0;
        }

        let position = GridPosition::new(self.col, self.row, w, h);
        self.col += w;
        self.row_height = self.row_height.max(h);
        position
    }

    /// Row index below everything placed so far
    #[inline]
    #[must_use]
    pub fn next_free_row(&self) -> u32 {
        self.row + self.row_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_when_row_is_full() {
        let mut grid = GridLayout::new(12);
        assert_eq!(grid.place(6, 2), GridPosition::new(0, 0, 6, 2));
        assert_eq!(grid.place(6, 3), GridPosition::new(6, 0, 6, 3));
        assert_eq!(grid.place(4, 2), GridPosition::new(0, 3, 4, 2));
        assert_eq!(grid.next_free_row(), 5);
    }

    #[test]
    fn oversized_cells_are_clamped() {
        let mut grid = GridLayout::new(12);
        let pos = grid.place(20, 0);
        assert_eq!(pos, GridPosition::new(0, 0, 12, 1));
    }
}
