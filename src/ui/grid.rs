/// Grid layout for the slice cells
///
/// Cells fill each row from the rightmost column to the leftmost one
/// before wrapping to the next row. Columns are as wide as their widest
/// image and rows as tall as their tallest one, so the scrollable region
/// is the sum of both.

use crate::state::data::Placement;

/// Grid position of the cell at `index` in the ordered image list
pub fn placement(index: usize, max_columns: usize) -> Placement {
    Placement {
        row: index / max_columns,
        col: (max_columns - 1) - (index % max_columns),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridLayout {
    max_columns: usize,
    cell_count: usize,
    column_widths: Vec<u32>,
    row_heights: Vec<u32>,
}

impl GridLayout {
    /// Compute extents for cells of the given sizes, in display order
    ///
    /// `max_columns` must be at least 1.
    pub fn compute<I>(sizes: I, max_columns: usize) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut column_widths = vec![0; max_columns];
        let mut row_heights = Vec::new();
        let mut cell_count = 0;

        for (index, (width, height)) in sizes.into_iter().enumerate() {
            let Placement { row, col } = placement(index, max_columns);
            if row == row_heights.len() {
                row_heights.push(0);
            }
            column_widths[col] = column_widths[col].max(width);
            row_heights[row] = row_heights[row].max(height);
            cell_count = index + 1;
        }

        GridLayout {
            max_columns,
            cell_count,
            column_widths,
            row_heights,
        }
    }

    pub fn columns(&self) -> usize {
        self.max_columns
    }

    pub fn rows(&self) -> usize {
        self.row_heights.len()
    }

    pub fn column_width(&self, col: usize) -> u32 {
        self.column_widths.get(col).copied().unwrap_or(0)
    }

    pub fn row_height(&self, row: usize) -> u32 {
        self.row_heights.get(row).copied().unwrap_or(0)
    }

    /// Index of the cell shown at (row, col), if any
    pub fn cell_at(&self, row: usize, col: usize) -> Option<usize> {
        if col >= self.max_columns {
            return None;
        }
        let index = row * self.max_columns + (self.max_columns - 1 - col);
        (index < self.cell_count).then_some(index)
    }

    /// Size of the scrollable region holding every cell
    pub fn content_size(&self) -> (u32, u32) {
        (
            self.column_widths.iter().sum(),
            self.row_heights.iter().sum(),
        )
    }
}
