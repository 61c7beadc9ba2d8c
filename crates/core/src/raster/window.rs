//! Square focal windows

use crate::error::{Error, Result};

/// An odd-sized square neighborhood centered on a focal cell.
///
/// Offsets are `(d_row, d_col)` relative to the focal cell and range over
/// `-radius..=radius` in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    size: usize,
}

impl Window {
    /// Create a window with the given side length.
    ///
    /// Fails with `InvalidParameter` unless `size` is odd and at least 3.
    pub fn new(size: usize) -> Result<Self> {
        if size < 3 {
            return Err(Error::invalid("size", size, "window size must be at least 3"));
        }
        if size % 2 == 0 {
            return Err(Error::invalid("size", size, "window size must be odd"));
        }
        Ok(Self { size })
    }

    /// Side length in cells
    pub fn size(&self) -> usize {
        self.size
    }

    /// Cells between the focal cell and the window edge
    pub fn radius(&self) -> usize {
        (self.size - 1) / 2
    }

    /// Number of cells covered by the window
    pub fn cell_count(&self) -> usize {
        self.size * self.size
    }

    /// All offsets in the window, row by row
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        let mut offsets = Vec::with_capacity(self.cell_count());
        for dr in -r..=r {
            for dc in -r..=r {
                offsets.push((dr, dc));
            }
        }
        offsets
    }

    /// Every unordered pair of rook (4-connected) neighbors inside the window.
    ///
    /// Each pair appears once, as `(cell, right neighbor)` or `(cell, lower neighbor)`.
    pub fn adjacent_pairs(&self) -> Vec<((isize, isize), (isize, isize))> {
        let r = self.radius() as isize;
        let mut pairs = Vec::with_capacity(2 * self.size * (self.size - 1));
        for dr in -r..=r {
            for dc in -r..=r {
                if dc < r {
                    pairs.push(((dr, dc), (dr, dc + 1)));
                }
                if dr < r {
                    pairs.push(((dr, dc), (dr + 1, dc)));
                }
            }
        }
        pairs
    }
}
