//! Cell function application over row blocks
//!
//! A raster is split into contiguous bands of rows; each band is one task.
//! Results are stitched back together in row order, so the output does not
//! depend on how many threads ran or in which order blocks finished.

use fragscape_core::raster::{Raster, RasterElement};
use fragscape_core::{Error, Result};
use ndarray::{Array2, s};
use tracing::debug;

use crate::strategy::{ParallelStrategy, ProcessingMode};

/// A band of consecutive rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBlock {
    /// First row of the block
    pub row_offset: usize,
    /// Number of rows in the block
    pub rows: usize,
}

/// Iterator over row blocks covering `total_rows`
#[derive(Debug, Clone)]
pub struct RowBlocks {
    total_rows: usize,
    block_rows: usize,
    next_row: usize,
}

impl RowBlocks {
    /// Blocks of `block_rows` rows; a zero block size is treated as 1
    pub fn new(total_rows: usize, block_rows: usize) -> Self {
        Self {
            total_rows,
            block_rows: block_rows.max(1),
            next_row: 0,
        }
    }
}

impl Iterator for RowBlocks {
    type Item = RowBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row >= self.total_rows {
            return None;
        }
        let rows = self.block_rows.min(self.total_rows - self.next_row);
        let block = RowBlock {
            row_offset: self.next_row,
            rows,
        };
        self.next_row += rows;
        Some(block)
    }
}

/// Applies a per-cell function to a raster, one row block per task
#[derive(Debug, Clone)]
pub struct BlockProcessor {
    block_rows: usize,
    mode: ProcessingMode,
}

impl Default for BlockProcessor {
    fn default() -> Self {
        Self::new(256, ProcessingMode::default())
    }
}

impl BlockProcessor {
    /// Create a processor with the given block height and execution mode
    pub fn new(block_rows: usize, mode: ProcessingMode) -> Self {
        Self {
            block_rows: block_rows.max(1),
            mode,
        }
    }

    /// Evaluate `f` on every cell and return a raster with the input's metadata.
    ///
    /// Missing cells are passed to `f` as-is. The output no-data value is left
    /// unset; callers that produce a no-data marker set it themselves.
    pub fn apply<T, U, F>(&self, input: &Raster<T>, f: F) -> Result<Raster<U>>
    where
        T: RasterElement,
        U: RasterElement,
        F: Fn(T) -> U + Sync + Send,
    {
        let (rows, cols) = input.shape();
        let blocks: Vec<RowBlock> = RowBlocks::new(rows, self.block_rows).collect();
        debug!(blocks = blocks.len(), block_rows = self.block_rows, mode = ?self.mode, "applying cell function");

        let view = input.view();
        let results: Vec<Array2<U>> = self.mode.par_map(0..blocks.len(), |i| {
            let block = blocks[i];
            view.slice(s![block.row_offset..block.row_offset + block.rows, ..])
                .mapv(&f)
        })?;

        let mut output = input.with_same_meta::<U>(rows, cols);
        let out = output.data_mut();
        for (block, values) in blocks.iter().zip(results) {
            if values.dim() != (block.rows, cols) {
                return Err(Error::Algorithm("row block shape changed during processing".into()));
            }
            out.slice_mut(s![block.row_offset..block.row_offset + block.rows, ..])
                .assign(&values);
        }

        Ok(output)
    }
}

/// Turn a cover raster into 0/1 presence.
///
/// Cells `>= threshold` become 1, others 0, missing cells stay NaN. The output
/// declares NaN as its no-data value.
pub fn binarize(raster: &Raster<f64>, threshold: f64, mode: ProcessingMode) -> Result<Raster<f64>> {
    if !threshold.is_finite() {
        return Err(Error::invalid("threshold", threshold, "threshold must be finite"));
    }

    let nodata = raster.nodata();
    let mut output = BlockProcessor::new(256, mode).apply(raster, |v: f64| {
        if v.is_nodata(nodata) {
            f64::NAN
        } else if v >= threshold {
            1.0
        } else {
            0.0
        }
    })?;
    output.set_nodata(Some(f64::NAN));
    Ok(output)
}
