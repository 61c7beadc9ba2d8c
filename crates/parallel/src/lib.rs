//! # fragscape parallel
//!
//! Thread-parallel helpers for applying functions over rasters.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential, global-pool or fixed-size-pool execution
//! - `RowBlocks` / `BlockProcessor`: cell function application over row blocks
//! - `binarize`: cover raster to 0/1 presence, built on `BlockProcessor`

pub mod blocks;
pub mod strategy;

pub use blocks::{BlockProcessor, RowBlock, RowBlocks, binarize};
pub use strategy::{ParallelStrategy, ProcessingMode};
