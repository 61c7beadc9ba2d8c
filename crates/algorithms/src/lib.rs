//! # fragscape algorithms
//!
//! Moving-window landscape analysis for binary cover rasters.
//!
//! - **landscape**: fragmentation density, connectivity and classification

mod maybe_rayon;

pub mod landscape;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::landscape::{
        classify_cell, fragmentation, Fragmentation, FragmentationClass, FragmentationOutput,
        FragmentationParams, UndeterminedPolicy,
    };
    pub use fragscape_core::prelude::*;
}
