//! Landscape ecology algorithms
//!
//! Moving-window metrics for binary cover rasters:
//! - **Fragmentation**: cover density, cover connectivity and the
//!   Riitters fragmentation class derived from both

mod fragmentation;

pub use fragmentation::{
    class, classify_cell, fragmentation, Fragmentation, FragmentationClass, FragmentationOutput,
    FragmentationParams, UndeterminedPolicy,
};
