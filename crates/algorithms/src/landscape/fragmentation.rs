//! Landscape fragmentation classification
//!
//! Classifies every cell of a binary cover raster (1 = occupied, 0 = not
//! occupied, NaN = missing) by the structure of the cover around it, following
//! Riitters et al. (2000). Two statistics are computed in a square moving window:
//!
//! - **Density** `pf`: occupied cells / eligible cells
//! - **Connectivity** `pff`: rook-adjacent pairs with both cells occupied /
//!   pairs with at least one cell occupied
//!
//! and mapped to a class (first matching row wins):
//!
//! | Condition                      | Class         | Code |
//! |--------------------------------|---------------|------|
//! | pf or pff missing              | (missing)     | NaN  |
//! | pf = 0                         | None          |  0   |
//! | pf < 0.4                       | Patch         |  1   |
//! | 0.4 <= pf < 0.6                | Transitional  |  2   |
//! | pf = 1                         | Interior      |  6   |
//! | pf > pff                       | Perforated    |  3   |
//! | pf < pff                       | Edge          |  4   |
//! | pf = pff                       | policy        | 3/4/5|
//!
//! Cells outside the raster are missing. Missing cells are left out of both
//! statistics unless `missing_as_eligible` is set, in which case they count as
//! unoccupied area.
//!
//! Reference: Riitters, K., Wickham, J., O'Neill, R., Jones, B., Smith, E. (2000)
//!            "Global-scale patterns of forest fragmentation". Conservation Ecology 4(2): 3.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::maybe_rayon::*;
use fragscape_core::raster::{Raster, Window};
use fragscape_core::{Algorithm, Error, Result};

/// Fragmentation class codes as stored in the class raster
pub mod class {
    pub const NONE: f64 = 0.0;
    pub const PATCH: f64 = 1.0;
    pub const TRANSITIONAL: f64 = 2.0;
    pub const PERFORATED: f64 = 3.0;
    pub const EDGE: f64 = 4.0;
    pub const UNDETERMINED: f64 = 5.0;
    pub const INTERIOR: f64 = 6.0;
}

/// Lower density bound of the transitional class
const TRANSITIONAL_MIN: f64 = 0.4;
/// Lower density bound of the perforated / edge / undetermined classes
const DOMINANT_MIN: f64 = 0.6;

/// Fragmentation class of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FragmentationClass {
    /// No cover in the window
    None = 0,
    /// Cover is a small part of the window
    Patch = 1,
    /// Cover is around half of the window
    Transitional = 2,
    /// Dominant cover with holes in it
    Perforated = 3,
    /// Dominant cover along the outside of a patch
    Edge = 4,
    /// Dominant cover, perforated and edge cannot be told apart
    Undetermined = 5,
    /// The window is fully covered
    Interior = 6,
}

impl FragmentationClass {
    pub const ALL: [FragmentationClass; 7] = [
        FragmentationClass::None,
        FragmentationClass::Patch,
        FragmentationClass::Transitional,
        FragmentationClass::Perforated,
        FragmentationClass::Edge,
        FragmentationClass::Undetermined,
        FragmentationClass::Interior,
    ];

    /// Integer code (0-6)
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Code as stored in the class raster
    pub fn value(self) -> f64 {
        f64::from(self.code())
    }

    /// Class for an integer code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Lowercase class name
    pub fn name(self) -> &'static str {
        match self {
            FragmentationClass::None => "none",
            FragmentationClass::Patch => "patch",
            FragmentationClass::Transitional => "transitional",
            FragmentationClass::Perforated => "perforated",
            FragmentationClass::Edge => "edge",
            FragmentationClass::Undetermined => "undetermined",
            FragmentationClass::Interior => "interior",
        }
    }
}

impl fmt::Display for FragmentationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a cell with `pf == pff` (dominant cover, below interior) is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndeterminedPolicy {
    /// Assign the undetermined class (5)
    #[default]
    Undetermined,
    /// Assign perforated (3)
    Perforated,
    /// Assign edge (4)
    Edge,
    /// Perforated or edge with equal probability, drawn per cell
    Random,
}

impl UndeterminedPolicy {
    pub const ALL: [UndeterminedPolicy; 4] = [
        UndeterminedPolicy::Undetermined,
        UndeterminedPolicy::Perforated,
        UndeterminedPolicy::Edge,
        UndeterminedPolicy::Random,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UndeterminedPolicy::Undetermined => "undetermined",
            UndeterminedPolicy::Perforated => "perforated",
            UndeterminedPolicy::Edge => "edge",
            UndeterminedPolicy::Random => "random",
        }
    }
}

impl fmt::Display for UndeterminedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UndeterminedPolicy {
    type Err = Error;

    /// Accepts any non-empty, case-insensitive prefix of a policy name ("u", "Perf", "EDGE").
    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase();
        if !key.is_empty() {
            let mut candidates = Self::ALL.iter().filter(|p| p.name().starts_with(&key));
            if let (Some(policy), None) = (candidates.next(), candidates.next()) {
                return Ok(*policy);
            }
        }
        Err(Error::invalid(
            "undetermined",
            s,
            "expected undetermined, perforated, edge or random",
        ))
    }
}

/// Parameters for fragmentation classification
#[derive(Debug, Clone)]
pub struct FragmentationParams {
    /// Window side length in cells; odd and at least 3
    pub size: usize,
    /// Extend the raster by `(size - 1) / 2` cells of `pad_value` before computing
    pub pad: bool,
    /// Value of padding cells (NaN = missing)
    pub pad_value: f64,
    /// Produce the density raster
    pub density: bool,
    /// Produce the connectivity raster
    pub connectivity: bool,
    /// Produce the class raster; forces `density` and `connectivity` on
    pub class: bool,
    /// Count missing cells as unoccupied area instead of ignoring them
    pub missing_as_eligible: bool,
    /// Resolution of `pf == pff` ties
    pub undetermined: UndeterminedPolicy,
    /// Seed for [`UndeterminedPolicy::Random`]
    pub seed: u64,
}

impl Default for FragmentationParams {
    fn default() -> Self {
        Self {
            size: 3,
            pad: false,
            pad_value: f64::NAN,
            density: true,
            connectivity: true,
            class: true,
            missing_as_eligible: false,
            undetermined: UndeterminedPolicy::Undetermined,
            seed: 0,
        }
    }
}

impl FragmentationParams {
    /// Turn on the inputs the class raster depends on.
    ///
    /// Returns true if anything had to be changed.
    fn force_class_inputs(&mut self) -> bool {
        if self.class && !(self.density && self.connectivity) {
            self.density = true;
            self.connectivity = true;
            return true;
        }
        false
    }
}

/// Rasters produced by [`fragmentation`]
#[derive(Debug, Clone)]
pub struct FragmentationOutput {
    /// Class codes 0-6, NaN where undefined
    pub class: Option<Raster<f64>>,
    /// Density `pf` in [0, 1], NaN where undefined
    pub density: Option<Raster<f64>>,
    /// Connectivity `pff` in [0, 1], NaN where undefined
    pub connectivity: Option<Raster<f64>>,
    /// Density and connectivity were switched on because the class raster needs them
    pub forced_inputs: bool,
}

/// Landscape fragmentation algorithm
#[derive(Debug, Clone, Default)]
pub struct Fragmentation;

impl Algorithm for Fragmentation {
    type Input = Raster<f64>;
    type Output = FragmentationOutput;
    type Params = FragmentationParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Fragmentation"
    }

    fn description(&self) -> &'static str {
        "Classify landscape fragmentation from moving-window cover density and connectivity"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        fragmentation(&input, params)
    }
}

/// State of one cell as seen by the window statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cover {
    Missing,
    Empty,
    Occupied,
}

/// Cover states of a raster, row-major
struct CoverGrid {
    cells: Vec<Cover>,
    rows: usize,
    cols: usize,
}

impl CoverGrid {
    fn from_raster(raster: &Raster<f64>) -> Self {
        let (rows, cols) = raster.shape();
        let cells = raster
            .data()
            .iter()
            .map(|&v| {
                if raster.is_nodata(v) {
                    Cover::Missing
                } else if v != 0.0 {
                    Cover::Occupied
                } else {
                    Cover::Empty
                }
            })
            .collect();
        Self { cells, rows, cols }
    }

    /// Cover at a possibly out-of-raster position
    #[inline]
    fn at(&self, row: isize, col: isize) -> Cover {
        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            return Cover::Missing;
        }
        self.cells[row as usize * self.cols + col as usize]
    }
}

/// Window offsets and rook pairs, computed once per run
struct WindowShape {
    offsets: Vec<(isize, isize)>,
    pairs: Vec<((isize, isize), (isize, isize))>,
}

/// Density and connectivity of one window
#[derive(Debug, Clone, Copy)]
struct WindowStats {
    density: f64,
    connectivity: f64,
}

fn window_stats(
    grid: &CoverGrid,
    row: isize,
    col: isize,
    shape: &WindowShape,
    missing_as_eligible: bool,
    with_connectivity: bool,
) -> WindowStats {
    let eligible = |c: Cover| c != Cover::Missing || missing_as_eligible;

    let mut occupied = 0usize;
    let mut counted = 0usize;
    for &(dr, dc) in &shape.offsets {
        let c = grid.at(row + dr, col + dc);
        if eligible(c) {
            counted += 1;
            if c == Cover::Occupied {
                occupied += 1;
            }
        }
    }
    let density = if counted == 0 {
        f64::NAN
    } else {
        occupied as f64 / counted as f64
    };

    if !with_connectivity {
        return WindowStats {
            density,
            connectivity: f64::NAN,
        };
    }

    let mut both = 0usize;
    let mut either = 0usize;
    for &((r1, c1), (r2, c2)) in &shape.pairs {
        let a = grid.at(row + r1, col + c1);
        let b = grid.at(row + r2, col + c2);
        if !eligible(a) || !eligible(b) {
            continue;
        }
        let a = a == Cover::Occupied;
        let b = b == Cover::Occupied;
        if a && b {
            both += 1;
        }
        if a || b {
            either += 1;
        }
    }
    let connectivity = if either == 0 {
        f64::NAN
    } else {
        both as f64 / either as f64
    };

    WindowStats {
        density,
        connectivity,
    }
}

/// Classify a cell from its density and connectivity.
///
/// Returns `None` when either statistic is missing (NaN). `row` and `col`
/// key the random draw for [`UndeterminedPolicy::Random`], so a cell gets
/// the same draw for a given seed no matter how the raster is traversed.
pub fn classify_cell(
    pf: f64,
    pff: f64,
    policy: UndeterminedPolicy,
    seed: u64,
    row: usize,
    col: usize,
) -> Option<FragmentationClass> {
    if pf.is_nan() || pff.is_nan() {
        return None;
    }

    let class = if pf == 0.0 {
        FragmentationClass::None
    } else if pf < TRANSITIONAL_MIN {
        FragmentationClass::Patch
    } else if pf < DOMINANT_MIN {
        FragmentationClass::Transitional
    } else if pf == 1.0 {
        FragmentationClass::Interior
    } else if pf > pff {
        FragmentationClass::Perforated
    } else if pf < pff {
        FragmentationClass::Edge
    } else {
        match policy {
            UndeterminedPolicy::Undetermined => FragmentationClass::Undetermined,
            UndeterminedPolicy::Perforated => FragmentationClass::Perforated,
            UndeterminedPolicy::Edge => FragmentationClass::Edge,
            UndeterminedPolicy::Random => {
                let mut rng = ChaCha8Rng::seed_from_u64(cell_seed(seed, row, col));
                if rng.gen_bool(0.5) {
                    FragmentationClass::Perforated
                } else {
                    FragmentationClass::Edge
                }
            }
        }
    };

    Some(class)
}

/// Mix the run seed with a cell position (splitmix64 finalizer)
fn cell_seed(seed: u64, row: usize, col: usize) -> u64 {
    let mut h = seed;
    for v in [row as u64, col as u64] {
        h = (h ^ v).wrapping_add(0x9E37_79B9_7F4A_7C15);
        h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        h ^= h >> 31;
    }
    h
}

/// Compute landscape fragmentation rasters.
///
/// # Arguments
/// * `raster` - Binary cover raster: 1 occupied, 0 unoccupied, NaN or no-data missing.
///   Any other non-zero value counts as occupied.
/// * `params` - Window size, padding, outputs and tie handling
///
/// # Returns
/// The requested rasters, each with the input's shape, transform and CRS and
/// NaN as no-data.
///
/// # Errors
/// `InvalidParameter` for an even or too small window size; `InvalidDimensions`
/// for an empty raster. Both are reported before any computation.
pub fn fragmentation(raster: &Raster<f64>, mut params: FragmentationParams) -> Result<FragmentationOutput> {
    let window = Window::new(params.size)?;

    let forced_inputs = params.force_class_inputs();
    if forced_inputs {
        warn!("class output requires density and connectivity; computing both");
    }

    let (rows, cols) = raster.shape();
    if raster.is_empty() {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    if !(params.density || params.connectivity || params.class) {
        debug!("no fragmentation outputs requested");
        return Ok(FragmentationOutput {
            class: None,
            density: None,
            connectivity: None,
            forced_inputs,
        });
    }

    let margin = if params.pad { window.radius() } else { 0 };
    let padded;
    let work = if params.pad {
        padded = raster.extend(margin, params.pad_value);
        &padded
    } else {
        raster
    };
    debug!(
        size = window.size(),
        margin,
        rows = work.rows(),
        cols = work.cols(),
        "computing fragmentation"
    );

    let grid = CoverGrid::from_raster(work);
    let shape = WindowShape {
        offsets: window.offsets(),
        pairs: window.adjacent_pairs(),
    };
    let (work_rows, work_cols) = work.shape();

    let cells: Vec<(f64, f64, f64)> = (0..work_rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![(f64::NAN, f64::NAN, f64::NAN); work_cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let stats = window_stats(
                    &grid,
                    row as isize,
                    col as isize,
                    &shape,
                    params.missing_as_eligible,
                    params.connectivity,
                );

                // Padding cells are cropped away below, so they never need a class.
                let inside = row >= margin && col >= margin && row - margin < rows && col - margin < cols;
                let code = if params.class && inside {
                    classify_cell(
                        stats.density,
                        stats.connectivity,
                        params.undetermined,
                        params.seed,
                        row - margin,
                        col - margin,
                    )
                    .map_or(f64::NAN, FragmentationClass::value)
                } else {
                    f64::NAN
                };

                *out = (code, stats.density, stats.connectivity);
            }

            row_data
        })
        .collect();

    let layer = |enabled: bool, pick: fn(&(f64, f64, f64)) -> f64| -> Result<Option<Raster<f64>>> {
        if !enabled {
            return Ok(None);
        }
        let data = cells.iter().map(pick).collect();
        let full = build_output(work, work_rows, work_cols, data)?;
        finish_layer(full, raster, margin).map(Some)
    };

    Ok(FragmentationOutput {
        class: layer(params.class, |c| c.0)?,
        density: layer(params.density, |c| c.1)?,
        connectivity: layer(params.connectivity, |c| c.2)?,
        forced_inputs,
    })
}

fn build_output(template: &Raster<f64>, rows: usize, cols: usize, data: Vec<f64>) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), data)?;
    Ok(output)
}

/// Crop padding away and restore the input's georeferencing exactly
fn finish_layer(full: Raster<f64>, input: &Raster<f64>, margin: usize) -> Result<Raster<f64>> {
    let mut output = if margin > 0 {
        full.crop(margin, margin, input.rows(), input.cols())?
    } else {
        full
    };
    output.set_transform(*input.transform());
    output.set_crs(input.crs().cloned());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fragscape_core::{CRS, GeoTransform};

    const NAN: f64 = f64::NAN;

    fn raster(rows: &[&[f64]]) -> Raster<f64> {
        let n = rows.len();
        let m = rows[0].len();
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        let mut r = Raster::from_vec(data, n, m).unwrap();
        r.set_transform(GeoTransform::new(0.0, n as f64, 1.0, -1.0));
        r
    }

    /// Vertical stripes `0 1 1 0 1 1`, four rows.
    fn stripes() -> Raster<f64> {
        let row: &[f64] = &[0.0, 1.0, 1.0, 0.0, 1.0, 1.0];
        raster(&[row, row, row, row])
    }

    fn codes(r: &Raster<f64>) -> Vec<Vec<f64>> {
        r.data().rows().into_iter().map(|row| row.to_vec()).collect()
    }

    #[test]
    fn test_all_occupied_is_interior() {
        let r = Raster::filled(3, 3, 1.0);
        let out = fragmentation(&r, FragmentationParams::default()).unwrap();

        let class = out.class.unwrap();
        let density = out.density.unwrap();
        let connectivity = out.connectivity.unwrap();
        for row in 0..3 {
            for col in 0..3 {
                assert_eq!(class.get(row, col).unwrap(), class::INTERIOR);
                assert_eq!(density.get(row, col).unwrap(), 1.0);
                assert_eq!(connectivity.get(row, col).unwrap(), 1.0);
            }
        }
    }

    #[test]
    fn test_checkerboard_center_is_transitional() {
        let r = raster(&[&[1.0, 0.0, 1.0], &[0.0, 1.0, 0.0], &[1.0, 0.0, 1.0]]);
        let out = fragmentation(&r, FragmentationParams::default()).unwrap();

        assert_relative_eq!(out.density.unwrap().get(1, 1).unwrap(), 5.0 / 9.0);
        assert_eq!(out.connectivity.unwrap().get(1, 1).unwrap(), 0.0);
        assert_eq!(out.class.unwrap().get(1, 1).unwrap(), class::TRANSITIONAL);
    }

    #[test]
    fn test_stripes_statistics() {
        let out = fragmentation(&stripes(), FragmentationParams::default()).unwrap();
        let density = out.density.unwrap();
        let connectivity = out.connectivity.unwrap();

        // Top-left window is 2x3 cells: 3 occupied of 6; 2 of 6 pairs fully occupied
        assert_relative_eq!(density.get(0, 0).unwrap(), 0.5);
        assert_relative_eq!(connectivity.get(0, 0).unwrap(), 1.0 / 3.0);
        // Interior window: 6 of 9 occupied; 7 of 10 pairs
        assert_relative_eq!(density.get(1, 1).unwrap(), 2.0 / 3.0);
        assert_relative_eq!(connectivity.get(1, 1).unwrap(), 0.7);
        assert_relative_eq!(connectivity.get(1, 3).unwrap(), 0.4);
    }

    #[test]
    fn test_stripes_classes() {
        let out = fragmentation(&stripes(), FragmentationParams::default()).unwrap();
        let edge_row = vec![2.0, 5.0, 5.0, 3.0, 5.0, 6.0];
        let mid_row = vec![2.0, 4.0, 4.0, 3.0, 4.0, 6.0];
        assert_eq!(
            codes(&out.class.unwrap()),
            vec![edge_row.clone(), mid_row.clone(), mid_row, edge_row]
        );
    }

    #[test]
    fn test_tie_policies() {
        let ties = [(0, 1), (0, 2), (0, 4), (3, 1), (3, 2), (3, 4)];
        for (policy, expected) in [
            (UndeterminedPolicy::Undetermined, class::UNDETERMINED),
            (UndeterminedPolicy::Perforated, class::PERFORATED),
            (UndeterminedPolicy::Edge, class::EDGE),
        ] {
            let params = FragmentationParams {
                undetermined: policy,
                ..Default::default()
            };
            let class = fragmentation(&stripes(), params).unwrap().class.unwrap();
            for &(row, col) in &ties {
                assert_eq!(class.get(row, col).unwrap(), expected, "{} at ({}, {})", policy, row, col);
            }
            assert_eq!(class.get(1, 1).unwrap(), class::EDGE);
        }
    }

    #[test]
    fn test_random_policy_is_seeded_per_cell() {
        let run = |seed| {
            let params = FragmentationParams {
                undetermined: UndeterminedPolicy::Random,
                seed,
                ..Default::default()
            };
            fragmentation(&stripes(), params).unwrap().class.unwrap()
        };

        let a = run(7);
        let b = run(7);
        assert_eq!(codes(&a), codes(&b));

        for &(row, col) in &[(0, 1), (0, 2), (0, 4), (3, 1), (3, 2), (3, 4)] {
            let v = a.get(row, col).unwrap();
            assert!(v == class::PERFORATED || v == class::EDGE, "tie resolved to {}", v);
            let expected = classify_cell(2.0 / 3.0, 2.0 / 3.0, UndeterminedPolicy::Random, 7, row, col)
                .unwrap()
                .value();
            assert_eq!(v, expected);
        }
        // Non-tie cells are unaffected by the policy
        assert_eq!(a.get(1, 3).unwrap(), class::PERFORATED);
    }

    #[test]
    fn test_random_draws_vary_with_position_and_seed() {
        let draws: Vec<FragmentationClass> = (0..64)
            .map(|i| classify_cell(0.75, 0.75, UndeterminedPolicy::Random, 42, i / 8, i % 8).unwrap())
            .collect();
        assert!(draws.contains(&FragmentationClass::Perforated));
        assert!(draws.contains(&FragmentationClass::Edge));

        let other_seed: Vec<FragmentationClass> = (0..64)
            .map(|i| classify_cell(0.75, 0.75, UndeterminedPolicy::Random, 43, i / 8, i % 8).unwrap())
            .collect();
        assert_ne!(draws, other_seed);
    }

    #[test]
    fn test_classify_decision_table() {
        let p = UndeterminedPolicy::Undetermined;
        let c = |pf, pff| classify_cell(pf, pff, p, 0, 0, 0);

        assert_eq!(c(NAN, 0.5), None);
        assert_eq!(c(0.5, NAN), None);
        assert_eq!(c(0.0, 0.0), Some(FragmentationClass::None));
        assert_eq!(c(0.39, 0.9), Some(FragmentationClass::Patch));
        assert_eq!(c(0.4, 0.9), Some(FragmentationClass::Transitional));
        assert_eq!(c(0.59, 0.1), Some(FragmentationClass::Transitional));
        assert_eq!(c(0.6, 0.5), Some(FragmentationClass::Perforated));
        assert_eq!(c(0.6, 0.7), Some(FragmentationClass::Edge));
        assert_eq!(c(0.6, 0.6), Some(FragmentationClass::Undetermined));
        assert_eq!(c(1.0, 0.2), Some(FragmentationClass::Interior));
        assert_eq!(c(1.0, 1.0), Some(FragmentationClass::Interior));
    }

    #[test]
    fn test_missing_cells_excluded_by_default() {
        let mut r = Raster::filled(5, 5, 1.0);
        r.set(2, 2, NAN).unwrap();

        let class = fragmentation(&r, FragmentationParams::default()).unwrap().class.unwrap();
        assert!(class.data().iter().all(|&v| v == class::INTERIOR));
    }

    #[test]
    fn test_missing_as_eligible_lowers_interior() {
        let mut r = Raster::filled(5, 5, 1.0);
        r.set(2, 2, NAN).unwrap();

        let params = FragmentationParams {
            missing_as_eligible: true,
            ..Default::default()
        };
        let out = fragmentation(&r, params).unwrap();
        let class = out.class.unwrap();

        assert_eq!(
            codes(&class),
            vec![
                vec![2.0, 4.0, 4.0, 4.0, 2.0],
                vec![4.0, 3.0, 3.0, 3.0, 4.0],
                vec![4.0, 3.0, 3.0, 3.0, 4.0],
                vec![4.0, 3.0, 3.0, 3.0, 4.0],
                vec![2.0, 4.0, 4.0, 4.0, 2.0],
            ]
        );
        assert_relative_eq!(out.density.unwrap().get(0, 0).unwrap(), 4.0 / 9.0);
    }

    #[test]
    fn test_declared_nodata_is_missing() {
        let mut r = Raster::filled(5, 5, 1.0);
        r.set(2, 2, -9999.0).unwrap();
        r.set_nodata(Some(-9999.0));

        let params = FragmentationParams {
            missing_as_eligible: true,
            ..Default::default()
        };
        let class = fragmentation(&r, params).unwrap().class.unwrap();
        assert_eq!(class.get(2, 2).unwrap(), class::PERFORATED);
    }

    #[test]
    fn test_padding_with_zero_matches_missing_as_eligible() {
        let padded = fragmentation(
            &stripes(),
            FragmentationParams {
                pad: true,
                pad_value: 0.0,
                ..Default::default()
            },
        )
        .unwrap();
        let eligible = fragmentation(
            &stripes(),
            FragmentationParams {
                missing_as_eligible: true,
                ..Default::default()
            },
        )
        .unwrap();

        let padded_class = padded.class.unwrap();
        assert_eq!(padded_class.shape(), (4, 6));
        assert_eq!(codes(&padded_class), codes(&eligible.class.unwrap()));
        assert_eq!(
            codes(&padded_class),
            vec![
                vec![1.0, 2.0, 2.0, 2.0, 2.0, 2.0],
                vec![1.0, 4.0, 4.0, 3.0, 4.0, 4.0],
                vec![1.0, 4.0, 4.0, 3.0, 4.0, 4.0],
                vec![1.0, 2.0, 2.0, 2.0, 2.0, 2.0],
            ]
        );
    }

    #[test]
    fn test_padding_with_occupied_cells() {
        let out = fragmentation(
            &stripes(),
            FragmentationParams {
                pad: true,
                pad_value: 1.0,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            codes(&out.class.unwrap()),
            vec![
                vec![3.0, 3.0, 3.0, 3.0, 3.0, 6.0],
                vec![3.0, 4.0, 4.0, 3.0, 4.0, 6.0],
                vec![3.0, 4.0, 4.0, 3.0, 4.0, 6.0],
                vec![3.0, 3.0, 3.0, 3.0, 3.0, 6.0],
            ]
        );
    }

    #[test]
    fn test_padding_with_missing_changes_nothing() {
        let plain = fragmentation(&stripes(), FragmentationParams::default()).unwrap();
        let padded = fragmentation(
            &stripes(),
            FragmentationParams {
                pad: true,
                size: 5,
                ..Default::default()
            },
        )
        .unwrap();
        let plain5 = fragmentation(
            &stripes(),
            FragmentationParams {
                size: 5,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(codes(&padded.class.unwrap()), codes(&plain5.class.unwrap()));
        assert_eq!(plain.class.unwrap().shape(), (4, 6));
    }

    #[test]
    fn test_outputs_keep_input_georeferencing() {
        let mut r = stripes();
        r.set_transform(GeoTransform::new(712345.5, 4410000.25, 30.0, -30.0));
        r.set_crs(Some(CRS::from_epsg(32630)));

        let out = fragmentation(
            &r,
            FragmentationParams {
                pad: true,
                size: 7,
                ..Default::default()
            },
        )
        .unwrap();

        for layer in [out.class, out.density, out.connectivity] {
            let layer = layer.unwrap();
            assert_eq!(layer.shape(), r.shape());
            assert_eq!(layer.transform(), r.transform());
            assert_eq!(layer.bounds(), r.bounds());
            assert_eq!(layer.crs(), r.crs());
            assert!(layer.nodata().is_some_and(f64::is_nan));
        }
    }

    #[test]
    fn test_class_forces_inputs() {
        let params = FragmentationParams {
            density: false,
            connectivity: false,
            class: true,
            ..Default::default()
        };
        let out = fragmentation(&stripes(), params).unwrap();
        assert!(out.forced_inputs);
        assert!(out.class.is_some());
        assert!(out.density.is_some());
        assert!(out.connectivity.is_some());
    }

    #[test]
    fn test_partial_outputs() {
        let params = FragmentationParams {
            connectivity: false,
            class: false,
            ..Default::default()
        };
        let out = fragmentation(&stripes(), params).unwrap();
        assert!(!out.forced_inputs);
        assert!(out.class.is_none());
        assert!(out.connectivity.is_none());
        assert_relative_eq!(out.density.unwrap().get(0, 0).unwrap(), 0.5);

        let none = FragmentationParams {
            density: false,
            connectivity: false,
            class: false,
            ..Default::default()
        };
        let out = fragmentation(&stripes(), none).unwrap();
        assert!(out.class.is_none() && out.density.is_none() && out.connectivity.is_none());
    }

    #[test]
    fn test_invalid_size_fails_before_raster_is_used() {
        let empty: Raster<f64> = Raster::new(0, 0);
        for size in [0, 1, 2, 4, 6] {
            let params = FragmentationParams {
                size,
                ..Default::default()
            };
            let err = fragmentation(&empty, params).unwrap_err();
            assert!(matches!(err, Error::InvalidParameter { name: "size", .. }), "{}", err);
        }
    }

    #[test]
    fn test_empty_raster() {
        let empty: Raster<f64> = Raster::new(0, 4);
        assert!(matches!(
            fragmentation(&empty, FragmentationParams::default()),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_all_empty_window_is_missing() {
        let r = Raster::filled(4, 4, 0.0);
        let out = fragmentation(&r, FragmentationParams::default()).unwrap();
        assert!(out.density.unwrap().data().iter().all(|&v| v == 0.0));
        assert!(out.connectivity.unwrap().data().iter().all(|v| v.is_nan()));
        assert!(out.class.unwrap().data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("undetermined".parse::<UndeterminedPolicy>().unwrap(), UndeterminedPolicy::Undetermined);
        assert_eq!("Perf".parse::<UndeterminedPolicy>().unwrap(), UndeterminedPolicy::Perforated);
        assert_eq!("E".parse::<UndeterminedPolicy>().unwrap(), UndeterminedPolicy::Edge);
        assert_eq!(" RANDOM ".parse::<UndeterminedPolicy>().unwrap(), UndeterminedPolicy::Random);
        assert_eq!("u".parse::<UndeterminedPolicy>().unwrap(), UndeterminedPolicy::Undetermined);

        for bad in ["", "x", "edges", "perforatedx", "none"] {
            assert!(
                matches!(
                    bad.parse::<UndeterminedPolicy>(),
                    Err(Error::InvalidParameter { name: "undetermined", .. })
                ),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_class_codes() {
        for (i, class) in FragmentationClass::ALL.iter().enumerate() {
            assert_eq!(class.code() as usize, i);
            assert_eq!(FragmentationClass::from_code(i as u8), Some(*class));
        }
        assert_eq!(FragmentationClass::from_code(7), None);
        assert_eq!(FragmentationClass::Perforated.value(), class::PERFORATED);
        assert_eq!(FragmentationClass::Interior.to_string(), "interior");
    }

    #[test]
    fn test_algorithm_trait() {
        let algo = Fragmentation;
        assert_eq!(algo.name(), "Fragmentation");
        let out = algo.execute_default(stripes()).unwrap();
        assert_eq!(out.class.unwrap().get(0, 5).unwrap(), class::INTERIOR);
    }
}
