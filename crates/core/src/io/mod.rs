//! Reading and writing rasters
//!
//! Only single-band GeoTIFF is supported. Everything is read into `Raster<f64>`
//! and written back as 32-bit float, which covers binary cover maps and the
//! density/connectivity/class products.

mod geotiff;

pub use geotiff::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
