//! Raster model and GeoTIFF codec.
//!
//! Pixels are kept as raw little-endian sample bytes described by a
//! [`SampleLayout`], so cropping and masking work the same for every sample
//! type the decoder produces.

pub mod geotiff;
pub mod mask;
pub mod model;
pub mod transform;

pub use geotiff::{read_geotiff, write_geotiff};
pub use mask::crop_to_mask;
pub use model::{GeoKeys, Raster, SampleFormat, SampleLayout};
pub use transform::{GeoTransform, PixelWindow};
