//! Coordinate reference system transformations.
//!
//! Wraps PROJ for the two jobs a request needs: giving every loaded dataset
//! a CRS, and moving datasets between the output CRS (WGS84) and the metric
//! CRS that distance-based operations run in.

pub mod normalize;
pub mod reproject;

pub use normalize::ensure_crs;
pub use reproject::{reproject, Reprojector};
