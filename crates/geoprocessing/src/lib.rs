//! Geometric operations on vector datasets.
//!
//! Both operations assume their inputs are already in a projected CRS where
//! distances and areas are meaningful.

pub mod buffer;
pub mod overlay;

pub use buffer::{buffer_dataset, buffer_geometry};
pub use overlay::{intersect, merge_properties, polygonal, polygons_of};
