//! Common types shared across the quickgis crates and services.

pub mod crs;
pub mod error;
pub mod format;

pub use crs::{Crs, CrsParseError, MissingCrsPolicy};
pub use error::{GisError, GisResult};
pub use format::{InputFormat, OutputFormat};
