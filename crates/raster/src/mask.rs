//! Crop a raster to a polygon mask.

use geo::{BoundingRect, Intersects};
use geo_types::{MultiPolygon, Point};
use gis_common::{GisError, GisResult};
use tracing::debug;

use crate::model::Raster;

/// Crop `raster` to the bounding window of `mask` and blank everything
/// outside it.
///
/// The window is snapped outward to whole pixels. Pixels whose centers fall
/// outside every polygon are set to the raster's nodata value, or 0 when it
/// has none. `mask` must already be in the raster's CRS.
pub fn crop_to_mask(raster: &Raster, mask: &MultiPolygon<f64>) -> GisResult<Raster> {
    let bounds = mask
        .bounding_rect()
        .ok_or_else(|| GisError::InvalidInput("mask contains no polygons".to_string()))?;

    let window = raster
        .transform
        .window_for(&bounds, raster.width, raster.height)
        .ok_or_else(|| GisError::EmptyResult("mask does not overlap the raster".to_string()))?;

    let mut out = raster.window(&window)?;

    let fill: Vec<u8> = out
        .layout
        .encode_sample(raster.nodata.unwrap_or(0.0))
        .repeat(out.layout.samples_per_pixel as usize);
    let bpp = out.layout.bytes_per_pixel();
    let stride = out.row_stride();

    let mut masked = 0usize;
    for row in 0..out.height {
        for col in 0..out.width {
            let (x, y) = out.transform.pixel_center(col, row);
            if mask.intersects(&Point::new(x, y)) {
                continue;
            }
            let start = row as usize * stride + col as usize * bpp;
            out.data[start..start + bpp].copy_from_slice(&fill);
            masked += 1;
        }
    }

    debug!(
        window = ?window,
        masked,
        total = out.width as usize * out.height as usize,
        "Cropped raster to mask"
    );

    Ok(out)
}
