//! North-up affine geotransform and pixel windows.

use geo_types::{coord, Rect};
use gis_common::{GisError, GisResult};

/// Maps pixel (col, row) corners to world coordinates:
/// `x = origin_x + col * pixel_width`, `y = origin_y + row * pixel_height`.
///
/// `pixel_height` is negative for the usual north-up layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub origin_y: f64,
    pub pixel_height: f64,
}

/// A sub-rectangle of a raster, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: u32,
    pub row_off: u32,
    pub width: u32,
    pub height: u32,
}

impl GeoTransform {
    /// Build from `ModelTiepointTag` and `ModelPixelScaleTag`.
    pub fn from_tiepoint(tiepoint: &[f64], scale: &[f64]) -> GisResult<Self> {
        if tiepoint.len() < 6 || scale.len() < 2 {
            return Err(GisError::Raster(
                "ModelTiepoint/ModelPixelScale tags are truncated".to_string(),
            ));
        }
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        let (sx, sy) = (scale[0], scale[1]);
        if sx == 0.0 || sy == 0.0 {
            return Err(GisError::Raster("pixel scale of zero".to_string()));
        }

        Ok(Self {
            origin_x: x - i * sx,
            pixel_width: sx,
            origin_y: y + j * sy,
            pixel_height: -sy,
        })
    }

    /// Build from a 4x4 `ModelTransformationTag`. Rotated grids are rejected.
    pub fn from_model_transformation(matrix: &[f64]) -> GisResult<Self> {
        if matrix.len() < 8 {
            return Err(GisError::Raster(
                "ModelTransformation tag is truncated".to_string(),
            ));
        }
        if matrix[1] != 0.0 || matrix[4] != 0.0 {
            return Err(GisError::Raster(
                "rotated or sheared rasters are not supported".to_string(),
            ));
        }
        if matrix[0] == 0.0 || matrix[5] == 0.0 {
            return Err(GisError::Raster("pixel scale of zero".to_string()));
        }

        Ok(Self {
            origin_x: matrix[3],
            pixel_width: matrix[0],
            origin_y: matrix[7],
            pixel_height: matrix[5],
        })
    }

    pub fn is_north_up(&self) -> bool {
        self.pixel_width > 0.0 && self.pixel_height < 0.0
    }

    /// World coordinate of a pixel's center.
    pub fn pixel_center(&self, col: u32, row: u32) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// World extent of a `width` x `height` grid.
    pub fn bounds(&self, width: u32, height: u32) -> Rect<f64> {
        Rect::new(
            coord! { x: self.origin_x, y: self.origin_y },
            coord! {
                x: self.origin_x + width as f64 * self.pixel_width,
                y: self.origin_y + height as f64 * self.pixel_height,
            },
        )
    }

    /// Pixels touched by `bounds`, snapped outward and clamped to the grid.
    ///
    /// Returns `None` when the bounds miss the grid entirely.
    pub fn window_for(&self, bounds: &Rect<f64>, width: u32, height: u32) -> Option<PixelWindow> {
        let c1 = (bounds.min().x - self.origin_x) / self.pixel_width;
        let c2 = (bounds.max().x - self.origin_x) / self.pixel_width;
        let r1 = (bounds.min().y - self.origin_y) / self.pixel_height;
        let r2 = (bounds.max().y - self.origin_y) / self.pixel_height;

        let col_lo = c1.min(c2).floor().max(0.0);
        let col_hi = c1.max(c2).ceil().min(width as f64);
        let row_lo = r1.min(r2).floor().max(0.0);
        let row_hi = r1.max(r2).ceil().min(height as f64);

        if !(col_lo < col_hi && row_lo < row_hi) {
            return None;
        }

        Some(PixelWindow {
            col_off: col_lo as u32,
            row_off: row_lo as u32,
            width: (col_hi - col_lo) as u32,
            height: (row_hi - row_lo) as u32,
        })
    }

    /// Transform of the grid that starts at `window`'s top-left pixel.
    pub fn cropped(&self, window: &PixelWindow) -> Self {
        Self {
            origin_x: self.origin_x + window.col_off as f64 * self.pixel_width,
            origin_y: self.origin_y + window.row_off as f64 * self.pixel_height,
            ..*self
        }
    }

    /// `ModelPixelScaleTag` values for a north-up grid.
    pub fn pixel_scale(&self) -> [f64; 3] {
        [self.pixel_width, -self.pixel_height, 0.0]
    }

    /// `ModelTiepointTag` values tying pixel (0, 0) to the origin.
    pub fn tiepoint(&self) -> [f64; 6] {
        [0.0, 0.0, 0.0, self.origin_x, self.origin_y, 0.0]
    }

    /// `ModelTransformationTag` values (row-major 4x4).
    #[rustfmt::skip]
    pub fn model_transformation(&self) -> [f64; 16] {
        [
            self.pixel_width, 0.0, 0.0, self.origin_x,
            0.0, self.pixel_height, 0.0, self.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}
