//! In-memory raster with its georeferencing metadata.

use gis_common::{Crs, GisError, GisResult};

use crate::transform::{GeoTransform, PixelWindow};

/// `GTModelTypeGeoKey`
pub const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
/// `GeographicTypeGeoKey`
pub const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
/// `ProjectedCSTypeGeoKey`
pub const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
/// GeoKey value meaning "user-defined".
pub const USER_DEFINED: u16 = 32767;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Unsigned,
    Signed,
    Float,
}

impl SampleFormat {
    /// TIFF `SampleFormat` tag value.
    pub fn tag_value(&self) -> u16 {
        match self {
            SampleFormat::Unsigned => 1,
            SampleFormat::Signed => 2,
            SampleFormat::Float => 3,
        }
    }
}

/// How samples are packed: chunky, little-endian, same type per band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    pub samples_per_pixel: u16,
    pub bits_per_sample: u16,
    pub format: SampleFormat,
}

/// TIFF `PhotometricInterpretation` for single-band or multi-band grids.
pub const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;
pub const PHOTOMETRIC_RGB: u16 = 2;

impl SampleLayout {
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8)
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_sample() * self.samples_per_pixel as usize
    }

    /// Little-endian encoding of `value` as one sample, saturating to range.
    pub fn encode_sample(&self, value: f64) -> Vec<u8> {
        match (self.format, self.bits_per_sample) {
            (SampleFormat::Float, 32) => (value as f32).to_le_bytes().to_vec(),
            (SampleFormat::Float, _) => value.to_le_bytes().to_vec(),
            (SampleFormat::Signed, 8) => (value as i8).to_le_bytes().to_vec(),
            (SampleFormat::Signed, 16) => (value as i16).to_le_bytes().to_vec(),
            (SampleFormat::Signed, 32) => (value as i32).to_le_bytes().to_vec(),
            (SampleFormat::Signed, _) => (value as i64).to_le_bytes().to_vec(),
            (SampleFormat::Unsigned, 8) => (value as u8).to_le_bytes().to_vec(),
            (SampleFormat::Unsigned, 16) => (value as u16).to_le_bytes().to_vec(),
            (SampleFormat::Unsigned, 32) => (value as u32).to_le_bytes().to_vec(),
            (SampleFormat::Unsigned, _) => (value as u64).to_le_bytes().to_vec(),
        }
    }
}

/// GeoKey directory and parameter tags, carried through unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoKeys {
    pub directory: Vec<u16>,
    pub double_params: Option<Vec<f64>>,
    pub ascii_params: Option<String>,
}

impl GeoKeys {
    /// Directory declaring a single EPSG-coded CRS.
    #[rustfmt::skip]
    pub fn for_epsg(code: u16, geographic: bool) -> Self {
        let (model_type, key) = if geographic {
            (2, GEOGRAPHIC_TYPE_GEO_KEY)
        } else {
            (1, PROJECTED_CS_TYPE_GEO_KEY)
        };
        Self {
            directory: vec![
                1, 1, 0, 2,
                GT_MODEL_TYPE_GEO_KEY, 0, 1, model_type,
                key, 0, 1, code,
            ],
            double_params: None,
            ascii_params: None,
        }
    }

    /// Value of a key stored inline in the directory.
    pub fn key(&self, id: u16) -> Option<u16> {
        let count = *self.directory.get(3)? as usize;
        self.directory
            .get(4..4 + count * 4)?
            .chunks_exact(4)
            .find(|entry| entry[0] == id && entry[1] == 0)
            .map(|entry| entry[3])
    }

    /// EPSG CRS declared by the projected or geographic type key.
    pub fn crs(&self) -> Option<Crs> {
        [PROJECTED_CS_TYPE_GEO_KEY, GEOGRAPHIC_TYPE_GEO_KEY]
            .iter()
            .filter_map(|id| self.key(*id))
            .find(|code| *code != 0 && *code != USER_DEFINED)
            .map(|code| Crs::from_epsg(code as u32))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub layout: SampleLayout,
    /// Row-major, chunky, little-endian samples.
    pub data: Vec<u8>,
    pub photometric: u16,
    pub transform: GeoTransform,
    pub nodata: Option<f64>,
    pub geokeys: GeoKeys,
    pub crs: Option<Crs>,
}

impl Raster {
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }

    /// Check that `data` matches the declared dimensions.
    pub fn validate(&self) -> GisResult<()> {
        let expected = self.row_stride() * self.height as usize;
        if self.data.len() != expected {
            return Err(GisError::Raster(format!(
                "pixel buffer holds {} bytes, expected {} for {}x{}",
                self.data.len(),
                expected,
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// Copy out the pixels of `window` with a matching transform.
    pub fn window(&self, window: &PixelWindow) -> GisResult<Raster> {
        if window.col_off + window.width > self.width || window.row_off + window.height > self.height
        {
            return Err(GisError::Raster(format!(
                "window {:?} exceeds {}x{} raster",
                window, self.width, self.height
            )));
        }

        let bpp = self.layout.bytes_per_pixel();
        let stride = self.row_stride();
        let row_bytes = window.width as usize * bpp;
        let mut data = Vec::with_capacity(row_bytes * window.height as usize);
        for row in window.row_off..window.row_off + window.height {
            let start = row as usize * stride + window.col_off as usize * bpp;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }

        Ok(Raster {
            width: window.width,
            height: window.height,
            layout: self.layout,
            data,
            photometric: self.photometric,
            transform: self.transform.cropped(window),
            nodata: self.nodata,
            geokeys: self.geokeys.clone(),
            crs: self.crs.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geokey_crs() {
        assert_eq!(GeoKeys::for_epsg(32633, false).crs(), Some(Crs::from_epsg(32633)));
        assert_eq!(GeoKeys::for_epsg(4326, true).crs(), Some(Crs::wgs84()));
        assert_eq!(GeoKeys::default().crs(), None);
        assert_eq!(GeoKeys::for_epsg(USER_DEFINED, false).crs(), None);
    }

    #[test]
    fn test_encode_sample() {
        let f32_layout = SampleLayout {
            samples_per_pixel: 1,
            bits_per_sample: 32,
            format: SampleFormat::Float,
        };
        assert_eq!(f32_layout.encode_sample(-9999.0), (-9999.0f32).to_le_bytes().to_vec());

        let u8_layout = SampleLayout {
            samples_per_pixel: 3,
            bits_per_sample: 8,
            format: SampleFormat::Unsigned,
        };
        assert_eq!(u8_layout.encode_sample(300.0), vec![255]);
        assert_eq!(u8_layout.bytes_per_pixel(), 3);
    }

    #[test]
    fn test_window_copies_rows() {
        let raster = Raster {
            width: 4,
            height: 3,
            layout: SampleLayout {
                samples_per_pixel: 1,
                bits_per_sample: 8,
                format: SampleFormat::Unsigned,
            },
            data: (0..12).collect(),
            photometric: PHOTOMETRIC_MIN_IS_BLACK,
            transform: GeoTransform {
                origin_x: 0.0,
                pixel_width: 1.0,
                origin_y: 3.0,
                pixel_height: -1.0,
            },
            nodata: None,
            geokeys: GeoKeys::default(),
            crs: None,
        };

        let out = raster
            .window(&PixelWindow { col_off: 1, row_off: 1, width: 2, height: 2 })
            .unwrap();
        assert_eq!(out.data, vec![5, 6, 9, 10]);
        assert_eq!(out.transform.origin_x, 1.0);
        assert_eq!(out.transform.origin_y, 2.0);
        out.validate().unwrap();
    }
}
