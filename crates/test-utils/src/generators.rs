//! Test data generators for zipped shapefiles and synthetic GeoTIFFs.
//!
//! These generators create predictable, verifiable test data so the HTTP
//! tests never depend on binary files checked into the repository.

use std::io::{Cursor, Write};

use gis_common::{Crs, OutputFormat};
use raster::{GeoKeys, GeoTransform, Raster, SampleFormat, SampleLayout};
use zip::write::SimpleFileOptions;

/// Creates a test grid with predictable byte values.
///
/// Each cell value is `(row * width + col) % 251`, which never collides with
/// the 255 nodata value used by [`GeoTiffSpec`].
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[11], 11);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<u8> {
    (0..width * height).map(|i| (i % 251) as u8).collect()
}

/// Builds a zip archive in memory from `(name, bytes)` entries.
///
/// Entry names are used verbatim, so callers can create nested folders or
/// hostile paths.
pub fn zip_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(bytes).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Converts a GeoJSON document into a zipped shapefile named `stem`.
///
/// # Arguments
///
/// * `geojson` - Source features (one geometry family)
/// * `stem` - Base name of the `.shp`/`.shx`/`.dbf`/`.prj` members
/// * `with_prj` - Whether to keep the `.prj` member
pub fn zipped_shapefile(geojson: &str, stem: &str, with_prj: bool) -> Vec<u8> {
    let dataset = vector_io::geojson_io::parse_geojson(geojson).expect("parse fixture");
    let dir = tempfile::tempdir().expect("tempdir");
    let written = vector_io::write_vector(&dataset, OutputFormat::Shapefile, dir.path(), stem)
        .expect("write shapefile");

    let members: Vec<(String, Vec<u8>)> = written
        .iter()
        .filter(|p| with_prj || p.extension().and_then(|e| e.to_str()) != Some("prj"))
        .map(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            (name.to_string(), std::fs::read(p).expect("read member"))
        })
        .collect();

    let entries: Vec<(&str, &[u8])> = members
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
        .collect();
    zip_entries(&entries)
}

/// Description of a synthetic single-band u8 GeoTIFF.
#[derive(Debug, Clone)]
pub struct GeoTiffSpec {
    pub width: u32,
    pub height: u32,
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
    /// EPSG code written to the GeoKey directory; `None` writes no keys.
    pub epsg: Option<u16>,
    pub nodata: Option<f64>,
}

impl GeoTiffSpec {
    /// 100x60 WGS84 grid of 0.001 degree pixels over the fixture scene.
    pub fn scene_wgs84() -> Self {
        Self {
            width: 100,
            height: 60,
            origin_x: 10.70,
            origin_y: 59.94,
            pixel_size: 0.001,
            epsg: Some(4326),
            nodata: Some(255.0),
        }
    }

    pub fn raster(&self) -> Raster {
        let geographic = matches!(self.epsg, Some(4000..=4999));
        Raster {
            width: self.width,
            height: self.height,
            layout: SampleLayout {
                samples_per_pixel: 1,
                bits_per_sample: 8,
                format: SampleFormat::Unsigned,
            },
            data: create_test_grid(self.width as usize, self.height as usize),
            photometric: raster::model::PHOTOMETRIC_MIN_IS_BLACK,
            transform: GeoTransform {
                origin_x: self.origin_x,
                pixel_width: self.pixel_size,
                origin_y: self.origin_y,
                pixel_height: -self.pixel_size,
            },
            nodata: self.nodata,
            geokeys: self
                .epsg
                .map(|code| GeoKeys::for_epsg(code, geographic))
                .unwrap_or_default(),
            crs: self.epsg.map(|code| Crs::from_epsg(code as u32)),
        }
    }

    /// Encoded GeoTIFF bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        raster::geotiff::encode_geotiff(&self.raster()).expect("encode geotiff")
    }
}
