//! Vector feature model and format codecs.
//!
//! Every reader produces a [`VectorDataset`]; every writer consumes one. The
//! format is chosen by [`InputFormat`] / [`OutputFormat`] from `gis-common`.

pub mod csv_io;
pub mod dataset;
pub mod geojson_io;
pub mod kml_io;
pub mod shapefile_io;

use std::path::{Path, PathBuf};

use gis_common::{GisError, GisResult, InputFormat, OutputFormat};
use tracing::info;

pub use dataset::{geometry_type_name, Feature, Properties, VectorDataset};

/// Read a vector file from disk.
///
/// `ZippedShapefile` must already be extracted; pass the `.shp` path with
/// [`InputFormat::Shapefile`]. Unrecognized extensions go through the GeoJSON
/// reader.
pub fn read_vector(path: &Path, format: &InputFormat) -> GisResult<VectorDataset> {
    let dataset = match format {
        InputFormat::Shapefile => shapefile_io::read_shapefile(path)?,
        InputFormat::GeoJson | InputFormat::Other(_) => {
            geojson_io::parse_geojson(&read_text(path)?)?
        }
        InputFormat::Kml => kml_io::parse_kml(&read_text(path)?)?,
        InputFormat::Csv => csv_io::parse_csv(&read_text(path)?)?,
        InputFormat::ZippedShapefile | InputFormat::GeoTiff => {
            return Err(GisError::Internal(format!(
                "{} cannot be read as a vector file",
                format
            )))
        }
    };

    info!(
        path = %path.display(),
        format = %format,
        features = dataset.len(),
        "Loaded vector dataset"
    );
    Ok(dataset)
}

fn read_text(path: &Path) -> GisResult<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write `dataset` into `out_dir` as `<stem>.<ext>`.
///
/// Returns every file produced; a shapefile yields its sidecars too.
pub fn write_vector(
    dataset: &VectorDataset,
    format: OutputFormat,
    out_dir: &Path,
    stem: &str,
) -> GisResult<Vec<PathBuf>> {
    let path = out_dir.join(format!("{}.{}", stem, format.extension()));

    match format {
        OutputFormat::GeoJson => {
            std::fs::write(&path, geojson_io::write_geojson(dataset)?)?;
            Ok(vec![path])
        }
        OutputFormat::Kml => {
            std::fs::write(&path, kml_io::write_kml(dataset, stem)?)?;
            Ok(vec![path])
        }
        OutputFormat::Csv => {
            std::fs::write(&path, csv_io::write_csv(dataset)?)?;
            Ok(vec![path])
        }
        OutputFormat::Shapefile => shapefile_io::write_shapefile(dataset, &path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;
    use gis_common::Crs;

    fn sample() -> VectorDataset {
        let mut properties = Properties::new();
        properties.insert("name".into(), "well".into());
        VectorDataset::new(
            vec![Feature::new(Some(point!(x: 3., y: 4.).into()), properties)],
            Some(Crs::wgs84()),
        )
    }

    #[test]
    fn test_write_and_read_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = sample();

        for (format, input) in [
            (OutputFormat::GeoJson, InputFormat::GeoJson),
            (OutputFormat::Kml, InputFormat::Kml),
            (OutputFormat::Csv, InputFormat::Csv),
            (OutputFormat::Shapefile, InputFormat::Shapefile),
        ] {
            let written = write_vector(&dataset, format, dir.path(), "converted").unwrap();
            let parsed = read_vector(&written[0], &input).unwrap();
            assert_eq!(parsed.len(), 1, "{:?}", format);
            assert_eq!(parsed.features[0].properties["name"], "well", "{:?}", format);
            assert_eq!(parsed.features[0].geometry, dataset.features[0].geometry, "{:?}", format);
        }
    }

    #[test]
    fn test_shapefile_write_lists_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_vector(&sample(), OutputFormat::Shapefile, dir.path(), "out").unwrap();
        let names: Vec<_> = written
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["out.shp", "out.shx", "out.dbf", "out.prj"]);
    }

    #[test]
    fn test_unknown_extension_uses_geojson_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.data");
        std::fs::write(&path, r#"{"type":"Point","coordinates":[1,2]}"#).unwrap();
        let dataset = read_vector(&path, &InputFormat::Other(".data".into())).unwrap();
        assert_eq!(dataset.len(), 1);
    }
}
