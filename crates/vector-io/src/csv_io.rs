//! Delimited-text reader and writer with WKT or lon/lat geometry columns.

use geo_types::{Geometry, Point};
use gis_common::{GisError, GisResult};
use serde_json::Value;
use wkt::{ToWkt, TryFromWkt};

use crate::dataset::{json_number, Feature, Properties, VectorDataset};

const FORMAT: &str = "CSV";

/// Column written for the WKT geometry.
pub const GEOMETRY_COLUMN: &str = "geometry";

const WKT_COLUMNS: &[&str] = &["wkt", "geometry", "geom"];
const LON_COLUMNS: &[&str] = &["lon", "lng", "longitude", "x"];
const LAT_COLUMNS: &[&str] = &["lat", "latitude", "y"];

#[derive(Debug, Clone, Copy)]
enum GeometrySource {
    Wkt(usize),
    LonLat { lon: usize, lat: usize },
    None,
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(candidate))
    })
}

fn detect_geometry(headers: &[String]) -> GeometrySource {
    if let Some(index) = find_column(headers, WKT_COLUMNS) {
        return GeometrySource::Wkt(index);
    }
    match (
        find_column(headers, LON_COLUMNS),
        find_column(headers, LAT_COLUMNS),
    ) {
        (Some(lon), Some(lat)) => GeometrySource::LonLat { lon, lat },
        _ => GeometrySource::None,
    }
}

/// Integers and floats become numbers; empty cells become null.
fn cell_value(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => json_number(f),
        _ => Value::String(cell.to_string()),
    }
}

fn parse_coordinate(cell: &str, column: &str, row: usize) -> GisResult<Option<f64>> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<f64>().map(Some).map_err(|_| {
        GisError::parse(
            FORMAT,
            format!("row {}: '{}' is not a number in column '{}'", row, cell, column),
        )
    })
}

/// Parse CSV text. The dataset carries no CRS.
pub fn parse_csv(text: &str) -> GisResult<VectorDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| GisError::parse(FORMAT, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let source = detect_geometry(&headers);

    let mut features = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| GisError::parse(FORMAT, e))?;
        let row = index + 1;

        let geometry = match source {
            GeometrySource::Wkt(column) => match record.get(column).map(str::trim) {
                Some(text) if !text.is_empty() => Some(
                    Geometry::<f64>::try_from_wkt_str(text)
                        .map_err(|e| GisError::parse(FORMAT, format!("row {}: {}", row, e)))?,
                ),
                _ => None,
            },
            GeometrySource::LonLat { lon, lat } => {
                let x = parse_coordinate(record.get(lon).unwrap_or(""), &headers[lon], row)?;
                let y = parse_coordinate(record.get(lat).unwrap_or(""), &headers[lat], row)?;
                match (x, y) {
                    (Some(x), Some(y)) => Some(Geometry::Point(Point::new(x, y))),
                    _ => None,
                }
            }
            GeometrySource::None => None,
        };

        let mut properties = Properties::new();
        for (column, header) in headers.iter().enumerate() {
            if matches!(source, GeometrySource::Wkt(wkt) if wkt == column) {
                continue;
            }
            let value = record.get(column).map(cell_value).unwrap_or(Value::Null);
            properties.insert(header.clone(), value);
        }

        features.push(Feature::new(geometry, properties));
    }

    Ok(VectorDataset::new(features, None))
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Serialize attributes (union of keys, first-seen order) plus a WKT column.
pub fn write_csv(dataset: &VectorDataset) -> GisResult<String> {
    let mut columns: Vec<&str> = Vec::new();
    for feature in &dataset.features {
        for key in feature.properties.keys() {
            if key != GEOMETRY_COLUMN && !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(columns.iter().copied().chain(std::iter::once(GEOMETRY_COLUMN)))
        .map_err(|e| GisError::serialize(FORMAT, e))?;

    for feature in &dataset.features {
        let mut row: Vec<String> = columns
            .iter()
            .map(|c| cell_text(feature.properties.get(*c)))
            .collect();
        row.push(
            feature
                .geometry
                .as_ref()
                .map(|g| g.wkt_string())
                .unwrap_or_default(),
        );
        writer
            .write_record(&row)
            .map_err(|e| GisError::serialize(FORMAT, e))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| GisError::serialize(FORMAT, e))?;
    String::from_utf8(bytes).map_err(|e| GisError::serialize(FORMAT, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;

    #[test]
    fn test_parse_wkt_column() {
        let text = "id,name,WKT\n1,a,POINT(1 2)\n2,b,\n";
        let dataset = parse_csv(text).unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(dataset.crs.is_none());
        assert_eq!(dataset.features[0].geometry, Some(point!(x: 1., y: 2.).into()));
        assert!(dataset.features[1].geometry.is_none());
        assert_eq!(dataset.features[0].properties["id"], 1);
        assert!(!dataset.features[0].properties.contains_key("WKT"));
    }

    #[test]
    fn test_parse_lon_lat_columns() {
        let text = "Station,Latitude,Longitude,temp\nOslo,59.9,10.75,4.5\nBergen,60.4,5.3,\n";
        let dataset = parse_csv(text).unwrap();
        assert_eq!(
            dataset.features[0].geometry,
            Some(point!(x: 10.75, y: 59.9).into())
        );
        assert_eq!(dataset.features[0].properties["temp"], 4.5);
        assert_eq!(dataset.features[1].properties["temp"], Value::Null);
        assert_eq!(dataset.features[1].properties["Station"], "Bergen");
    }

    #[test]
    fn test_parse_rejects_bad_wkt() {
        let err = parse_csv("wkt\nPOINT(abc)\n").unwrap_err();
        assert_eq!(err.code(), "parse_error");
    }

    #[test]
    fn test_parse_without_geometry_columns() {
        let dataset = parse_csv("a,b\n1,2\n").unwrap();
        assert!(dataset.features[0].geometry.is_none());
        assert_eq!(dataset.features[0].properties.len(), 2);
    }

    #[test]
    fn test_write_union_of_columns() {
        let mut first = Properties::new();
        first.insert("a".into(), 1.into());
        let mut second = Properties::new();
        second.insert("b".into(), "x, y".into());

        let dataset = VectorDataset::new(
            vec![
                Feature::new(Some(point!(x: 1., y: 2.).into()), first),
                Feature::new(None, second),
            ],
            None,
        );

        let text = write_csv(&dataset).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "a,b,geometry");
        assert_eq!(lines[1], "1,,POINT(1 2)");
        assert_eq!(lines[2], ",\"x, y\",");

        let parsed = parse_csv(&text).unwrap();
        assert_eq!(parsed.features[0].geometry, dataset.features[0].geometry);
    }
}
