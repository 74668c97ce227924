//! ESRI Shapefile reader and writer.
//!
//! Reading yields every shape with its dBase record; the `.prj` sidecar, when
//! present, becomes the dataset CRS. Writing produces `.shp`, `.shx`, `.dbf`
//! and `.prj` next to each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use geo_types::{Geometry, MultiLineString, MultiPoint, MultiPolygon};
use gis_common::crs::WGS84_PRJ_WKT;
use gis_common::{Crs, GisError, GisResult};
use serde_json::Value;
use tracing::{debug, warn};

use crate::dataset::{geometry_type_name, json_number, Feature, Properties, VectorDataset};

const FORMAT: &str = "Shapefile";

/// dBase limits field names to 10 bytes.
const MAX_FIELD_NAME_LEN: usize = 10;

/// Maximum width of a dBase character field.
const MAX_CHARACTER_LEN: u8 = 254;

/// Row-number column written when the dataset has no attributes.
const FID_FIELD: &str = "FID";

/// Read a shapefile given the path of its `.shp` member.
pub fn read_shapefile(path: &Path) -> GisResult<VectorDataset> {
    let mut reader =
        shapefile::Reader::from_path(path).map_err(|e| GisError::parse(FORMAT, e))?;

    let mut features = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.map_err(|e| GisError::parse(FORMAT, e))?;
        let geometry = match shape {
            shapefile::Shape::NullShape => None,
            shape => Some(Geometry::<f64>::try_from(shape).map_err(|e| GisError::parse(FORMAT, e))?),
        };
        features.push(Feature::new(geometry, record_to_properties(record)));
    }

    let crs = read_prj(path)?;
    debug!(
        path = %path.display(),
        features = features.len(),
        crs = ?crs,
        "Read shapefile"
    );

    Ok(VectorDataset::new(features, crs))
}

fn read_prj(shp_path: &Path) -> GisResult<Option<Crs>> {
    for ext in ["prj", "PRJ"] {
        let prj_path = shp_path.with_extension(ext);
        if prj_path.exists() {
            let wkt = std::fs::read_to_string(&prj_path)?;
            return Crs::parse(&wkt)
                .map(Some)
                .map_err(|e| GisError::parse(FORMAT, e));
        }
    }
    Ok(None)
}

fn record_to_properties(record: Record) -> Properties {
    let map: HashMap<String, FieldValue> = record.into();
    let mut entries: Vec<_> = map.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    entries
        .into_iter()
        .map(|(name, value)| (name, field_value_to_json(value)))
        .collect()
}

fn field_value_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(s) => s.map(Value::String).unwrap_or(Value::Null),
        FieldValue::Numeric(n) => n.map(json_number).unwrap_or(Value::Null),
        FieldValue::Float(f) => f.map(|f| json_number(f as f64)).unwrap_or(Value::Null),
        FieldValue::Integer(i) => Value::from(i),
        FieldValue::Double(d) | FieldValue::Currency(d) => json_number(d),
        FieldValue::Logical(b) => b.map(Value::Bool).unwrap_or(Value::Null),
        FieldValue::Date(d) => d
            .map(|d| Value::String(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())))
            .unwrap_or(Value::Null),
        FieldValue::Memo(s) => Value::String(s),
        _ => Value::Null,
    }
}

/// Geometry family stored in a single shapefile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeFamily {
    Point,
    MultiPoint,
    Line,
    Polygon,
}

impl ShapeFamily {
    fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(ShapeFamily::Point),
            Geometry::MultiPoint(_) => Some(ShapeFamily::MultiPoint),
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                Some(ShapeFamily::Line)
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => Some(ShapeFamily::Polygon),
            Geometry::GeometryCollection(_) => None,
        }
    }

    /// Points and multipoints share a file as multipoints.
    fn merge(self, other: Self) -> Option<Self> {
        use ShapeFamily::*;
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Point, MultiPoint) | (MultiPoint, Point) => Some(MultiPoint),
            _ => None,
        }
    }
}

fn is_empty_geometry(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::MultiPolygon(mp) => mp.0.is_empty(),
        Geometry::MultiLineString(mls) => mls.0.is_empty(),
        Geometry::MultiPoint(mp) => mp.0.is_empty(),
        Geometry::LineString(ls) => ls.0.is_empty(),
        Geometry::Polygon(p) => p.exterior().0.is_empty(),
        Geometry::GeometryCollection(gc) => gc.0.is_empty(),
        _ => false,
    }
}

fn resolve_family(dataset: &VectorDataset) -> GisResult<ShapeFamily> {
    let mut family: Option<ShapeFamily> = None;
    for geometry in dataset.geometries().filter(|g| !is_empty_geometry(g)) {
        let next = ShapeFamily::of(geometry).ok_or_else(|| {
            GisError::InvalidInput(format!(
                "shapefile output cannot hold {} geometries",
                geometry_type_name(geometry)
            ))
        })?;
        family = match family {
            None => Some(next),
            Some(current) => Some(current.merge(next).ok_or_else(|| {
                GisError::InvalidInput(format!(
                    "shapefile output requires a single geometry family, found {:?} and {:?}",
                    current, next
                ))
            })?),
        };
    }
    family.ok_or_else(|| GisError::InvalidInput("no geometries to write as shapefile".to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Real,
    Logical,
    Character,
}

#[derive(Debug)]
struct Column {
    key: String,
    field_name: String,
    kind: ColumnKind,
}

/// Infer the dBase schema from attribute values, first-seen key order.
fn infer_columns(dataset: &VectorDataset) -> Vec<Column> {
    let mut keys: Vec<String> = Vec::new();
    for feature in &dataset.features {
        for key in feature.properties.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }

    let mut used_names: Vec<String> = Vec::new();
    keys.into_iter()
        .map(|key| {
            let values = dataset
                .features
                .iter()
                .filter_map(|f| f.properties.get(&key))
                .filter(|v| !v.is_null());

            let mut kind: Option<ColumnKind> = None;
            for value in values {
                let value_kind = match value {
                    Value::Number(n) if n.is_i64() || n.is_u64() => ColumnKind::Integer,
                    Value::Number(_) => ColumnKind::Real,
                    Value::Bool(_) => ColumnKind::Logical,
                    _ => ColumnKind::Character,
                };
                kind = Some(match (kind, value_kind) {
                    (None, k) => k,
                    (Some(a), b) if a == b => a,
                    (Some(ColumnKind::Integer), ColumnKind::Real)
                    | (Some(ColumnKind::Real), ColumnKind::Integer) => ColumnKind::Real,
                    _ => ColumnKind::Character,
                });
            }

            let field_name = unique_field_name(&key, &mut used_names);
            Column {
                key,
                field_name,
                kind: kind.unwrap_or(ColumnKind::Character),
            }
        })
        .collect()
}

/// Truncate to the dBase limit and de-duplicate with a numeric suffix.
fn unique_field_name(key: &str, used: &mut Vec<String>) -> String {
    let ascii: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let base: String = ascii.chars().take(MAX_FIELD_NAME_LEN).collect();
    let base = if base.is_empty() { "field".to_string() } else { base };

    let mut candidate = base.clone();
    let mut counter = 1;
    while used.iter().any(|u| u.eq_ignore_ascii_case(&candidate)) {
        let suffix = counter.to_string();
        let keep = MAX_FIELD_NAME_LEN.saturating_sub(suffix.len()).min(base.len());
        candidate = format!("{}{}", &base[..keep], suffix);
        counter += 1;
    }
    used.push(candidate.clone());
    candidate
}

fn field_name(name: &str) -> GisResult<FieldName> {
    FieldName::try_from(name).map_err(|e| GisError::serialize(FORMAT, format!("{:?}", e)))
}

fn table_builder(columns: &[Column]) -> GisResult<TableWriterBuilder> {
    let mut builder = TableWriterBuilder::new();
    if columns.is_empty() {
        builder = builder.add_numeric_field(field_name(FID_FIELD)?, 18, 0);
    }
    for column in columns {
        let name = field_name(&column.field_name)?;
        builder = match column.kind {
            ColumnKind::Integer => builder.add_numeric_field(name, 18, 0),
            ColumnKind::Real => builder.add_numeric_field(name, 24, 8),
            ColumnKind::Logical => builder.add_logical_field(name),
            ColumnKind::Character => builder.add_character_field(name, MAX_CHARACTER_LEN),
        };
    }
    Ok(builder)
}

fn to_field_value(kind: ColumnKind, value: Option<&Value>) -> FieldValue {
    let value = value.filter(|v| !v.is_null());
    match kind {
        ColumnKind::Integer | ColumnKind::Real => {
            FieldValue::Numeric(value.and_then(|v| v.as_f64()))
        }
        ColumnKind::Logical => FieldValue::Logical(value.and_then(|v| v.as_bool())),
        ColumnKind::Character => FieldValue::Character(value.map(|v| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            text.chars().take(MAX_CHARACTER_LEN as usize).collect()
        })),
    }
}

fn to_multi_polygon(geometry: &Geometry<f64>) -> MultiPolygon<f64> {
    match geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        Geometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]),
        Geometry::Triangle(t) => MultiPolygon::new(vec![t.to_polygon()]),
        _ => MultiPolygon::new(vec![]),
    }
}

fn to_multi_line_string(geometry: &Geometry<f64>) -> MultiLineString<f64> {
    match geometry {
        Geometry::Line(l) => MultiLineString::new(vec![(*l).into()]),
        Geometry::LineString(ls) => MultiLineString::new(vec![ls.clone()]),
        Geometry::MultiLineString(mls) => mls.clone(),
        _ => MultiLineString::new(vec![]),
    }
}

fn to_multi_point(geometry: &Geometry<f64>) -> MultiPoint<f64> {
    match geometry {
        Geometry::Point(p) => MultiPoint::new(vec![*p]),
        Geometry::MultiPoint(mp) => mp.clone(),
        _ => MultiPoint::new(vec![]),
    }
}

/// Write `dataset` to `shp_path` and its sidecars; returns every file written.
pub fn write_shapefile(dataset: &VectorDataset, shp_path: &Path) -> GisResult<Vec<PathBuf>> {
    let family = resolve_family(dataset)?;
    let columns = infer_columns(dataset);

    let mut writer = shapefile::Writer::from_path(shp_path, table_builder(&columns)?)
        .map_err(|e| GisError::serialize(FORMAT, e))?;

    let mut skipped = 0usize;
    for (index, feature) in dataset.features.iter().enumerate() {
        let Some(geometry) = feature.geometry.as_ref().filter(|g| !is_empty_geometry(g)) else {
            skipped += 1;
            continue;
        };

        let mut record = Record::default();
        if columns.is_empty() {
            record.insert(FID_FIELD.to_string(), FieldValue::Numeric(Some(index as f64)));
        }
        for column in &columns {
            record.insert(
                column.field_name.clone(),
                to_field_value(column.kind, feature.properties.get(&column.key)),
            );
        }

        let written = match family {
            ShapeFamily::Polygon => writer.write_shape_and_record(
                &shapefile::Polygon::from(to_multi_polygon(geometry)),
                &record,
            ),
            ShapeFamily::Line => writer.write_shape_and_record(
                &shapefile::Polyline::from(to_multi_line_string(geometry)),
                &record,
            ),
            ShapeFamily::MultiPoint => writer.write_shape_and_record(
                &shapefile::Multipoint::from(to_multi_point(geometry)),
                &record,
            ),
            ShapeFamily::Point => match geometry {
                Geometry::Point(p) => {
                    writer.write_shape_and_record(&shapefile::Point::from(*p), &record)
                }
                _ => continue,
            },
        };
        written.map_err(|e| GisError::serialize(FORMAT, e))?;
    }
    // Headers are finalized when the writer is dropped.
    drop(writer);

    if skipped > 0 {
        warn!(skipped, "Skipped features without geometry in shapefile output");
    }

    if let Some(wkt) = prj_wkt(dataset.crs.as_ref()) {
        std::fs::write(shp_path.with_extension("prj"), wkt)?;
    }

    Ok(["shp", "shx", "dbf", "prj"]
        .iter()
        .map(|ext| shp_path.with_extension(ext))
        .filter(|p| p.exists())
        .collect())
}

fn prj_wkt(crs: Option<&Crs>) -> Option<String> {
    match crs {
        Some(crs) if crs.is_wgs84() => Some(WGS84_PRJ_WKT.to_string()),
        Some(crs) if crs.epsg().is_none() && crs.definition().contains('[') => {
            Some(crs.definition().to_string())
        }
        _ => None,
    }
}
