//! In-memory feature model shared by every vector codec.

use geo_types::Geometry;
use gis_common::Crs;
use serde_json::Value;

/// Ordered attribute map of a feature.
pub type Properties = serde_json::Map<String, Value>;

/// A single vector feature: optional geometry plus attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Option<Geometry<f64>>, properties: Properties) -> Self {
        Self {
            geometry,
            properties,
        }
    }

    pub fn from_geometry(geometry: Geometry<f64>) -> Self {
        Self::new(Some(geometry), Properties::new())
    }
}

/// A table of features with an optional CRS.
///
/// `crs` is `None` until the dataset is normalized when the source format
/// carried no CRS information (CSV, shapefiles without `.prj`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorDataset {
    pub features: Vec<Feature>,
    pub crs: Option<Crs>,
}

impl VectorDataset {
    pub fn new(features: Vec<Feature>, crs: Option<Crs>) -> Self {
        Self { features, crs }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterate the geometries that are present.
    pub fn geometries(&self) -> impl Iterator<Item = &Geometry<f64>> {
        self.features.iter().filter_map(|f| f.geometry.as_ref())
    }
}

/// OGC name of a geometry's type, for logs and error messages.
pub fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Convert an attribute number to JSON, preferring integers when exact.
pub(crate) fn json_number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;

    #[test]
    fn test_geometries_skips_missing() {
        let dataset = VectorDataset::new(
            vec![
                Feature::from_geometry(point!(x: 1.0, y: 2.0).into()),
                Feature::new(None, Properties::new()),
            ],
            None,
        );
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.geometries().count(), 1);
    }

    #[test]
    fn test_json_number() {
        assert_eq!(json_number(3.0), Value::from(3));
        assert_eq!(json_number(2.5), Value::from(2.5));
        assert_eq!(json_number(f64::NAN), Value::Null);
    }
}
