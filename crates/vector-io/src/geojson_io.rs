//! GeoJSON reader and writer.

use geo_types::Geometry;
use geojson::{FeatureCollection, GeoJson, JsonObject};
use gis_common::{Crs, GisError, GisResult};

use crate::dataset::{Feature, VectorDataset};

const FORMAT: &str = "GeoJSON";

/// Parse a FeatureCollection, a single Feature, or a bare Geometry.
///
/// RFC 7946 documents are WGS84; a legacy `crs` member overrides that.
pub fn parse_geojson(text: &str) -> GisResult<VectorDataset> {
    let geojson: GeoJson = text.parse().map_err(|e| GisError::parse(FORMAT, e))?;

    let (features, crs) = match geojson {
        GeoJson::FeatureCollection(collection) => {
            let crs = legacy_crs(collection.foreign_members.as_ref())?;
            let features = collection
                .features
                .into_iter()
                .map(feature_from_geojson)
                .collect::<GisResult<Vec<_>>>()?;
            (features, crs)
        }
        GeoJson::Feature(feature) => {
            let crs = legacy_crs(feature.foreign_members.as_ref())?;
            (vec![feature_from_geojson(feature)?], crs)
        }
        GeoJson::Geometry(geometry) => {
            let geometry = Geometry::<f64>::try_from(geometry.value)
                .map_err(|e| GisError::parse(FORMAT, e))?;
            (vec![Feature::from_geometry(geometry)], None)
        }
    };

    Ok(VectorDataset::new(features, Some(crs.unwrap_or_else(Crs::wgs84))))
}

fn feature_from_geojson(feature: geojson::Feature) -> GisResult<Feature> {
    let geometry = feature
        .geometry
        .map(|g| Geometry::<f64>::try_from(g.value))
        .transpose()
        .map_err(|e| GisError::parse(FORMAT, e))?;

    Ok(Feature::new(geometry, feature.properties.unwrap_or_default()))
}

/// Read `{"crs": {"type": "name", "properties": {"name": ...}}}`.
fn legacy_crs(foreign_members: Option<&JsonObject>) -> GisResult<Option<Crs>> {
    let name = foreign_members
        .and_then(|m| m.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(|name| name.as_str());

    match name {
        Some(name) => Crs::parse(name)
            .map(Some)
            .map_err(|e| GisError::parse(FORMAT, e)),
        None => Ok(None),
    }
}

/// Build an RFC 7946 FeatureCollection.
pub fn to_feature_collection(dataset: &VectorDataset) -> FeatureCollection {
    let features = dataset
        .features
        .iter()
        .map(|feature| geojson::Feature {
            bbox: None,
            geometry: feature
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: None,
            properties: Some(feature.properties.clone()),
            foreign_members: None,
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Serialize a dataset as a GeoJSON FeatureCollection string.
pub fn write_geojson(dataset: &VectorDataset) -> GisResult<String> {
    serde_json::to_string(&to_feature_collection(dataset)).map_err(|e| GisError::serialize(FORMAT, e))
}
