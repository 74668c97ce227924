//! Fixed-distance buffering.

use geo::Buffer;
use geo_types::{Geometry, MultiPolygon};
use gis_common::{GisError, GisResult};
use rayon::prelude::*;
use tracing::debug;
use vector_io::{Feature, VectorDataset};

use crate::overlay::polygonal;

/// Buffer one geometry by `distance` CRS units.
///
/// A distance of zero keeps polygonal input as-is and turns points and lines
/// into an empty MultiPolygon. Negative distances erode polygons.
pub fn buffer_geometry(geometry: &Geometry<f64>, distance: f64) -> MultiPolygon<f64> {
    if distance == 0.0 {
        return polygonal(geometry).unwrap_or_else(|| MultiPolygon::new(vec![]));
    }
    geometry.buffer(distance)
}

/// Replace every feature's geometry with its buffer.
///
/// Features are processed in parallel. Attributes are kept; features without
/// geometry pass through.
pub fn buffer_dataset(dataset: VectorDataset, distance: f64) -> GisResult<VectorDataset> {
    if !distance.is_finite() {
        return Err(GisError::invalid_field(
            "distance",
            format!("{} is not a finite number", distance),
        ));
    }

    let crs = dataset.crs;
    let features: Vec<Feature> = dataset
        .features
        .into_par_iter()
        .map(|feature| Feature {
            geometry: feature
                .geometry
                .map(|g| Geometry::MultiPolygon(buffer_geometry(&g, distance))),
            properties: feature.properties,
        })
        .collect();

    debug!(distance, features = features.len(), "Buffered dataset");
    Ok(VectorDataset::new(features, crs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use geo_types::{line_string, point, polygon};
    use gis_common::Crs;
    use vector_io::Properties;

    fn square() -> Geometry<f64> {
        polygon![(x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.), (x: 0., y: 10.), (x: 0., y: 0.)]
            .into()
    }

    #[test]
    fn test_point_buffer_approximates_circle() {
        let buffered = buffer_geometry(&point!(x: 0., y: 0.).into(), 100.0);
        let area = buffered.unsigned_area();
        let circle = std::f64::consts::PI * 100.0 * 100.0;
        assert!((area - circle).abs() / circle < 0.02, "area {} vs {}", area, circle);
    }

    #[test]
    fn test_zero_distance() {
        let unchanged = buffer_geometry(&square(), 0.0);
        assert_eq!(unchanged.0.len(), 1);
        assert_eq!(unchanged.unsigned_area(), 100.0);

        let line = line_string![(x: 0., y: 0.), (x: 5., y: 5.)];
        assert!(buffer_geometry(&line.into(), 0.0).0.is_empty());
    }

    #[test]
    fn test_negative_distance_erodes() {
        let eroded = buffer_geometry(&square(), -2.0);
        assert!((eroded.unsigned_area() - 36.0).abs() < 1e-3);

        let gone = buffer_geometry(&square(), -6.0);
        assert!(gone.0.is_empty());
    }

    #[test]
    fn test_buffer_dataset_keeps_attributes() {
        let mut properties = Properties::new();
        properties.insert("id".into(), 1.into());
        let dataset = VectorDataset::new(
            vec![
                Feature::new(Some(point!(x: 0., y: 0.).into()), properties),
                Feature::new(None, Properties::new()),
            ],
            Some(Crs::web_mercator()),
        );

        let out = buffer_dataset(dataset, 5.0).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.crs, Some(Crs::web_mercator()));
        assert_eq!(out.features[0].properties["id"], 1);
        assert!(matches!(out.features[0].geometry, Some(Geometry::MultiPolygon(_))));
        assert!(out.features[1].geometry.is_none());
    }

    #[test]
    fn test_non_finite_distance_rejected() {
        let err = buffer_dataset(VectorDataset::default(), f64::NAN).unwrap_err();
        assert_eq!(err.code(), "invalid_field");
        assert!(buffer_dataset(VectorDataset::default(), f64::INFINITY).is_err());
    }
}
