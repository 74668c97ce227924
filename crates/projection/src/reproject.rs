//! PROJ-backed reprojection of geometries and datasets.

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use gis_common::{Crs, GisError, GisResult};
use proj::Proj;
use tracing::debug;
use vector_io::VectorDataset;

/// A compiled transformation between two CRSs.
///
/// Axis order is always x = easting/longitude, y = northing/latitude,
/// whatever the authority definition says.
pub struct Reprojector {
    proj: Proj,
    source: Crs,
    target: Crs,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl Reprojector {
    pub fn new(source: &Crs, target: &Crs) -> GisResult<Self> {
        let proj = Proj::new_known_crs(source.definition(), target.definition(), None)
            .map_err(|e| {
                GisError::Crs(format!(
                    "cannot build transformation {} -> {}: {}",
                    source, target, e
                ))
            })?;

        Ok(Self {
            proj,
            source: source.clone(),
            target: target.clone(),
        })
    }

    /// Transform a single coordinate.
    pub fn coord(&self, coord: Coord<f64>) -> GisResult<Coord<f64>> {
        let (x, y) = self
            .proj
            .convert((coord.x, coord.y))
            .map_err(|e| GisError::Crs(format!("({}, {}): {}", coord.x, coord.y, e)))?;

        if !x.is_finite() || !y.is_finite() {
            return Err(GisError::Crs(format!(
                "({}, {}) is outside the domain of {}",
                coord.x, coord.y, self.target
            )));
        }
        Ok(Coord { x, y })
    }

    pub fn geometry(&self, geometry: &Geometry<f64>) -> GisResult<Geometry<f64>> {
        geometry.try_map_coords(|c| self.coord(c))
    }
}

/// Reproject every feature of `dataset` to `target`.
///
/// A dataset without a CRS is a `MissingCrs` error; run
/// [`crate::ensure_crs`] first.
pub fn reproject(mut dataset: VectorDataset, target: &Crs) -> GisResult<VectorDataset> {
    let source = dataset.crs.clone().ok_or_else(|| {
        GisError::MissingCrs("dataset has no CRS to reproject from".to_string())
    })?;

    if &source == target {
        return Ok(dataset);
    }

    let reprojector = Reprojector::new(&source, target)?;
    for feature in &mut dataset.features {
        if let Some(geometry) = feature.geometry.as_ref() {
            feature.geometry = Some(reprojector.geometry(geometry)?);
        }
    }

    debug!(
        from = %source,
        to = %target,
        features = dataset.len(),
        "Reprojected dataset"
    );

    dataset.crs = Some(target.clone());
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, polygon};
    use vector_io::Feature;

    const EARTH_RADIUS: f64 = 6378137.0;

    #[test]
    fn test_wgs84_to_web_mercator() {
        let reprojector = Reprojector::new(&Crs::wgs84(), &Crs::web_mercator()).unwrap();
        let c = reprojector.coord(Coord { x: 180.0, y: 0.0 }).unwrap();

        let expected = std::f64::consts::PI * EARTH_RADIUS;
        assert!((c.x - expected).abs() < 1e-3, "x should be ~{}, got {}", expected, c.x);
        assert!(c.y.abs() < 1e-6, "y should be ~0, got {}", c.y);
    }

    #[test]
    fn test_axis_order_is_lon_lat() {
        let reprojector = Reprojector::new(&Crs::wgs84(), &Crs::web_mercator()).unwrap();
        let c = reprojector.coord(Coord { x: 10.0, y: 60.0 }).unwrap();

        // 10 degrees east is ~1113 km, 60 degrees north is ~8399 km
        assert!((c.x - 1_113_194.9).abs() < 1.0, "x = {}", c.x);
        assert!((c.y - 8_399_737.9).abs() < 1.0, "y = {}", c.y);
    }

    #[test]
    fn test_roundtrip_polygon() {
        let original: Geometry<f64> =
            polygon![(x: 10., y: 59.), (x: 11., y: 59.), (x: 11., y: 60.), (x: 10., y: 59.)].into();

        let forward = Reprojector::new(&Crs::wgs84(), &Crs::web_mercator()).unwrap();
        let inverse = Reprojector::new(&Crs::web_mercator(), &Crs::wgs84()).unwrap();
        let back = inverse.geometry(&forward.geometry(&original).unwrap()).unwrap();

        let Geometry::Polygon(back) = back else {
            panic!("expected polygon");
        };
        let Geometry::Polygon(original) = original else {
            unreachable!()
        };
        for (a, b) in back.exterior().coords().zip(original.exterior().coords()) {
            assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_crs_is_noop() {
        let dataset = VectorDataset::new(
            vec![Feature::from_geometry(point!(x: 1.0, y: 2.0).into())],
            Some(Crs::wgs84()),
        );
        let out = reproject(dataset.clone(), &Crs::wgs84()).unwrap();
        assert_eq!(out, dataset);
    }

    #[test]
    fn test_reproject_updates_crs_label() {
        let dataset = VectorDataset::new(
            vec![
                Feature::from_geometry(point!(x: 0.0, y: 0.0).into()),
                Feature::new(None, Default::default()),
            ],
            Some(Crs::wgs84()),
        );
        let out = reproject(dataset, &Crs::web_mercator()).unwrap();
        assert_eq!(out.crs, Some(Crs::web_mercator()));
        assert!(out.features[1].geometry.is_none());
    }

    #[test]
    fn test_reproject_without_crs_fails() {
        let dataset = VectorDataset::new(vec![], None);
        let err = reproject(dataset, &Crs::wgs84()).unwrap_err();
        assert_eq!(err.code(), "missing_crs");
    }

    #[test]
    fn test_unknown_crs_fails() {
        let err = Reprojector::new(&Crs::from_epsg(999_999), &Crs::wgs84()).unwrap_err();
        assert_eq!(err.code(), "crs_error");
    }
}
