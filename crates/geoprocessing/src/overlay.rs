//! Intersection overlay of a target dataset against a polygon mask.

use geo::{BooleanOps, BoundingRect, Intersects};
use geo_types::{
    Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon, Rect,
};
use gis_common::{GisError, GisResult};
use rayon::prelude::*;
use tracing::debug;
use vector_io::{Feature, Properties, VectorDataset};

/// All polygons of a geometry, flattening collections.
pub fn polygons_of(geometry: &Geometry<f64>) -> Vec<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => gc.iter().flat_map(polygons_of).collect(),
        _ => Vec::new(),
    }
}

/// The polygonal part of a geometry, or `None` if it has none.
pub fn polygonal(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let polygons = polygons_of(geometry);
    (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
}

fn lines_of(geometry: &Geometry<f64>) -> Vec<LineString<f64>> {
    match geometry {
        Geometry::Line(l) => vec![LineString::from(*l)],
        Geometry::LineString(ls) => vec![ls.clone()],
        Geometry::MultiLineString(mls) => mls.0.clone(),
        Geometry::GeometryCollection(gc) => gc.iter().flat_map(lines_of).collect(),
        _ => Vec::new(),
    }
}

fn points_of(geometry: &Geometry<f64>) -> Vec<Point<f64>> {
    match geometry {
        Geometry::Point(p) => vec![*p],
        Geometry::MultiPoint(mp) => mp.0.clone(),
        Geometry::GeometryCollection(gc) => gc.iter().flat_map(points_of).collect(),
        _ => Vec::new(),
    }
}

/// Merge two attribute maps. Names present on both sides get `_1` (left)
/// and `_2` (right) suffixes.
pub fn merge_properties(left: &Properties, right: &Properties) -> Properties {
    let mut merged = Properties::new();
    for (key, value) in left {
        if right.contains_key(key) {
            merged.insert(format!("{}_1", key), value.clone());
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in right {
        if left.contains_key(key) {
            merged.insert(format!("{}_2", key), value.clone());
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

struct MaskPart<'a> {
    polygons: MultiPolygon<f64>,
    bounds: Rect<f64>,
    properties: &'a Properties,
}

/// Intersect one geometry with one mask; `None` when nothing remains.
fn intersect_geometry(target: &Geometry<f64>, mask: &MultiPolygon<f64>) -> Option<Geometry<f64>> {
    let mut parts: Vec<Geometry<f64>> = Vec::new();

    let polygons = polygons_of(target);
    if !polygons.is_empty() {
        let clipped = MultiPolygon::new(polygons).intersection(mask);
        if !clipped.0.is_empty() {
            parts.push(Geometry::MultiPolygon(clipped));
        }
    }

    let lines = lines_of(target);
    if !lines.is_empty() {
        let clipped = mask.clip(&MultiLineString::new(lines), false);
        let clipped: Vec<_> = clipped.0.into_iter().filter(|l| l.0.len() > 1).collect();
        if !clipped.is_empty() {
            parts.push(Geometry::MultiLineString(MultiLineString::new(clipped)));
        }
    }

    let points: Vec<Point<f64>> = points_of(target)
        .into_iter()
        .filter(|p| mask.intersects(p))
        .collect();
    match points.len() {
        0 => {}
        1 => parts.push(Geometry::Point(points[0])),
        _ => parts.push(Geometry::MultiPoint(MultiPoint::new(points))),
    }

    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(Geometry::GeometryCollection(GeometryCollection::new_from(parts))),
    }
}

/// Pairwise intersection of every target feature with every polygonal mask
/// feature. Non-polygonal mask features are ignored and empty pairs dropped.
///
/// Both datasets must share a CRS; the result carries it.
pub fn intersect(target: &VectorDataset, mask: &VectorDataset) -> GisResult<VectorDataset> {
    if target.crs != mask.crs {
        return Err(GisError::Crs(format!(
            "overlay inputs differ in CRS ({:?} vs {:?})",
            target.crs, mask.crs
        )));
    }

    let mask_parts: Vec<MaskPart<'_>> = mask
        .features
        .iter()
        .filter_map(|feature| {
            let polygons = polygonal(feature.geometry.as_ref()?)?;
            let bounds = polygons.bounding_rect()?;
            Some(MaskPart {
                polygons,
                bounds,
                properties: &feature.properties,
            })
        })
        .collect();

    if mask_parts.is_empty() {
        return Err(GisError::InvalidInput(
            "mask contains no polygon geometries".to_string(),
        ));
    }

    let features: Vec<Feature> = target
        .features
        .par_iter()
        .flat_map_iter(|feature| {
            let geometry = feature.geometry.as_ref();
            let target_bounds = geometry.and_then(|g| g.bounding_rect());
            mask_parts.iter().filter_map(move |part| {
                let geometry = geometry?;
                if !target_bounds?.intersects(&part.bounds) {
                    return None;
                }
                let clipped = intersect_geometry(geometry, &part.polygons)?;
                Some(Feature::new(
                    Some(clipped),
                    merge_properties(&feature.properties, part.properties),
                ))
            })
        })
        .collect();

    debug!(
        targets = target.len(),
        masks = mask_parts.len(),
        results = features.len(),
        "Computed intersection overlay"
    );

    Ok(VectorDataset::new(features, target.crs.clone()))
}
