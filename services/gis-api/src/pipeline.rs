//! Synchronous operation pipelines.
//!
//! Everything here blocks (parsing, PROJ calls, overlay, file writes) and is
//! run on the blocking pool by the handlers.

use std::fmt;

use geo_types::MultiPolygon;
use gis_common::{Crs, GisError, GisResult, InputFormat, MissingCrsPolicy, OutputFormat};
use raster::{crop_to_mask, read_geotiff, write_geotiff};
use tracing::{debug, info};
use vector_io::{geojson_io, VectorDataset};

use crate::resolver::{resolve, ResolvedInput};
use crate::response::{vector_download, Download};
use crate::scratch::RequestScope;
use crate::upload::UploadedFile;

const CONVERTED: &str = "converted";
const BUFFERED: &str = "buffered";
const CLIPPED: &str = "clipped";
const CLIPPED_RASTER: &str = "clipped.tif";

/// The four operations exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Convert,
    Preview,
    Buffer,
    Clip,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Convert => "convert",
            Operation::Preview => "preview",
            Operation::Buffer => "buffer",
            Operation::Clip => "clip",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CRS settings shared by every pipeline.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub missing_crs: MissingCrsPolicy,
    /// CRS of every vector result.
    pub output_crs: Crs,
    /// Projected CRS for distances and overlay.
    pub metric_crs: Crs,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self {
            missing_crs: MissingCrsPolicy::default(),
            output_crs: Crs::wgs84(),
            metric_crs: Crs::web_mercator(),
        }
    }
}

impl PipelineContext {
    /// Read a resolved vector input and apply the missing-CRS policy.
    fn load(&self, input: &ResolvedInput) -> GisResult<VectorDataset> {
        if input.format.is_raster() {
            return Err(GisError::unsupported_format(&input.extension));
        }
        let dataset = vector_io::read_vector(&input.path, &input.format)?;
        projection::ensure_crs(dataset, &self.missing_crs)
    }

    fn load_into(&self, input: &ResolvedInput, target: &Crs) -> GisResult<VectorDataset> {
        projection::reproject(self.load(input)?, target)
    }
}

/// Load, normalize to the output CRS, and write `format`.
pub fn convert(
    ctx: &PipelineContext,
    scope: &RequestScope,
    file: &UploadedFile,
    format: OutputFormat,
) -> GisResult<Download> {
    let input = resolve(file, scope)?;
    let dataset = ctx.load_into(&input, &ctx.output_crs)?;
    info!(features = dataset.len(), from = %input.format, to = format.label(), "Converting");
    vector_download(&dataset, format, &scope.out_dir()?, CONVERTED)
}

/// Return the dataset as a JSON string holding a GeoJSON FeatureCollection.
pub fn preview(ctx: &PipelineContext, scope: &RequestScope, file: &UploadedFile) -> GisResult<Download> {
    if matches!(file.format(), InputFormat::GeoTiff | InputFormat::Other(_)) {
        return Err(GisError::unsupported_format(file.extension()));
    }

    let input = resolve(file, scope)?;
    let dataset = ctx.load_into(&input, &ctx.output_crs)?;
    let collection = geojson_io::write_geojson(&dataset)?;
    debug!(features = dataset.len(), bytes = collection.len(), "Built preview");

    Ok(Download {
        bytes: serde_json::to_vec(&collection)?,
        media_type: "application/json",
        filename: None,
    })
}

/// Buffer every feature by `distance` metric-CRS units.
pub fn buffer(
    ctx: &PipelineContext,
    scope: &RequestScope,
    file: &UploadedFile,
    distance: f64,
    format: OutputFormat,
) -> GisResult<Download> {
    let input = resolve(file, scope)?;
    let dataset = ctx.load_into(&input, &ctx.metric_crs)?;
    info!(features = dataset.len(), distance, crs = %ctx.metric_crs, "Buffering");

    let buffered = geoprocessing::buffer_dataset(dataset, distance)?;
    let result = projection::reproject(buffered, &ctx.output_crs)?;
    vector_download(&result, format, &scope.out_dir()?, BUFFERED)
}

/// Clip `target` by the polygons of `mask`.
///
/// A GeoTIFF target is cropped in its own CRS and always returned as
/// GeoTIFF; `format` only applies to vector targets.
pub fn clip(
    ctx: &PipelineContext,
    scope: &RequestScope,
    target: &UploadedFile,
    mask: &UploadedFile,
    format: OutputFormat,
) -> GisResult<Download> {
    let target = resolve(target, scope)?;
    let mask = resolve(mask, scope)?;

    match target.format {
        InputFormat::GeoTiff => clip_raster(ctx, scope, &target, &mask),
        _ => clip_vector(ctx, scope, &target, &mask, format),
    }
}

fn clip_raster(
    ctx: &PipelineContext,
    scope: &RequestScope,
    target: &ResolvedInput,
    mask: &ResolvedInput,
) -> GisResult<Download> {
    let raster = read_geotiff(&target.path)?;
    let crs = raster
        .crs
        .clone()
        .ok_or_else(|| GisError::MissingCrs("raster has no EPSG-coded CRS".to_string()))?;

    let mask = ctx.load_into(mask, &crs)?;
    let polygons: MultiPolygon<f64> = mask
        .geometries()
        .flat_map(geoprocessing::polygons_of)
        .collect::<Vec<_>>()
        .into();
    info!(
        width = raster.width,
        height = raster.height,
        crs = %crs,
        mask_polygons = polygons.0.len(),
        "Clipping raster"
    );

    let clipped = crop_to_mask(&raster, &polygons)?;
    let path = scope.out_dir()?.join(CLIPPED_RASTER);
    write_geotiff(&clipped, &path)?;

    Ok(Download {
        bytes: std::fs::read(&path)?,
        media_type: "application/octet-stream",
        filename: Some(CLIPPED_RASTER.to_string()),
    })
}

fn clip_vector(
    ctx: &PipelineContext,
    scope: &RequestScope,
    target: &ResolvedInput,
    mask: &ResolvedInput,
    format: OutputFormat,
) -> GisResult<Download> {
    let target = ctx.load_into(target, &ctx.metric_crs)?;
    let mask = ctx.load_into(mask, &ctx.metric_crs)?;
    info!(targets = target.len(), masks = mask.len(), "Clipping vector");

    let result = geoprocessing::intersect(&target, &mask)?;
    if result.is_empty() {
        return Err(GisError::EmptyResult(
            "target and mask do not overlap".to_string(),
        ));
    }

    let result = projection::reproject(result, &ctx.output_crs)?;
    vector_download(&result, format, &scope.out_dir()?, CLIPPED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::ScratchSpace;
    use test_utils::{fixtures, zip_entries, GeoTiffSpec};
    use uuid::Uuid;

    struct Harness {
        _root: tempfile::TempDir,
        scope: RequestScope,
    }

    impl Harness {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let scope = ScratchSpace::new(root.path()).scope(Uuid::new_v4()).unwrap();
            Self { _root: root, scope }
        }

        fn upload(&self, field: &str, filename: &str, bytes: &[u8]) -> UploadedFile {
            let path = self
                .scope
                .path()
                .join(format!("{}{}", field, gis_common::format::extension_of(filename)));
            std::fs::write(&path, bytes).unwrap();
            UploadedFile {
                field: field.into(),
                filename: filename.into(),
                path,
            }
        }
    }

    fn collection(download: &Download) -> VectorDataset {
        geojson_io::parse_geojson(std::str::from_utf8(&download.bytes).unwrap()).unwrap()
    }

    #[test]
    fn test_convert_csv_to_geojson() {
        let h = Harness::new();
        let file = h.upload("file", "points.csv", fixtures::POINTS_CSV.as_bytes());
        let download = convert(&PipelineContext::default(), &h.scope, &file, OutputFormat::GeoJson).unwrap();
        let dataset = collection(&download);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.features[0].properties["name"], "depot");
    }

    #[test]
    fn test_convert_rejects_unlabeled_input_under_reject_policy() {
        let h = Harness::new();
        let file = h.upload("file", "points.csv", fixtures::POINTS_CSV.as_bytes());
        let ctx = PipelineContext {
            missing_crs: MissingCrsPolicy::Reject,
            ..PipelineContext::default()
        };
        let err = convert(&ctx, &h.scope, &file, OutputFormat::GeoJson).unwrap_err();
        assert_eq!(err.code(), "missing_crs");
    }

    #[test]
    fn test_convert_rejects_raster() {
        let h = Harness::new();
        let file = h.upload("file", "scene.tif", &GeoTiffSpec::scene_wgs84().to_bytes());
        let err = convert(&PipelineContext::default(), &h.scope, &file, OutputFormat::GeoJson).unwrap_err();
        assert_eq!(err.client_message(), "Unsupported format: .tif");
    }

    #[test]
    fn test_preview_is_json_string() {
        let h = Harness::new();
        let file = h.upload("file", "points.kml", fixtures::POINTS_KML.as_bytes());
        let download = preview(&PipelineContext::default(), &h.scope, &file).unwrap();
        let inner: String = serde_json::from_slice(&download.bytes).unwrap();
        let dataset = geojson_io::parse_geojson(&inner).unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(download.filename.is_none());
    }

    #[test]
    fn test_preview_rejects_unknown_extension_and_empty_zip() {
        let h = Harness::new();
        let file = h.upload("file", "data.xyz", b"{}");
        let err = preview(&PipelineContext::default(), &h.scope, &file).unwrap_err();
        assert_eq!(err.client_message(), "Unsupported format: .xyz");

        let file = h.upload("file", "empty.zip", &zip_entries(&[("a.txt", b"x")]));
        let err = preview(&PipelineContext::default(), &h.scope, &file).unwrap_err();
        assert_eq!(err.client_message(), "No .shp file found in ZIP.");
    }

    #[test]
    fn test_buffer_points_become_polygons() {
        let h = Harness::new();
        let file = h.upload("file", "points.geojson", fixtures::POINTS_GEOJSON.as_bytes());
        let download = buffer(&PipelineContext::default(), &h.scope, &file, 100.0, OutputFormat::GeoJson).unwrap();
        let dataset = collection(&download);
        assert_eq!(dataset.len(), 2);
        for feature in &dataset.features {
            assert!(matches!(
                feature.geometry,
                Some(geo_types::Geometry::MultiPolygon(ref mp)) if !mp.0.is_empty()
            ));
        }
        assert_eq!(dataset.features[1].properties["name"], "harbor");
    }

    #[test]
    fn test_clip_vector_without_overlap() {
        let h = Harness::new();
        let target = h.upload("target_file", "points.geojson", fixtures::POINTS_GEOJSON.as_bytes());
        let mask = h.upload("mask_file", "far.geojson", fixtures::FAR_AWAY_GEOJSON.as_bytes());
        let err = clip(&PipelineContext::default(), &h.scope, &target, &mask, OutputFormat::GeoJson).unwrap_err();
        assert_eq!(err.code(), "empty_result");
    }

    #[test]
    fn test_clip_vector_keeps_points_inside_mask() {
        let h = Harness::new();
        let target = h.upload("target_file", "points.geojson", fixtures::POINTS_GEOJSON.as_bytes());
        let mask = h.upload("mask_file", "park.geojson", fixtures::PARK_GEOJSON.as_bytes());
        let download = clip(&PipelineContext::default(), &h.scope, &target, &mask, OutputFormat::Csv).unwrap();
        assert_eq!(download.filename.as_deref(), Some("clipped.csv"));
        let text = String::from_utf8(download.bytes).unwrap();
        assert!(text.contains("depot"));
        assert!(!text.contains("harbor"));
    }

    #[test]
    fn test_clip_raster_writes_geotiff() {
        let h = Harness::new();
        let spec = GeoTiffSpec::scene_wgs84();
        let target = h.upload("target_file", "scene.tif", &spec.to_bytes());
        let mask = h.upload("mask_file", "park.geojson", fixtures::PARK_GEOJSON.as_bytes());

        let download = clip(&PipelineContext::default(), &h.scope, &target, &mask, OutputFormat::Kml).unwrap();
        assert_eq!(download.media_type, "application/octet-stream");
        assert_eq!(download.filename.as_deref(), Some("clipped.tif"));

        let clipped = raster::geotiff::decode_geotiff(std::io::Cursor::new(download.bytes)).unwrap();
        assert!(clipped.width < spec.width && clipped.height < spec.height);
        assert_eq!(clipped.crs, Some(Crs::wgs84()));
    }
}
