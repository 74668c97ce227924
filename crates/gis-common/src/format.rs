//! Supported input and output formats.

use std::fmt;
use std::path::Path;

use crate::error::GisError;

/// Input format resolved from an upload's filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFormat {
    /// Zip archive holding a shapefile
    ZippedShapefile,
    /// Bare `.shp` with its sidecars alongside
    Shapefile,
    GeoJson,
    Kml,
    Csv,
    GeoTiff,
    /// Unrecognized extension (lowercased, with leading dot; empty if none)
    Other(String),
}

impl InputFormat {
    /// Resolve the format from a filename's extension (case-insensitive).
    pub fn from_filename(name: &str) -> Self {
        let extension = extension_of(name);
        match extension.as_str() {
            ".zip" => InputFormat::ZippedShapefile,
            ".shp" => InputFormat::Shapefile,
            ".geojson" | ".json" => InputFormat::GeoJson,
            ".kml" => InputFormat::Kml,
            ".csv" => InputFormat::Csv,
            ".tif" | ".tiff" => InputFormat::GeoTiff,
            _ => InputFormat::Other(extension),
        }
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, InputFormat::GeoTiff)
    }

    /// Human-readable name used in error messages.
    pub fn label(&self) -> &str {
        match self {
            InputFormat::ZippedShapefile | InputFormat::Shapefile => "Shapefile",
            InputFormat::GeoJson => "GeoJSON",
            InputFormat::Kml => "KML",
            InputFormat::Csv => "CSV",
            InputFormat::GeoTiff => "GeoTIFF",
            InputFormat::Other(_) => "vector",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Other(ext) => write!(f, "vector ({})", ext),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Lowercased extension including the leading dot, or an empty string.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Output format for vector results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    GeoJson,
    Shapefile,
    Kml,
    Csv,
}

impl OutputFormat {
    /// Parse the `output_format` form field. Absent or blank means GeoJSON.
    pub fn from_param(value: Option<&str>) -> Result<Self, GisError> {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(OutputFormat::default());
        };

        match value.to_lowercase().as_str() {
            "geojson" | "json" => Ok(OutputFormat::GeoJson),
            "shapefile" | "shp" | "zip" => Ok(OutputFormat::Shapefile),
            "kml" => Ok(OutputFormat::Kml),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(GisError::unsupported_format(value)),
        }
    }

    /// Get the Content-Type header value for this format.
    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "application/json",
            OutputFormat::Shapefile => "application/zip",
            OutputFormat::Kml => "application/vnd.google-earth.kml+xml",
            OutputFormat::Csv => "text/csv",
        }
    }

    /// File extension of the written output (before zipping).
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "geojson",
            OutputFormat::Shapefile => "shp",
            OutputFormat::Kml => "kml",
            OutputFormat::Csv => "csv",
        }
    }

    /// Filename offered to the client for a result named `stem`.
    pub fn download_name(&self, stem: &str) -> String {
        match self {
            OutputFormat::Shapefile => format!("{}_shapefile.zip", stem),
            other => format!("{}.{}", stem, other.extension()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "GeoJSON",
            OutputFormat::Shapefile => "Shapefile",
            OutputFormat::Kml => "KML",
            OutputFormat::Csv => "CSV",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_format_from_filename() {
        assert_eq!(InputFormat::from_filename("parcels.ZIP"), InputFormat::ZippedShapefile);
        assert_eq!(InputFormat::from_filename("roads.geojson"), InputFormat::GeoJson);
        assert_eq!(InputFormat::from_filename("roads.json"), InputFormat::GeoJson);
        assert_eq!(InputFormat::from_filename("doc.kml"), InputFormat::Kml);
        assert_eq!(InputFormat::from_filename("pts.csv"), InputFormat::Csv);
        assert_eq!(InputFormat::from_filename("dem.tif"), InputFormat::GeoTiff);
        assert_eq!(InputFormat::from_filename("dem.TIFF"), InputFormat::GeoTiff);
        assert_eq!(
            InputFormat::from_filename("data.xyz"),
            InputFormat::Other(".xyz".to_string())
        );
        assert_eq!(InputFormat::from_filename("noext"), InputFormat::Other(String::new()));
    }

    #[test]
    fn test_output_format_from_param() {
        assert_eq!(OutputFormat::from_param(None).unwrap(), OutputFormat::GeoJson);
        assert_eq!(OutputFormat::from_param(Some("")).unwrap(), OutputFormat::GeoJson);
        assert_eq!(
            OutputFormat::from_param(Some("Shapefile")).unwrap(),
            OutputFormat::Shapefile
        );
        assert_eq!(OutputFormat::from_param(Some("kml")).unwrap(), OutputFormat::Kml);
        assert_eq!(OutputFormat::from_param(Some("csv")).unwrap(), OutputFormat::Csv);

        let err = OutputFormat::from_param(Some("gpkg")).unwrap_err();
        assert_eq!(err.code(), "unsupported_format");
    }

    #[test]
    fn test_download_names() {
        assert_eq!(OutputFormat::GeoJson.download_name("converted"), "converted.geojson");
        assert_eq!(
            OutputFormat::Shapefile.download_name("buffered"),
            "buffered_shapefile.zip"
        );
        assert_eq!(OutputFormat::Kml.media_type(), "application/vnd.google-earth.kml+xml");
    }
}
