//! Error types for quickgis operations.

use thiserror::Error;

/// Result type alias using GisError.
pub type GisResult<T> = Result<T, GisError>;

/// Primary error type for every stage of a GIS request.
#[derive(Debug, Error)]
pub enum GisError {
    // === Input Errors ===
    #[error("No .shp file found in ZIP.")]
    NoShapefile,

    #[error("Unsupported format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing CRS: {0}")]
    MissingCrs(String),

    // === Result Errors ===
    #[error("Empty result: {0}")]
    EmptyResult(String),

    // === Processing Errors ===
    #[error("Failed to parse {format} input: {message}")]
    Parse { format: String, message: String },

    #[error("CRS transformation failed: {0}")]
    Crs(String),

    #[error("Geometry operation failed: {0}")]
    Geometry(String),

    #[error("Raster processing failed: {0}")]
    Raster(String),

    #[error("Failed to write {format} output: {message}")]
    Serialize { format: String, message: String },

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GisError {
    pub fn parse(format: impl Into<String>, message: impl ToString) -> Self {
        GisError::Parse {
            format: format.into(),
            message: message.to_string(),
        }
    }

    pub fn serialize(format: impl Into<String>, message: impl ToString) -> Self {
        GisError::Serialize {
            format: format.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        GisError::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_format(extension: impl Into<String>) -> Self {
        GisError::UnsupportedFormat {
            extension: extension.into(),
        }
    }

    /// Stable machine-readable code for this error category.
    pub fn code(&self) -> &'static str {
        match self {
            GisError::NoShapefile => "no_shapefile",
            GisError::UnsupportedFormat { .. } => "unsupported_format",
            GisError::MissingField(_) => "missing_field",
            GisError::InvalidField { .. } => "invalid_field",
            GisError::InvalidInput(_) => "invalid_input",
            GisError::MissingCrs(_) => "missing_crs",
            GisError::EmptyResult(_) => "empty_result",
            GisError::Parse { .. } => "parse_error",
            GisError::Crs(_) => "crs_error",
            GisError::Geometry(_) => "geometry_error",
            GisError::Raster(_) => "raster_error",
            GisError::Serialize { .. } => "serialize_error",
            GisError::Io(_) => "io_error",
            GisError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            GisError::NoShapefile
            | GisError::UnsupportedFormat { .. }
            | GisError::MissingField(_)
            | GisError::InvalidField { .. }
            | GisError::InvalidInput(_)
            | GisError::MissingCrs(_)
            | GisError::EmptyResult(_) => 400,

            _ => 500,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.http_status_code() >= 500
    }

    /// Message that is safe to show to a client.
    ///
    /// 4xx messages describe the caller's mistake and are returned as-is;
    /// 5xx messages never carry library or filesystem detail.
    pub fn client_message(&self) -> String {
        match self {
            GisError::Parse { format, .. } => format!("Failed to parse {} input", format),
            GisError::Crs(_) => "Coordinate transformation failed".to_string(),
            GisError::Geometry(_) => "Geometry operation failed".to_string(),
            GisError::Raster(_) => "Raster processing failed".to_string(),
            GisError::Serialize { format, .. } => format!("Failed to write {} output", format),
            GisError::Io(_) => "I/O failure".to_string(),
            GisError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for GisError {
    fn from(err: serde_json::Error) -> Self {
        GisError::Internal(format!("JSON error: {}", err))
    }
}
