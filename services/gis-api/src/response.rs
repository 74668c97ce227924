//! Download responses built from files in the scope's output directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use gis_common::{GisError, GisResult, OutputFormat};
use vector_io::VectorDataset;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// A fully buffered response body.
///
/// Bytes are read into memory before the scope is dropped, so the scratch
/// directory can be removed as soon as the pipeline returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    /// Sent as an attachment filename when present.
    pub filename: Option<String>,
}

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, self.bytes).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.media_type));

        if let Some(filename) = self.filename {
            let disposition = format!("attachment; filename=\"{}\"", filename);
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                headers.insert(header::CONTENT_DISPOSITION, value);
            }
        }

        response
    }
}

/// Write `dataset` under `out_dir` and package it for download.
pub fn vector_download(
    dataset: &VectorDataset,
    format: OutputFormat,
    out_dir: &Path,
    stem: &str,
) -> GisResult<Download> {
    let written = vector_io::write_vector(dataset, format, out_dir, stem)?;

    let bytes = match format {
        OutputFormat::Shapefile => zip_files(&written)?,
        _ => {
            let path = written
                .first()
                .ok_or_else(|| GisError::Internal(format!("{} writer produced no file", format.label())))?;
            std::fs::read(path)?
        }
    };

    Ok(Download {
        bytes,
        media_type: format.media_type(),
        filename: Some(format.download_name(stem)),
    })
}

/// Zip `paths` flat, ordered by file name.
pub fn zip_files(paths: &[PathBuf]) -> GisResult<Vec<u8>> {
    let mut named: Vec<(String, &PathBuf)> = paths
        .iter()
        .filter_map(|p| Some((p.file_name()?.to_str()?.to_string(), p)))
        .collect();
    named.sort();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for (name, path) in named {
        writer
            .start_file(name, options)
            .map_err(|e| GisError::serialize("ZIP", e))?;
        writer.write_all(&std::fs::read(path)?)?;
    }

    let cursor = writer.finish().map_err(|e| GisError::serialize("ZIP", e))?;
    Ok(cursor.into_inner())
}
