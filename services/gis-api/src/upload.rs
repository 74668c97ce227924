//! Multipart intake into the request scope.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use gis_common::{format::extension_of, GisError, GisResult, InputFormat, OutputFormat};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// An uploaded file stored verbatim inside the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field the file arrived in.
    pub field: String,
    /// Declared filename with any directory components removed.
    pub filename: String,
    pub path: PathBuf,
}

impl UploadedFile {
    pub fn format(&self) -> InputFormat {
        InputFormat::from_filename(&self.filename)
    }

    /// Lowercased extension of the declared filename, with the dot.
    pub fn extension(&self) -> String {
        extension_of(&self.filename)
    }
}

/// Files and text fields of one multipart request.
#[derive(Debug, Default)]
pub struct UploadForm {
    files: Vec<UploadedFile>,
    fields: HashMap<String, String>,
}

/// Last path component of a client-supplied filename.
fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
}

/// Field names become file names, so only a safe alphabet survives.
fn safe_role(field: &str) -> String {
    let role: String = field
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if role.is_empty() {
        "upload".to_string()
    } else {
        role
    }
}

fn framing_error(err: impl std::fmt::Display) -> GisError {
    GisError::InvalidInput(format!("Malformed multipart request: {}", err))
}

impl UploadForm {
    /// Drain `multipart`, writing file parts into `dir` as `<role><ext>`.
    pub async fn receive(multipart: &mut Multipart, dir: &Path) -> GisResult<Self> {
        let mut form = UploadForm::default();

        while let Some(mut field) = multipart.next_field().await.map_err(framing_error)? {
            let name = field.name().unwrap_or_default().to_string();

            let Some(declared) = field.file_name().map(str::to_string) else {
                let value = field.text().await.map_err(framing_error)?;
                form.fields.insert(name, value);
                continue;
            };

            let filename = base_name(&declared).to_string();
            let path = dir.join(format!("{}{}", safe_role(&name), extension_of(&filename)));

            let mut file = tokio::fs::File::create(&path).await?;
            let mut written = 0usize;
            while let Some(chunk) = field.chunk().await.map_err(framing_error)? {
                written += chunk.len();
                file.write_all(&chunk).await?;
            }
            file.flush().await?;

            debug!(field = %name, filename = %filename, bytes = written, "Stored upload");

            form.files.retain(|f| f.field != name);
            form.files.push(UploadedFile {
                field: name,
                filename,
                path,
            });
        }

        Ok(form)
    }

    /// The file uploaded in `field`, or `MissingField`.
    pub fn file(&self, field: &str) -> GisResult<&UploadedFile> {
        self.files
            .iter()
            .find(|f| f.field == field)
            .ok_or_else(|| GisError::MissingField(field.to_string()))
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// `output_format`, defaulting to GeoJSON.
    pub fn output_format(&self) -> GisResult<OutputFormat> {
        OutputFormat::from_param(self.text("output_format"))
    }

    /// The required `distance` field as a float.
    pub fn distance(&self) -> GisResult<f64> {
        let raw = self
            .text("distance")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GisError::MissingField("distance".to_string()))?;

        raw.parse::<f64>()
            .map_err(|_| GisError::invalid_field("distance", format!("'{}' is not a number", raw)))
    }

    #[cfg(test)]
    pub(crate) fn from_parts(files: Vec<UploadedFile>, fields: &[(&str, &str)]) -> Self {
        Self {
            files,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}
