//! Dispatch of an upload to a concrete readable file.

use std::fs::File;
use std::path::{Path, PathBuf};

use gis_common::{GisError, GisResult, InputFormat};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::scratch::RequestScope;
use crate::upload::UploadedFile;

/// An upload after zip extraction: the file to read and how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub format: InputFormat,
    pub path: PathBuf,
    /// Extension of the uploaded file, used in error messages.
    pub extension: String,
}

/// Resolve an upload; zipped shapefiles are extracted into the scope.
pub fn resolve(upload: &UploadedFile, scope: &RequestScope) -> GisResult<ResolvedInput> {
    let extension = upload.extension();

    match upload.format() {
        InputFormat::ZippedShapefile => {
            let dest = scope.subdir("unzipped")?.join(&upload.field);
            std::fs::create_dir_all(&dest)?;
            extract_zip(&upload.path, &dest)?;
            let shp = find_shapefile(&dest)?;
            info!(field = %upload.field, shapefile = %shp.display(), "Resolved zipped shapefile");
            Ok(ResolvedInput {
                format: InputFormat::Shapefile,
                path: shp,
                extension,
            })
        }
        format => Ok(ResolvedInput {
            format,
            path: upload.path.clone(),
            extension,
        }),
    }
}

/// Extract every entry of `archive` below `dest`.
pub fn extract_zip(archive: &Path, dest: &Path) -> GisResult<()> {
    let mut archive = ZipArchive::new(File::open(archive)?).map_err(|e| GisError::parse("ZIP", e))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| GisError::parse("ZIP", e))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(GisError::InvalidInput(format!(
                "ZIP entry '{}' points outside the archive",
                entry.name()
            )));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
    }

    debug!(entries = archive.len(), dest = %dest.display(), "Extracted ZIP");
    Ok(())
}

/// Lexicographically first `*.shp` directly inside `dir`.
pub fn find_shapefile(dir: &Path) -> GisResult<PathBuf> {
    let mut candidates: Vec<(String, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            name.to_lowercase()
                .ends_with(".shp")
                .then(|| (name, entry.path()))
        })
        .collect();

    candidates.sort();
    candidates
        .into_iter()
        .next()
        .map(|(_, path)| path)
        .ok_or(GisError::NoShapefile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::ScratchSpace;
    use test_utils::{fixtures, zip_entries, zipped_shapefile};
    use uuid::Uuid;

    fn store(scope: &RequestScope, field: &str, filename: &str, bytes: &[u8]) -> UploadedFile {
        let upload = UploadedFile {
            field: field.into(),
            filename: filename.into(),
            path: scope.path().join(format!("{}{}", field, gis_common::format::extension_of(filename))),
        };
        std::fs::write(&upload.path, bytes).unwrap();
        upload
    }

    fn scope() -> (tempfile::TempDir, RequestScope) {
        let root = tempfile::tempdir().unwrap();
        let scope = ScratchSpace::new(root.path()).scope(Uuid::new_v4()).unwrap();
        (root, scope)
    }

    #[test]
    fn test_plain_file_resolves_in_place() {
        let (_root, scope) = scope();
        let upload = store(&scope, "file", "points.geojson", fixtures::POINTS_GEOJSON.as_bytes());
        let resolved = resolve(&upload, &scope).unwrap();
        assert_eq!(resolved.format, InputFormat::GeoJson);
        assert_eq!(resolved.path, upload.path);
    }

    #[test]
    fn test_zip_resolves_to_shapefile() {
        let (_root, scope) = scope();
        let bytes = zipped_shapefile(fixtures::POINTS_GEOJSON, "points", true);
        let upload = store(&scope, "file", "points.zip", &bytes);

        let resolved = resolve(&upload, &scope).unwrap();
        assert_eq!(resolved.format, InputFormat::Shapefile);
        assert_eq!(resolved.extension, ".zip");
        assert!(resolved.path.ends_with("unzipped/file/points.shp"));
    }

    #[test]
    fn test_zip_without_shapefile() {
        let (_root, scope) = scope();
        let bytes = zip_entries(&[("readme.txt", b"nothing here")]);
        let upload = store(&scope, "file", "empty.zip", &bytes);
        let err = resolve(&upload, &scope).unwrap_err();
        assert_eq!(err.client_message(), "No .shp file found in ZIP.");
    }

    #[test]
    fn test_nested_shapefile_is_not_found() {
        let (_root, scope) = scope();
        let bytes = zip_entries(&[("nested/roads.shp", b"")]);
        let upload = store(&scope, "file", "nested.zip", &bytes);
        assert!(matches!(resolve(&upload, &scope), Err(GisError::NoShapefile)));
    }

    #[test]
    fn test_first_shapefile_wins() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["roads.shp", "Alpha.SHP", "beta.shp", "alpha.dbf"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let chosen = find_shapefile(dir.path()).unwrap();
        assert_eq!(chosen.file_name().unwrap(), "Alpha.SHP");
    }

    #[test]
    fn test_escaping_entry_is_rejected() {
        let (_root, scope) = scope();
        let bytes = zip_entries(&[("../../evil.shp", b"")]);
        let upload = store(&scope, "file", "evil.zip", &bytes);
        let err = resolve(&upload, &scope).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn test_corrupt_zip_is_a_parse_error() {
        let (_root, scope) = scope();
        let upload = store(&scope, "file", "broken.zip", b"PK not really");
        assert_eq!(resolve(&upload, &scope).unwrap_err().code(), "parse_error");
    }
}
