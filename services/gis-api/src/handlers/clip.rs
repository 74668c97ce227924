//! Clip handler.

use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart},
    response::Response,
};

use super::run_operation;
use crate::pipeline::{self, Operation};
use crate::state::AppState;

/// POST /clip/ - Clip `target_file` by the polygons in `mask_file`
///
/// GeoTIFF targets come back as `clipped.tif` whatever `output_format` says.
pub async fn clip_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    run_operation(state, Operation::Clip, multipart, |ctx, scope, form| {
        let format = form.output_format()?;
        pipeline::clip(
            ctx,
            scope,
            form.file("target_file")?,
            form.file("mask_file")?,
            format,
        )
    })
    .await
}
