//! Convert handler.

use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart},
    response::Response,
};

use super::run_operation;
use crate::pipeline::{self, Operation};
use crate::state::AppState;

/// POST /convert/ - Convert `file` to `output_format` (default GeoJSON)
pub async fn convert_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    run_operation(state, Operation::Convert, multipart, |ctx, scope, form| {
        let format = form.output_format()?;
        pipeline::convert(ctx, scope, form.file("file")?, format)
    })
    .await
}
