//! Preview handler.

use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart},
    response::Response,
};

use super::run_operation;
use crate::pipeline::{self, Operation};
use crate::state::AppState;

/// POST /preview/ - GeoJSON FeatureCollection of `file`, as a JSON string
pub async fn preview_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    run_operation(state, Operation::Preview, multipart, |ctx, scope, form| {
        pipeline::preview(ctx, scope, form.file("file")?)
    })
    .await
}
