//! Buffer handler.

use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart},
    response::Response,
};

use super::run_operation;
use crate::pipeline::{self, Operation};
use crate::state::AppState;

/// POST /buffer/ - Buffer every feature of `file` by `distance`
///
/// `distance` is measured in the linear unit of the metric CRS. With the
/// default EPSG:3857 that is Web Mercator meters, which overstate ground
/// distance by `1/cos(latitude)`. Negative values erode polygons.
pub async fn buffer_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    run_operation(state, Operation::Buffer, multipart, |ctx, scope, form| {
        let distance = form.distance()?;
        let format = form.output_format()?;
        pipeline::buffer(ctx, scope, form.file("file")?, distance, format)
    })
    .await
}
