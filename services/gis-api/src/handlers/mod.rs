//! HTTP handlers for the QuickGIS API.

pub mod buffer;
pub mod clip;
pub mod convert;
pub mod health;
pub mod preview;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Multipart,
    response::{IntoResponse, Response},
};
use gis_common::{GisError, GisResult};
use tracing::{info, info_span, Instrument, Span};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics;
use crate::pipeline::{Operation, PipelineContext};
use crate::response::Download;
use crate::scratch::RequestScope;
use crate::state::AppState;
use crate::upload::UploadForm;

/// Run one operation request end to end.
///
/// Opens the request scope, stores the uploads, and hands the form to
/// `work` on the blocking pool. The scope moves into the blocking task and
/// is dropped there, so it is removed even if `work` panics.
pub(crate) async fn run_operation<F>(
    state: Arc<AppState>,
    operation: Operation,
    mut multipart: Multipart,
    work: F,
) -> Response
where
    F: FnOnce(&PipelineContext, &RequestScope, &UploadForm) -> GisResult<Download> + Send + 'static,
{
    let request_id = Uuid::new_v4();
    let span = info_span!("request", request_id = %request_id, operation = %operation);

    async move {
        let started = Instant::now();
        metrics::record_request(operation);

        let result = execute(&state, request_id, &mut multipart, work).await;
        metrics::record_duration(operation, started.elapsed());

        match result {
            Ok(download) => {
                info!(
                    bytes = download.bytes.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Request completed"
                );
                download.into_response()
            }
            Err(error) => {
                metrics::record_error(operation, error.code());
                ApiError::new(error, request_id).into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn execute<F>(
    state: &AppState,
    request_id: Uuid,
    multipart: &mut Multipart,
    work: F,
) -> GisResult<Download>
where
    F: FnOnce(&PipelineContext, &RequestScope, &UploadForm) -> GisResult<Download> + Send + 'static,
{
    let scope = state.scratch.scope(request_id)?;
    let form = UploadForm::receive(multipart, scope.path()).await?;
    let ctx = state.pipeline_context();
    let span = Span::current();

    tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let result = work(&ctx, &scope, &form);
        drop(scope);
        result
    })
    .await
    .map_err(|e| GisError::Internal(format!("operation task failed: {}", e)))?
}
