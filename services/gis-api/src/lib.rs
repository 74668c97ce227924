//! QuickGIS API Service Library
//!
//! HTTP front end for converting, previewing, buffering and clipping
//! uploaded geospatial files. Every request runs inside its own scratch
//! directory that is removed when the request ends.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod resolver;
pub mod response;
pub mod scratch;
pub mod state;
pub mod upload;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Extension, Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::state::AppState;

/// CORS policy: permissive by default, credentialed for explicit origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::list([Method::GET, Method::POST, Method::OPTIONS]))
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        // Operations
        .route("/convert", post(handlers::convert::convert_handler))
        .route("/convert/", post(handlers::convert::convert_handler))
        .route("/preview", post(handlers::preview::preview_handler))
        .route("/preview/", post(handlers::preview::preview_handler))
        .route("/buffer", post(handlers::buffer::buffer_handler))
        .route("/buffer/", post(handlers::buffer::buffer_handler))
        .route("/clip", post(handlers::clip::clip_handler))
        .route("/clip/", post(handlers::clip::clip_handler))
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
