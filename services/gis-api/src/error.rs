//! HTTP mapping of [`GisError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gis_common::GisError;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

/// `{"error": ..., "code": ...}` body returned for every failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// A request failure, tagged with the request it belongs to.
#[derive(Debug)]
pub struct ApiError {
    pub error: GisError,
    pub request_id: Option<Uuid>,
}

impl ApiError {
    pub fn new(error: GisError, request_id: Uuid) -> Self {
        Self {
            error,
            request_id: Some(request_id),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.error.client_message(),
            code: self.error.code(),
        }
    }
}

impl From<GisError> for ApiError {
    fn from(error: GisError) -> Self {
        Self {
            error,
            request_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id.map(|id| id.to_string()).unwrap_or_default();

        // Raw detail stays in the log; the client sees the sanitized message.
        if self.error.is_server_error() {
            error!(
                request_id = %request_id,
                code = self.error.code(),
                detail = %self.error,
                "Request failed"
            );
        } else {
            warn!(
                request_id = %request_id,
                code = self.error.code(),
                message = %self.error,
                "Request rejected"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}
