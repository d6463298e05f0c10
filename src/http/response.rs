//! Turning render outcomes and errors into HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::PipelineError;
use crate::render::RenderOutcome;

/// Non-standard status logged for requests the client gave up on.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

impl IntoResponse for RenderOutcome {
    fn into_response(self) -> Response {
        match self {
            RenderOutcome::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            RenderOutcome::Document(response) | RenderOutcome::Stream(response) => response,
            RenderOutcome::Abandoned => {
                let status = StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::BAD_REQUEST);
                status.into_response()
            }
        }
    }
}

/// JSON error body safe for untrusted clients.
pub fn error_response(err: &PipelineError, trace_id: Option<&str>) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_client_value(trace_id))).into_response()
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        error_response(&self, None)
    }
}
