//! Engine failures → HTTP responses.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::{EngineError, ErrorKind};

// ---

/// JSON error body: `{ "code": 404, "name": "NotFoundError", "message": "..." }`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: u16,
    name: &'static str,
    message: String,
}

#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(EngineError::InvalidInput(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(EngineError::InvalidInput(rejection.body_text()))
    }
}

fn status_of(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let kind = self.0.kind();
        let status = status_of(kind);

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            // diagnostic distinguishes a missing entity from a masked mismatch
            warn!(diagnostic = ?self.0.diagnostic(), "Request rejected: {}", self.0);
        }

        let message = match kind {
            ErrorKind::Store => "Internal server error".to_string(),
            _ => self.0.to_string(),
        };
        let body = ErrorBody {
            code: status.as_u16(),
            name: kind.as_str(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
