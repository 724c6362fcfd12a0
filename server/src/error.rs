//! Unified error handling for the server.
//!
//! Every failure leaves the server as a CouchDB-style body,
//! `{"error": "<name>", "reason": "<text>"}`, with a matching status code.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use settee_engine::Error;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] Error),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Status, stable error name and reason for this error.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Engine(err) => describe(err),
            AppError::InvalidJson(err) => (StatusCode::BAD_REQUEST, "bad_request", err.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
        }
    }
}

/// Map an engine error onto its HTTP status, stable name and reason.
pub fn describe(err: &Error) -> (StatusCode, &'static str, String) {
    match err {
        Error::NotFound(reason) => (StatusCode::NOT_FOUND, "not_found", reason.clone()),
        Error::Conflict(reason) => (StatusCode::CONFLICT, "conflict", reason.clone()),
        Error::PreconditionFailed(reason) => {
            (StatusCode::PRECONDITION_FAILED, "file_exists", reason.clone())
        }
        Error::BadRequest(reason) => (StatusCode::BAD_REQUEST, "bad_request", reason.clone()),
        Error::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, "unauthorized", reason.clone()),
        Error::NotImplemented(reason) => {
            (StatusCode::NOT_IMPLEMENTED, "not_implemented", reason.clone())
        }
        Error::DriverNotFound(_) | Error::Internal(_) | Error::Cancelled => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_server_error",
            err.to_string(),
        ),
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub reason: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, reason) = self.parts();

        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!("Request failed: {:?}", self);
        } else {
            tracing::debug!(%status, error, %reason, "request rejected");
        }

        let mut response = (status, Json(ErrorBody { error, reason })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"settee\""),
            );
        }
        response
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
