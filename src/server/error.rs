//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>` and use `?` on
//! [`skipsplice_core::Error`] directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use skipsplice_core::Error;

/// Wrapper so we can implement `IntoResponse` for the core error type.
pub struct AppError(Error);

impl AppError {
    pub fn inner(&self) -> &Error {
        &self.0
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

fn code(err: &Error) -> &'static str {
    match err {
        Error::NotFound { .. } => "not_found",
        Error::Unauthorized(_) => "unauthorized",
        Error::Validation(_) => "validation_error",
        Error::Conflict(_) => "conflict",
        Error::Database { .. } => "database_error",
        Error::Io { .. } => "io_error",
        Error::Tool { .. } => "tool_error",
        Error::Probe(_) => "probe_error",
        Error::Upstream { .. } => "upstream_error",
        Error::Internal(_) => "internal_error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Server error in API handler");
        }

        let body = json!({
            "error": self.0.to_string(),
            "code": code(&self.0),
        });

        (status, axum::Json(body)).into_response()
    }
}
