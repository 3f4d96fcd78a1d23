//! Web-facing error type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::export::ExportError;
use crate::gate::GateError;
use crate::store::StoreError;
use crate::submission::SubmitError;

/// Errors a handler can bail out with.
///
/// The HTML handlers render validation, PIN and store-write failures inline
/// and only fall back to this response for anything else.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Auth(#[from] GateError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Submit(SubmitError::Store(e))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Submit(SubmitError::Invalid(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            AppError::Submit(SubmitError::InFlight) => (StatusCode::CONFLICT, "IN_FLIGHT"),
            AppError::Submit(SubmitError::Store(_)) => (StatusCode::BAD_GATEWAY, "STORE_ERROR"),
            AppError::Auth(GateError::InvalidPin) => (StatusCode::UNAUTHORIZED, "INVALID_PIN"),
            AppError::Export(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_ERROR"),
            AppError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SESSION_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
