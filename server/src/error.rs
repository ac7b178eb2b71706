use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tts_core::{ErrorKind, SynthesisError};

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Synthesis timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
    code: u16,
    error_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Synthesis(e) => match e.kind() {
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Synthesis(e) => e.kind().as_str(),
            ApiError::InvalidInput(_) => ErrorKind::InvalidInput.as_str(),
            ApiError::PayloadTooLarge(_) => "PayloadTooLarge",
            ApiError::Timeout(_) => "Timeout",
            ApiError::InternalError(_) => "Internal",
        }
    }

    /// Caller-facing message. Server-side failures get a generic line; the
    /// specifics are logged under the error id instead.
    fn public_message(&self) -> String {
        match self {
            ApiError::Synthesis(e) if e.kind().is_client_error() => e.to_string(),
            ApiError::Synthesis(e) => match e.kind() {
                ErrorKind::MissingOutputSlot | ErrorKind::ShapeMismatch => {
                    "Acoustic model output could not be used".to_string()
                }
                ErrorKind::ModelFailure => "Speech model failed".to_string(),
                _ => "Audio encoding failed".to_string(),
            },
            ApiError::InvalidInput(_) | ApiError::PayloadTooLarge(_) | ApiError::Timeout(_) => {
                self.to_string()
            }
            ApiError::InternalError(_) => "Internal server error".to_string(),
        }
    }

    /// Render the error, optionally including the full diagnostic chain for
    /// server-side failures.
    pub fn into_response_with_detail(self, expose_detail: bool) -> Response {
        let status = self.status();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(error_id = %error_id, kind = self.kind(), "{}: {:?}", self, self);
        } else {
            tracing::warn!(error_id = %error_id, kind = self.kind(), "{}", self);
        }

        let detail = (expose_detail && status.is_server_error())
            .then(|| format!("An error occurred: {}\n\nTrace:\n{:?}", self, self));

        let body = Json(ErrorResponse {
            error: self.public_message(),
            kind: self.kind(),
            code: status.as_u16(),
            error_id,
            detail,
        });

        (status, body).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with_detail(false)
    }
}
