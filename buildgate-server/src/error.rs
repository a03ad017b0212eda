//! Gate rejections and their HTTP rendering

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use buildgate_core::GateError;
use thiserror::Error;

/// Request rejected before a policy decision was reached
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable signature header
    #[error("Invalid or Missing Signature")]
    MissingSignature,

    /// Signature did not validate
    #[error("Invalid Signature")]
    InvalidSignature,

    /// Body could not be read
    #[error("")]
    BodyRead,

    /// Body is not a build request
    #[error("Invalid Input")]
    InvalidInput,

    /// Anything else; not expected on the request path
    #[error("Internal Server Error")]
    Internal(String),
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status for this rejection
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label used in logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::MissingSignature => "missing_signature",
            ApiError::InvalidSignature => "invalid_signature",
            ApiError::BodyRead => "body_read",
            ApiError::InvalidInput => "invalid_input",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::MissingOrMalformedSignature(_) => ApiError::MissingSignature,
            GateError::InvalidSignature(_) => ApiError::InvalidSignature,
            GateError::BodyReadError(_) => ApiError::BodyRead,
            GateError::MalformedPayload(_) => ApiError::InvalidInput,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(self, ApiError::BodyRead) {
            return status.into_response();
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
