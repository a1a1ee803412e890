//! HTTP mapping for the gateway error taxonomy.
//!
//! Every caller-visible failure is serialized as `{"error": {"code",
//! "message"}}` with the status code derived from the error kind. Gates and
//! handlers construct `GatewayError` values; this module owns the single
//! place they become responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tailgate_core::GatewayError;

/// Error response body with code and message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details including code and message.
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable code from the error taxonomy (E1001-E3001).
    pub code: String,
    /// Human-readable error description.
    pub message: String,
}

/// Wrapper turning a `GatewayError` into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl ApiError {
    /// Status code for the wrapped error kind.
    pub fn status(&self) -> StatusCode {
        match self.0 {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<E: Into<GatewayError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Collaborator details stay in the logs, not the response body.
        let message = match &self.0 {
            GatewayError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                "internal error".to_string()
            },
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorDetail { code: self.0.code().to_string(), message },
        };

        (status, Json(body)).into_response()
    }
}
