//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid webhook payload: missing object",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status               |
/// |-----------|------------------|---------------------------|
/// | 1000–1099 | Validation       | 400 Bad Request           |
/// | 1100–1199 | Authentication   | 401 Unauthorized          |
/// | 2000–2999 | Not Found        | 404 Not Found             |
/// | 3000–3999 | Server           | 500 Internal Server Error |
/// | 4000–4999 | Upstream Gateway | 502 Bad Gateway           |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Webhook body failed to parse into a canonical payment event.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Signature verification did not pass and strict mode is active.
    #[error("signature rejected: {0}")]
    SignatureRejected(String),

    /// No payment record exists for the given gateway payment id.
    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// The payment API answered with a non-success status.
    #[error("gateway api error (status {status}): {message}")]
    GatewayApi {
        /// HTTP status code returned by the payment API.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The payment API answered 2xx but the body did not match the
    /// expected payment object schema.
    #[error("gateway response decode error: {0}")]
    GatewayResponse(String),

    /// Transport-level failure talking to the payment API.
    #[error("gateway transport error: {0}")]
    GatewayTransport(#[from] reqwest::Error),

    /// A verification key could not be fetched or decoded.
    #[error("verification key unavailable: {0}")]
    KeyUnavailable(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidPayload(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::SignatureRejected(_) => 1101,
            Self::PaymentNotFound(_) => 2001,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::GatewayApi { .. } => 4001,
            Self::GatewayResponse(_) => 4002,
            Self::GatewayTransport(_) => 4003,
            Self::KeyUnavailable(_) => 4004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::SignatureRejected(_) => StatusCode::UNAUTHORIZED,
            Self::PaymentNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) | Self::PersistenceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::GatewayApi { .. }
            | Self::GatewayResponse(_)
            | Self::GatewayTransport(_)
            | Self::KeyUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
