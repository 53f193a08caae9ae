//! Error types for the extension backend's HTTP surface.
//!
//! [`ApiError`] is what route handlers return. Every variant maps to a
//! status code and a `{"error": "..."}` JSON body through its
//! [`IntoResponse`] implementation, so handlers can use `?` freely.
//!
//! # Error Kinds
//!
//! | Variant | Status | Body |
//! |---------|--------|------|
//! | `AuthenticationMissing` | 401 | `No token provided` |
//! | `AuthenticationInvalid` | 401 | `Invalid token` |
//! | `StatsSecretInvalid` | 401 | `Invalid stats secret` |
//! | `BadRequest` | 400 | the validation message |
//! | `UpstreamForwarding` | 500 | a generic per-route message |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;

/// Errors returned by route handlers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No bearer token was supplied on an authenticated route.
    #[error("No token provided")]
    AuthenticationMissing,

    /// The bearer token failed verification.
    #[error("Invalid token")]
    AuthenticationInvalid,

    /// The shared secret on the stats callback was missing or wrong.
    #[error("Invalid stats secret")]
    StatsSecretInvalid,

    /// The request body was malformed or missing required fields.
    #[error("{0}")]
    BadRequest(String),

    /// The alert server call failed. Carries the public message only;
    /// the underlying cause is logged where it happens.
    #[error("{0}")]
    UpstreamForwarding(String),
}

impl ApiError {
    /// Creates a new bad request error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use arena_ebs::error::ApiError;
    ///
    /// let err = ApiError::bad_request("'userId' must not be empty");
    /// assert!(matches!(err, ApiError::BadRequest(_)));
    /// ```
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Creates a new upstream forwarding error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamForwarding(message.into())
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationMissing | Self::AuthenticationInvalid | Self::StatsSecretInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamForwarding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if this error indicates a client-side problem.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => Self::AuthenticationMissing,
            AuthError::SecretMismatch => Self::StatsSecretInvalid,
            AuthError::InvalidToken(_) | AuthError::InvalidSecret => Self::AuthenticationInvalid,
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
