//! Authentication for extension requests.
//!
//! The extension front end sends every request with an
//! `Authorization: Bearer <jwt>` header. Tokens are HS256 JWTs signed by the
//! extension platform with a secret shared out-of-band; this module verifies
//! them locally (no network call) and decodes the embedded claims.
//!
//! # Overview
//!
//! 1. [`require_extension_token`] runs as route middleware and pulls the
//!    token out of the `Authorization` header.
//! 2. [`TokenVerifier::verify`] checks the signature and expiry.
//! 3. The decoded [`ExtensionClaims`] are inserted into the request
//!    extensions, where handlers can read them with `Extension<ExtensionClaims>`.
//!
//! A second, simpler check guards the alert server's stats callback:
//! [`validate_shared_secret`] compares a header value against a configured
//! secret in constant time.
//!
//! # Example
//!
//! ```rust
//! use arena_ebs::auth::{extract_bearer, TokenVerifier};
//!
//! let verifier = TokenVerifier::new(b"shared-secret".to_vec());
//! let token = extract_bearer("Bearer not.a.jwt").unwrap();
//! assert!(verifier.verify(token).is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use base64::prelude::*;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, trace};

use crate::error::ApiError;

/// Scheme prefix stripped from the `Authorization` header.
const BEARER_PREFIX: &str = "Bearer ";

/// Errors that can occur while authenticating a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was supplied.
    #[error("no token provided")]
    MissingToken,

    /// The token was malformed, badly signed or expired.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The configured signing secret could not be decoded.
    #[error("invalid signing secret encoding")]
    InvalidSecret,

    /// A shared secret header did not match the configured value.
    #[error("shared secret mismatch")]
    SecretMismatch,
}

/// Claims carried by an extension JWT.
///
/// Only `channel_id` and `opaque_user_id` are required; the remaining fields
/// are present depending on whether the viewer has shared their identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionClaims {
    /// Expiry as seconds since the Unix epoch.
    pub exp: u64,

    /// Per-viewer identifier that does not reveal the account.
    pub opaque_user_id: String,

    /// Real account id, only present once the viewer grants identity access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Channel the extension is running on.
    pub channel_id: String,

    /// Viewer role (`broadcaster`, `moderator`, `viewer`, `external`).
    #[serde(default)]
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_unlinked: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubsub_perms: Option<serde_json::Value>,
}

/// Verifies HS256 extension tokens against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Creates a verifier from raw secret bytes.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Extension tokens carry no audience claim.
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    /// Creates a verifier from a base64-encoded secret, the form in which the
    /// extension platform issues it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSecret`] if the secret is not valid base64.
    pub fn from_base64(secret: &str) -> Result<Self, AuthError> {
        let bytes = BASE64_STANDARD
            .decode(secret.trim())
            .map_err(|_| AuthError::InvalidSecret)?;
        Ok(Self::new(bytes))
    }

    /// Verifies a token and returns its decoded claims.
    ///
    /// Checks the HS256 signature and the `exp` claim (with the default
    /// 60 second leeway).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for malformed tokens, signature
    /// mismatches, unexpected algorithms and expired tokens.
    pub fn verify(&self, token: &str) -> Result<ExtensionClaims, AuthError> {
        let data = decode::<ExtensionClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        trace!(
            channel_id = %data.claims.channel_id,
            role = %data.claims.role,
            "Extension token verified"
        );

        Ok(data.claims)
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("key", &"<redacted>")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

/// Extracts the token from an `Authorization` header value.
///
/// The `Bearer ` prefix is stripped when present. Returns `None` when
/// nothing remains.
pub fn extract_bearer(header_value: &str) -> Option<&str> {
    let token = header_value
        .strip_prefix(BEARER_PREFIX)
        .unwrap_or(header_value)
        .trim();
    (!token.is_empty()).then_some(token)
}

/// Compares a provided shared secret against the expected one in constant time.
///
/// # Errors
///
/// Returns [`AuthError::SecretMismatch`] when the value is missing or differs.
pub fn validate_shared_secret(provided: Option<&str>, expected: &str) -> Result<(), AuthError> {
    let provided = provided.ok_or(AuthError::SecretMismatch)?;
    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(AuthError::SecretMismatch)
    }
}

/// Middleware that requires a valid extension token.
///
/// Rejects with 401 `No token provided` when the header is absent and
/// 401 `Invalid token` when verification fails. On success the decoded
/// [`ExtensionClaims`] are attached to the request extensions.
pub async fn require_extension_token(
    State(verifier): State<Arc<TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer)
        .ok_or_else(|| {
            debug!(path = %req.uri().path(), "Missing bearer token");
            AuthError::MissingToken
        })?;

    let claims = verifier.verify(token).map_err(|err| {
        debug!(path = %req.uri().path(), error = %err, "Token verification failed");
        err
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
