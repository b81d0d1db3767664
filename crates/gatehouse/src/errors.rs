//! Error taxonomy for the authentication pipeline.
//!
//! Every layer below the authentication provider returns a typed result to
//! its caller. The [`AuthenticationFailure`] wrapper is the boundary that
//! converts those into a single external-facing failure: its `Display` is
//! a generic message (no verification internals leak to an attacker) while
//! the original cause stays available for logging and diagnostics.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors resolving a signing key from a key source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyResolveError {
    /// The key source could not be read: network error, non-2xx status, or
    /// a malformed JWKS document. Candidate for caller-level retry with
    /// backoff; never retried silently inside the provider.
    #[error("Key source unavailable: {0}")]
    KeySourceUnavailable(String),

    /// The token references a key id not present in the current set, even
    /// after one forced refresh.
    #[error("Unknown key id: {0}")]
    UnknownKeyId(String),
}

/// Errors verifying a compact-encoded token's signature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Token exceeds the maximum allowed size. Rejected before any parsing
    /// or cryptographic work.
    #[error("Token exceeds maximum allowed size")]
    TokenTooLarge,

    /// Token is structurally invalid: wrong segment count, bad base64, or
    /// bad JSON. Distinct from [`VerifyError::SignatureInvalid`].
    #[error("Malformed token")]
    MalformedToken,

    /// Token header carries no usable `kid` for key lookup.
    #[error("Token header has no key id")]
    MissingKeyId,

    /// The header algorithm is not on the allow-list. Fatal, no retry:
    /// indicates misconfiguration or an algorithm-confusion attempt.
    /// Checked before any key resolution.
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The resolved key's type does not fit the header algorithm, or its
    /// material cannot be decoded.
    #[error("Signing key incompatible with token algorithm: {0}")]
    IncompatibleKey(String),

    /// Key resolution failed.
    #[error(transparent)]
    Key(#[from] KeyResolveError),

    /// The token is well-formed but its signature does not verify.
    #[error("Signature verification failed")]
    SignatureInvalid,
}

/// A claim assertion rejected the token.
///
/// Carries the failing assertion's name and a human-readable reason for
/// diagnostics. Reasons describe configured expectations, never secret
/// material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Claim assertion '{assertion}' failed: {reason}")]
pub struct ClaimViolation {
    /// Name of the assertion that failed.
    pub assertion: String,

    /// Human-readable violation reason.
    pub reason: String,
}

/// The underlying cause of an authentication failure.
#[derive(Error, Debug)]
pub enum FailureCause {
    /// No credentials were presented for a route this system intercepts.
    #[error("No bearer credentials presented")]
    MissingCredentials,

    /// Signature verification rejected the token.
    #[error(transparent)]
    Verification(#[from] VerifyError),

    /// The claim-assertion engine rejected the token.
    #[error(transparent)]
    Claims(#[from] ClaimViolation),

    /// The user-mapping strategy could not build a principal.
    #[error("User mapping failed: {0}")]
    Mapping(String),
}

/// External-facing authentication failure.
///
/// `Display` is intentionally generic; log the [`FailureCause`] instead.
#[derive(Error, Debug)]
#[error("Authentication failed")]
pub struct AuthenticationFailure {
    /// The preserved cause, for logging and diagnostics.
    pub cause: FailureCause,
}

impl AuthenticationFailure {
    /// Wrap a cause into the external-facing failure.
    #[must_use]
    pub fn new(cause: impl Into<FailureCause>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthenticationFailure {
    fn into_response(self) -> Response {
        // The response body never distinguishes causes; the distinction
        // lives in logs only.
        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: "AUTHENTICATION_FAILED".to_string(),
                message: self.to_string(),
            },
        };

        (StatusCode::UNAUTHORIZED, Json(error_response)).into_response()
    }
}
