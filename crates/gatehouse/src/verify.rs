//! Compact-token decoding and signature verification.
//!
//! The verifier splits a compact-encoded token, checks the header
//! algorithm against an allow-list BEFORE resolving any key (defense
//! against algorithm-confusion and `alg: none` attacks), resolves the
//! signing key through a [`KeyProvider`], and verifies the signature over
//! header and payload. Claim-level rules are not checked here; that is the
//! assertion engine's job.
//!
//! # Security
//!
//! - Tokens are size-checked before parsing (DoS prevention)
//! - Malformed-token failures are distinct from signature failures
//! - Signature mismatches are logged as potential attack indicators

use crate::claims::TokenClaims;
use crate::errors::VerifyError;
use crate::jwks::{Jwk, KeyProvider};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

/// Maximum allowed compact-token size in bytes (8KB).
///
/// Typical ID tokens are well under 2KB; anything larger is rejected
/// before base64 decoding or signature work.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Signing algorithms accepted by default.
pub const DEFAULT_ALLOWED_ALGORITHMS: &[Algorithm] =
    &[Algorithm::RS256, Algorithm::ES256, Algorithm::EdDSA];

/// Verifies compact-encoded token signatures against one provider's keys.
#[derive(Debug)]
pub struct SignatureVerifier {
    key_provider: Arc<KeyProvider>,
    allowed_algorithms: Vec<Algorithm>,
}

impl SignatureVerifier {
    /// Build a verifier with the default algorithm allow-list.
    #[must_use]
    pub fn new(key_provider: Arc<KeyProvider>) -> Self {
        Self::with_algorithms(key_provider, DEFAULT_ALLOWED_ALGORITHMS.to_vec())
    }

    /// Build a verifier with an explicit algorithm allow-list.
    #[must_use]
    pub fn with_algorithms(key_provider: Arc<KeyProvider>, allowed: Vec<Algorithm>) -> Self {
        Self {
            key_provider,
            allowed_algorithms: allowed,
        }
    }

    /// The key provider this verifier resolves against.
    #[must_use]
    pub fn key_provider(&self) -> &Arc<KeyProvider> {
        &self.key_provider
    }

    /// Verify a compact-encoded token and return its decoded claims.
    ///
    /// # Errors
    ///
    /// - [`VerifyError::TokenTooLarge`] - token exceeds the size limit
    /// - [`VerifyError::MalformedToken`] - bad structure, base64 or JSON
    /// - [`VerifyError::MissingKeyId`] - header has no usable `kid`
    /// - [`VerifyError::UnsupportedAlgorithm`] - header algorithm not on
    ///   the allow-list; returned before any key resolution
    /// - [`VerifyError::IncompatibleKey`] - resolved key does not fit the
    ///   header algorithm
    /// - [`VerifyError::Key`] - key resolution failed
    /// - [`VerifyError::SignatureInvalid`] - signature does not verify
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, VerifyError> {
        if token.len() > MAX_TOKEN_SIZE_BYTES {
            tracing::debug!(
                target: "gatehouse.verify",
                token_size = token.len(),
                max_size = MAX_TOKEN_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(VerifyError::TokenTooLarge);
        }

        let header = decode_header_segment(token)?;

        // The algorithm gate comes before kid extraction and key lookup so
        // a forged header can never drive a key fetch.
        let algorithm = allowed_algorithm(&header, &self.allowed_algorithms)?;

        let kid = header
            .get("kid")
            .and_then(serde_json::Value::as_str)
            .filter(|kid| !kid.is_empty())
            .ok_or(VerifyError::MissingKeyId)?;

        let jwk = self.key_provider.resolve(kid).await?;

        let decoding_key = decoding_key_for(&jwk, algorithm)?;

        // Claim validation is the assertion engine's responsibility, so
        // everything except the signature is disabled here.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = std::collections::HashSet::new();

        let token_data =
            decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::InvalidSignature => {
                        tracing::warn!(
                            target: "gatehouse.verify",
                            kid = %kid,
                            "Signature verification failed; possible forged token"
                        );
                        VerifyError::SignatureInvalid
                    }
                    ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_)
                    | ErrorKind::InvalidToken => {
                        tracing::debug!(target: "gatehouse.verify", error = %e, "Token payload malformed");
                        VerifyError::MalformedToken
                    }
                    _ => {
                        tracing::debug!(target: "gatehouse.verify", error = %e, "Token verification failed");
                        VerifyError::SignatureInvalid
                    }
                }
            })?;

        tracing::debug!(target: "gatehouse.verify", kid = %kid, "Signature verified");
        Ok(token_data.claims)
    }
}

/// Decode the header segment of a compact token.
fn decode_header_segment(token: &str) -> Result<serde_json::Value, VerifyError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "gatehouse.verify",
            parts = parts.len(),
            "Token rejected: invalid compact structure"
        );
        return Err(VerifyError::MalformedToken);
    }

    let header_part = parts.first().ok_or(VerifyError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "gatehouse.verify", error = %e, "Failed to decode token header base64");
        VerifyError::MalformedToken
    })?;

    serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "gatehouse.verify", error = %e, "Failed to parse token header JSON");
        VerifyError::MalformedToken
    })
}

/// Extract the header algorithm and check it against the allow-list.
fn allowed_algorithm(
    header: &serde_json::Value,
    allowed: &[Algorithm],
) -> Result<Algorithm, VerifyError> {
    let alg_name = header
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .ok_or(VerifyError::MalformedToken)?;

    // Anything jsonwebtoken cannot name ("none" included) is unsupported.
    let algorithm = Algorithm::from_str(alg_name)
        .map_err(|_| VerifyError::UnsupportedAlgorithm(alg_name.to_string()))?;

    if !allowed.contains(&algorithm) {
        tracing::warn!(
            target: "gatehouse.verify",
            alg = %alg_name,
            "Token rejected: algorithm not on allow-list"
        );
        return Err(VerifyError::UnsupportedAlgorithm(alg_name.to_string()));
    }

    Ok(algorithm)
}

/// Build a decoding key from a JWK, checking the key shape fits the
/// header algorithm.
fn decoding_key_for(jwk: &Jwk, algorithm: Algorithm) -> Result<DecodingKey, VerifyError> {
    match algorithm {
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
            if jwk.kty != "RSA" {
                return Err(incompatible(jwk, algorithm));
            }
            let (n, e) = match (&jwk.n, &jwk.e) {
                (Some(n), Some(e)) => (n, e),
                _ => return Err(incompatible(jwk, algorithm)),
            };
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| VerifyError::IncompatibleKey(format!("invalid RSA components: {e}")))
        }
        Algorithm::ES256 | Algorithm::ES384 => {
            if jwk.kty != "EC" {
                return Err(incompatible(jwk, algorithm));
            }
            let (x, y) = match (&jwk.x, &jwk.y) {
                (Some(x), Some(y)) => (x, y),
                _ => return Err(incompatible(jwk, algorithm)),
            };
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| VerifyError::IncompatibleKey(format!("invalid EC components: {e}")))
        }
        Algorithm::EdDSA => {
            if jwk.kty != "OKP" {
                return Err(incompatible(jwk, algorithm));
            }
            let x = jwk.x.as_ref().ok_or_else(|| incompatible(jwk, algorithm))?;
            DecodingKey::from_ed_components(x)
                .map_err(|e| VerifyError::IncompatibleKey(format!("invalid OKP component: {e}")))
        }
        // HMAC and the remaining asymmetric families are never on the
        // allow-list for JWKS-backed verification.
        _ => Err(VerifyError::UnsupportedAlgorithm(format!("{algorithm:?}"))),
    }
}

fn incompatible(jwk: &Jwk, algorithm: Algorithm) -> VerifyError {
    tracing::warn!(
        target: "gatehouse.verify",
        kid = %jwk.kid,
        kty = %jwk.kty,
        alg = ?algorithm,
        "JWK shape does not fit token algorithm"
    );
    VerifyError::IncompatibleKey(format!("kty {} does not fit {algorithm:?}", jwk.kty))
}
