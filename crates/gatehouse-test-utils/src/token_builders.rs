//! Builders for test ID tokens.
//!
//! [`IdTokenBuilder`] produces properly-signed tokens through a
//! [`TestKeypair`]; [`forge_token`] assembles deliberately-invalid compact
//! tokens for negative tests (algorithm confusion, bad signatures).

use crate::crypto_fixtures::TestKeypair;
use crate::test_ids::{TEST_CLIENT_ID, TEST_ISSUER, TEST_SUBJECT};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for ID-token claim sets.
///
/// Defaults describe a currently-valid token from the test provider:
/// issuer [`TEST_ISSUER`], audience [`TEST_CLIENT_ID`], subject
/// [`TEST_SUBJECT`], one hour of validity.
///
/// # Example
/// ```rust,ignore
/// let token = IdTokenBuilder::new()
///     .subject("alice")
///     .nonce("n-1")
///     .sign(&keypair);
/// ```
pub struct IdTokenBuilder {
    claims: Map<String, Value>,
}

impl IdTokenBuilder {
    /// A builder holding valid default claims.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!([TEST_CLIENT_ID]));
        claims.insert("sub".to_string(), json!(TEST_SUBJECT));
        claims.insert("exp".to_string(), json!(now + 3600));
        claims.insert("iat".to_string(), json!(now));
        Self { claims }
    }

    /// Set the issuer.
    #[must_use]
    pub fn issuer(self, issuer: &str) -> Self {
        self.claim("iss", json!(issuer))
    }

    /// Set the audience list.
    #[must_use]
    pub fn audience(self, audiences: &[&str]) -> Self {
        self.claim("aud", json!(audiences))
    }

    /// Set the subject.
    #[must_use]
    pub fn subject(self, subject: &str) -> Self {
        self.claim("sub", json!(subject))
    }

    /// Set expiry in seconds from now.
    #[must_use]
    pub fn expires_in(self, seconds: i64) -> Self {
        self.claim("exp", json!(Utc::now().timestamp() + seconds))
    }

    /// Set the expiry timestamp.
    #[must_use]
    pub fn expires_at(self, timestamp: i64) -> Self {
        self.claim("exp", json!(timestamp))
    }

    /// Set the issued-at timestamp.
    #[must_use]
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.claim("iat", json!(timestamp))
    }

    /// Set the nonce.
    #[must_use]
    pub fn nonce(self, nonce: &str) -> Self {
        self.claim("nonce", json!(nonce))
    }

    /// Set an arbitrary claim.
    #[must_use]
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim, e.g. to build a token without `exp`.
    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// The claim set as a JSON value.
    #[must_use]
    pub fn build_claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign the claims with a test keypair (EdDSA, keypair's kid).
    ///
    /// # Panics
    ///
    /// Panics if signing fails (test-only code).
    #[must_use]
    pub fn sign(&self, keypair: &TestKeypair) -> String {
        self.sign_with_kid(keypair, keypair.kid())
    }

    /// Sign the claims but stamp a different kid into the header, e.g. to
    /// simulate a token from a rotated-away key.
    ///
    /// # Panics
    ///
    /// Panics if signing fails (test-only code).
    #[must_use]
    pub fn sign_with_kid(&self, keypair: &TestKeypair, kid: &str) -> String {
        let encoding_key = EncodingKey::from_ed_der(keypair.private_key_pkcs8());
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(kid.to_string());

        encode(&header, &self.build_claims(), &encoding_key).expect("Failed to sign test token")
    }
}

impl Default for IdTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble a compact token from raw header and payload JSON plus an
/// arbitrary signature segment. For negative tests only: nothing here is
/// signed.
#[must_use]
pub fn forge_token(header: &Value, claims: &Value, signature: &str) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header_b64}.{claims_b64}.{signature}")
}
