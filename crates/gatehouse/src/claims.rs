//! Decoded ID-token claims.
//!
//! [`TokenClaims`] is an insertion-ordered mapping from claim name to JSON
//! value, created fresh per verification attempt and discarded when the
//! request completes. Typed accessors cover the registered OIDC claims;
//! provider-specific custom claims are reachable through [`TokenClaims::get`].
//!
//! # Security
//!
//! The `sub` claim is redacted in Debug output so claim sets can be traced
//! without logging user identifiers.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// The decoded claim set of an ID token.
///
/// Claim order follows the token payload's JSON order.
#[derive(Clone, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct TokenClaims {
    claims: Map<String, Value>,
}

impl TokenClaims {
    /// Build a claim set from an ordered JSON map.
    #[must_use]
    pub fn from_map(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Look up a claim by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The `sub` (subject) claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// The `iss` (issuer) claim.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.str_claim("iss")
    }

    /// The `aud` (audience) claim values.
    ///
    /// OIDC allows `aud` to be a single string or an array of strings;
    /// both forms are returned as a list. Non-string array entries are
    /// skipped.
    #[must_use]
    pub fn audiences(&self) -> Vec<&str> {
        match self.claims.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(entries)) => {
                entries.iter().filter_map(Value::as_str).collect()
            }
            _ => Vec::new(),
        }
    }

    /// The `exp` (expiry) claim as Unix epoch seconds.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.claims.get("exp").and_then(Value::as_i64)
    }

    /// The `iat` (issued-at) claim as Unix epoch seconds.
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.claims.get("iat").and_then(Value::as_i64)
    }

    /// The `nonce` claim.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.str_claim("nonce")
    }

    /// Number of claims in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether the claim set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Iterate over claims in token order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.claims.iter()
    }

    fn str_claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.claims {
            if name == "sub" {
                map.entry(name, &"[REDACTED]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}
