//! Deterministic cryptographic fixtures for testing.
//!
//! Provides reproducible Ed25519 keypairs: the same seed always produces
//! the same keypair, so signed test tokens are stable across runs.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use gatehouse::jwks::JsonWebKeySet;
use ring::signature::{Ed25519KeyPair, KeyPair};

/// A deterministic Ed25519 keypair for signing test tokens.
pub struct TestKeypair {
    kid: String,
    public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    /// Create a keypair from a seed value.
    ///
    /// # Panics
    ///
    /// Panics if the keypair cannot be constructed (test-only code).
    #[must_use]
    pub fn new(seed: u8, kid: &str) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("Failed to create test keypair");

        Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    /// The keypair's key id.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The private key as a PKCS#8 v1 document, for `EncodingKey`.
    #[must_use]
    pub fn private_key_pkcs8(&self) -> &[u8] {
        &self.private_key_pkcs8
    }

    /// The raw public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key_bytes
    }

    /// The public key as a JWK JSON object.
    #[must_use]
    pub fn jwk_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig"
        })
    }

    /// A JWKS document containing just this key.
    #[must_use]
    pub fn jwks_document(&self) -> serde_json::Value {
        serde_json::json!({ "keys": [self.jwk_json()] })
    }

    /// The key as a parsed [`JsonWebKeySet`] for static key providers.
    ///
    /// # Panics
    ///
    /// Panics if the generated JWK does not deserialize (test-only code).
    #[must_use]
    pub fn key_set(&self) -> JsonWebKeySet {
        serde_json::from_value(self.jwks_document()).expect("JWKS document should deserialize")
    }
}

/// Build a PKCS#8 v1 document from an Ed25519 seed.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::new();

    // Outer SEQUENCE tag
    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: SEQUENCE
    pkcs8.push(0x30);
    pkcs8.push(0x05); // Length: 5 bytes
                      // OID for Ed25519: 1.3.101.112
    pkcs8.extend_from_slice(&[0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING
    pkcs8.push(0x04);
    pkcs8.push(0x22); // Length: 34 bytes
                      // Inner OCTET STRING with seed
    pkcs8.push(0x04);
    pkcs8.push(0x20); // Length: 32 bytes
    pkcs8.extend_from_slice(seed);

    pkcs8
}
