//! Signing-key resolution for identity providers.
//!
//! A [`KeyProvider`] exposes one provider's public signing keys by key id.
//! It is either fixed (a static, pre-fetched [`JsonWebKeySet`] for tests
//! and offline use) or remote (a cached HTTPS fetch against the provider's
//! JWKS endpoint).
//!
//! # Concurrency
//!
//! The remote cache supports many concurrent readers; a refresh fetches
//! outside the write lock and installs the new set with a single atomic
//! swap. A refresh guard gives singleflight semantics: N concurrent
//! resolves against a cold or stale cache produce exactly one underlying
//! fetch. A cancelled fetch installs nothing.
//!
//! # Failure policy
//!
//! Fetch failures surface as [`KeyResolveError::KeySourceUnavailable`],
//! never as an empty set. There is no retry loop in here; retry policy
//! belongs to the caller. A key id missing from a fresh cache triggers
//! exactly one forced refresh (key rotation) before failing with
//! [`KeyResolveError::UnknownKeyId`].

use crate::errors::KeyResolveError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// JWKS fetch request timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JWKS fetch connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A JSON Web Key as published in a provider's JWKS document.
///
/// Carries the material for the key shapes this crate verifies against:
/// RSA (`n`/`e`), EC (`crv`/`x`/`y`) and OKP/Ed25519 (`x`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "OKP").
    pub kty: String,

    /// Key id - used to select the key a token was signed with.
    pub kid: String,

    /// Algorithm hint (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing keys).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Curve name for EC/OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// Public key value (base64url): EC x coordinate or Ed25519 key.
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
}

/// A provider's published key set, keyed by key id on lookup.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JsonWebKeySet {
    /// The published keys.
    pub keys: Vec<Jwk>,
}

impl JsonWebKeySet {
    /// Build a key set from a list of keys.
    #[must_use]
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    /// Find a key by id.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    fn into_map(self) -> HashMap<String, Jwk> {
        self.keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect()
    }
}

/// Cached remote keys with fetch time and a refresh generation counter.
struct CachedKeys {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
    generation: u64,
}

/// Remote JWKS source with a TTL cache and singleflight refresh.
struct RemoteJwks {
    jwks_url: String,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
    refresh_guard: Mutex<()>,
    cache_ttl: Duration,
}

impl RemoteJwks {
    fn new(jwks_url: String, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gatehouse.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            refresh_guard: Mutex::new(()),
            cache_ttl,
        }
    }

    async fn resolve(&self, kid: &str) -> Result<Jwk, KeyResolveError> {
        // Fast path: fresh cache with the key present.
        let seen_generation = {
            let cache = self.cache.read().await;
            match cache.as_ref() {
                Some(cached) => {
                    if cached.fetched_at.elapsed() < self.cache_ttl {
                        if let Some(key) = cached.keys.get(kid) {
                            tracing::debug!(target: "gatehouse.jwks", kid = %kid, "JWKS cache hit");
                            return Ok(key.clone());
                        }
                        // Fresh cache without the kid: allow one forced
                        // refresh in case the provider rotated keys.
                        tracing::debug!(target: "gatehouse.jwks", kid = %kid, "Key not in fresh cache, forcing refresh");
                    }
                    Some(cached.generation)
                }
                None => None,
            }
        };

        self.refresh(seen_generation).await?;

        let cache = self.cache.read().await;
        if let Some(cached) = cache.as_ref() {
            if let Some(key) = cached.keys.get(kid) {
                return Ok(key.clone());
            }
        }

        tracing::warn!(target: "gatehouse.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(KeyResolveError::UnknownKeyId(kid.to_string()))
    }

    /// Refresh the cache unless another caller already did so.
    ///
    /// `seen_generation` is the generation the caller observed before
    /// deciding to refresh; if the installed generation differs and the
    /// cache is still fresh, that refresh is shared instead of fetching
    /// again.
    async fn refresh(&self, seen_generation: Option<u64>) -> Result<(), KeyResolveError> {
        let _guard = self.refresh_guard.lock().await;

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if Some(cached.generation) != seen_generation
                    && cached.fetched_at.elapsed() < self.cache_ttl
                {
                    return Ok(());
                }
            }
        }

        let keys = self.fetch().await?;

        let mut cache = self.cache.write().await;
        let generation = cache.as_ref().map_or(0, |cached| cached.generation) + 1;
        *cache = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
            generation,
        });

        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<HashMap<String, Jwk>, KeyResolveError> {
        tracing::debug!(target: "gatehouse.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gatehouse.jwks", error = %e, "Failed to fetch JWKS");
                KeyResolveError::KeySourceUnavailable(format!("fetch failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(target: "gatehouse.jwks", status = %status, "JWKS endpoint returned error");
            return Err(KeyResolveError::KeySourceUnavailable(format!(
                "unexpected status: {status}"
            )));
        }

        let key_set: JsonWebKeySet = response.json().await.map_err(|e| {
            tracing::error!(target: "gatehouse.jwks", error = %e, "Failed to parse JWKS document");
            KeyResolveError::KeySourceUnavailable(format!("malformed document: {e}"))
        })?;

        let keys = key_set.into_map();
        tracing::info!(target: "gatehouse.jwks", key_count = keys.len(), "JWKS cache refreshed");
        Ok(keys)
    }
}

enum KeySource {
    Fixed(HashMap<String, Jwk>),
    Remote(RemoteJwks),
}

/// Resolves one identity provider's signing keys by key id.
pub struct KeyProvider {
    source: KeySource,
    resolve_calls: AtomicU64,
}

impl KeyProvider {
    /// Build a provider over a static, pre-fetched key set.
    #[must_use]
    pub fn fixed(key_set: JsonWebKeySet) -> Self {
        Self {
            source: KeySource::Fixed(key_set.into_map()),
            resolve_calls: AtomicU64::new(0),
        }
    }

    /// Build a provider that fetches the key set from a JWKS endpoint,
    /// caching it with the default TTL.
    #[must_use]
    pub fn remote(jwks_url: impl Into<String>) -> Self {
        Self::remote_with_ttl(jwks_url, DEFAULT_CACHE_TTL)
    }

    /// Build a remote provider with a custom cache TTL.
    #[must_use]
    pub fn remote_with_ttl(jwks_url: impl Into<String>, cache_ttl: Duration) -> Self {
        Self {
            source: KeySource::Remote(RemoteJwks::new(jwks_url.into(), cache_ttl)),
            resolve_calls: AtomicU64::new(0),
        }
    }

    /// Resolve a signing key by id.
    ///
    /// # Errors
    ///
    /// - [`KeyResolveError::KeySourceUnavailable`] when the key source
    ///   cannot be read (remote sources only).
    /// - [`KeyResolveError::UnknownKeyId`] when the id is not in the set.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Jwk, KeyResolveError> {
        self.resolve_calls.fetch_add(1, Ordering::Relaxed);

        match &self.source {
            KeySource::Fixed(keys) => keys
                .get(kid)
                .cloned()
                .ok_or_else(|| KeyResolveError::UnknownKeyId(kid.to_string())),
            KeySource::Remote(remote) => remote.resolve(kid).await,
        }
    }

    /// Number of `resolve` calls made against this provider.
    ///
    /// Lets callers and tests observe whether key lookup happened at all,
    /// e.g. that an unsupported-algorithm rejection skipped it.
    #[must_use]
    pub fn resolve_calls(&self) -> u64 {
        self.resolve_calls.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for KeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            KeySource::Fixed(keys) => format!("Fixed({} keys)", keys.len()),
            KeySource::Remote(remote) => format!("Remote({})", remote.jwks_url),
        };
        f.debug_struct("KeyProvider")
            .field("source", &source)
            .field("resolve_calls", &self.resolve_calls())
            .finish()
    }
}
