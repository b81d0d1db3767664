//! Route-scoped provider registrations and request dispatch.
//!
//! A [`ProviderRegistry`] holds the ordered list of configured identity
//! providers, each bound to a [`RoutePredicate`]. For an incoming request
//! it selects the first registration whose predicate matches (first match
//! wins, in registration order) and delegates to that provider's
//! authentication pipeline. Requests no registration claims pass through
//! unauthenticated so later mechanisms in the host's chain can apply.
//!
//! The registry is append-only: built once at startup, then read-only
//! during request handling.

use crate::assertions::{AssertionChain, ClaimAssertion, MAX_CLOCK_SKEW};
use crate::config::{ClientConfig, IdentityProviderConfig};
use crate::errors::AuthenticationFailure;
use crate::jwks::{JsonWebKeySet, KeyProvider};
use crate::principal::{MapClaimsToPrincipal, Principal, SubjectMapper};
use crate::provider::{AuthenticationProvider, AuthorizationResult};
use crate::verify::SignatureVerifier;
use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The routing facts a predicate may inspect.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    /// HTTP method, uppercase (e.g. "GET").
    pub method: &'a str,

    /// Request path, starting with '/'.
    pub path: &'a str,
}

impl<'a> RouteRequest<'a> {
    /// Build a route request.
    #[must_use]
    pub fn new(method: &'a str, path: &'a str) -> Self {
        Self { method, path }
    }
}

type PredicateFn = dyn Fn(&RouteRequest<'_>) -> bool + Send + Sync;

/// Decides whether a registration intercepts a request.
#[derive(Clone)]
pub enum RoutePredicate {
    /// Matches every request.
    Any,

    /// Matches the request path against a pattern: literal segments,
    /// `*` for exactly one segment, and a trailing `/**` for the prefix
    /// itself plus any deeper path.
    Path(String),

    /// Host-supplied predicate.
    Custom(Arc<PredicateFn>),
}

impl RoutePredicate {
    /// A predicate matching every request.
    #[must_use]
    pub fn any() -> Self {
        Self::Any
    }

    /// A path-pattern predicate.
    #[must_use]
    pub fn path(pattern: impl Into<String>) -> Self {
        Self::Path(pattern.into())
    }

    /// A host-supplied predicate.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&RouteRequest<'_>) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    /// Whether the predicate matches a request.
    #[must_use]
    pub fn matches(&self, request: &RouteRequest<'_>) -> bool {
        match self {
            Self::Any => true,
            Self::Path(pattern) => path_pattern_matches(pattern, request.path),
            Self::Custom(predicate) => predicate(request),
        }
    }
}

impl fmt::Debug for RoutePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Path(pattern) => write!(f, "Path({pattern:?})"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Match a path against a pattern, segment by segment.
fn path_pattern_matches(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some((last, prefix)) = pattern_segments.split_last() {
        if *last == "**" {
            // "/app/**" covers "/app" itself and anything below it.
            if path_segments.len() < prefix.len() {
                return false;
            }
            return prefix
                .iter()
                .zip(&path_segments)
                .all(|(p, s)| *p == "*" || p == s);
        }
    }

    pattern_segments.len() == path_segments.len()
        && pattern_segments
            .iter()
            .zip(&path_segments)
            .all(|(p, s)| *p == "*" || p == s)
}

/// One configured identity provider, bound to a route scope.
#[derive(Debug)]
pub struct IdentityProviderRegistration {
    name: String,
    provider: IdentityProviderConfig,
    client: ClientConfig,
    route: RoutePredicate,
    authenticator: AuthenticationProvider,
}

impl IdentityProviderRegistration {
    /// Label used in logs; defaults to the issuer URL.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provider's metadata.
    #[must_use]
    pub fn provider(&self) -> &IdentityProviderConfig {
        &self.provider
    }

    /// This relying party's registration with the provider.
    #[must_use]
    pub fn client(&self) -> &ClientConfig {
        &self.client
    }

    /// The route scope.
    #[must_use]
    pub fn route(&self) -> &RoutePredicate {
        &self.route
    }

    /// The authentication pipeline for this provider.
    #[must_use]
    pub fn authenticator(&self) -> &AuthenticationProvider {
        &self.authenticator
    }
}

/// Errors building a registration.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// A required field was not supplied.
    #[error("Missing required registration field: {0}")]
    MissingField(&'static str),

    /// Clock-skew tolerance exceeds the allowed maximum.
    #[error("Invalid clock skew: {0}")]
    InvalidClockSkew(String),
}

/// Builds a validated [`IdentityProviderRegistration`].
///
/// Provider metadata, client credentials and a redirect URL are required;
/// everything else has defaults (any-request route, remote JWKS from the
/// provider's URL, zero clock skew, baseline assertions only, subject
/// mapping).
pub struct RegistrationBuilder {
    name: Option<String>,
    provider: Option<IdentityProviderConfig>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    redirect_url: Option<String>,
    scopes: Vec<String>,
    route: RoutePredicate,
    key_provider: Option<Arc<KeyProvider>>,
    clock_skew: Duration,
    allowed_algorithms: Option<Vec<Algorithm>>,
    extra_assertions: Vec<ClaimAssertion>,
    mapper: Option<Arc<dyn MapClaimsToPrincipal>>,
}

impl RegistrationBuilder {
    /// Start a registration scoped to every request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            provider: None,
            client_id: None,
            client_secret: None,
            redirect_url: None,
            scopes: Vec::new(),
            route: RoutePredicate::Any,
            key_provider: None,
            clock_skew: Duration::ZERO,
            allowed_algorithms: None,
            extra_assertions: Vec::new(),
            mapper: None,
        }
    }

    /// Label for logs.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The provider's metadata (required).
    #[must_use]
    pub fn provider(mut self, provider: IdentityProviderConfig) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Client credentials registered with the provider (required).
    #[must_use]
    pub fn client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret);
        self
    }

    /// Redirect URL registered with the provider (required).
    #[must_use]
    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    /// Scopes to request during authorization.
    #[must_use]
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Scope the registration to a route.
    #[must_use]
    pub fn route(mut self, route: RoutePredicate) -> Self {
        self.route = route;
        self
    }

    /// Use a static key set instead of fetching the provider's JWKS URL.
    #[must_use]
    pub fn jwks_keys(mut self, key_set: JsonWebKeySet) -> Self {
        self.key_provider = Some(Arc::new(KeyProvider::fixed(key_set)));
        self
    }

    /// Use a custom key provider.
    #[must_use]
    pub fn key_provider(mut self, key_provider: Arc<KeyProvider>) -> Self {
        self.key_provider = Some(key_provider);
        self
    }

    /// Clock-skew tolerance for the time-based assertions (default 0).
    #[must_use]
    pub fn clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// Override the signing-algorithm allow-list.
    #[must_use]
    pub fn allowed_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = Some(algorithms);
        self
    }

    /// Append a provider-specific assertion after the baseline set.
    #[must_use]
    pub fn assert_claims(mut self, assertion: ClaimAssertion) -> Self {
        self.extra_assertions.push(assertion);
        self
    }

    /// Override the user-mapping strategy (default: subject mapping).
    #[must_use]
    pub fn map_claims(mut self, mapper: Arc<dyn MapClaimsToPrincipal>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Validate completeness and assemble the registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::MissingField`] when provider metadata,
    /// client credentials or the redirect URL are absent, and
    /// [`RegistrationError::InvalidClockSkew`] when the skew tolerance
    /// exceeds the maximum.
    pub fn build(self) -> Result<IdentityProviderRegistration, RegistrationError> {
        let provider = self
            .provider
            .ok_or(RegistrationError::MissingField("provider"))?;
        let client_id = self
            .client_id
            .ok_or(RegistrationError::MissingField("client_id"))?;
        let client_secret = self
            .client_secret
            .ok_or(RegistrationError::MissingField("client_secret"))?;
        let redirect_url = self
            .redirect_url
            .ok_or(RegistrationError::MissingField("redirect_url"))?;

        if self.clock_skew > MAX_CLOCK_SKEW {
            return Err(RegistrationError::InvalidClockSkew(format!(
                "clock skew must not exceed {} seconds, got {}",
                MAX_CLOCK_SKEW.as_secs(),
                self.clock_skew.as_secs()
            )));
        }

        let client =
            ClientConfig::new(client_id, client_secret, redirect_url).with_scopes(self.scopes);

        let key_provider = self
            .key_provider
            .unwrap_or_else(|| Arc::new(KeyProvider::remote(provider.jwks_url.clone())));

        let verifier = match self.allowed_algorithms {
            Some(algorithms) => SignatureVerifier::with_algorithms(key_provider, algorithms),
            None => SignatureVerifier::new(key_provider),
        };

        let mut assertions =
            AssertionChain::baseline(&provider.issuer, &client.client_id, self.clock_skew);
        for assertion in self.extra_assertions {
            assertions.push(assertion);
        }

        let mapper = self.mapper.unwrap_or_else(|| Arc::new(SubjectMapper));

        let name = self.name.unwrap_or_else(|| provider.issuer.clone());

        Ok(IdentityProviderRegistration {
            name,
            provider,
            client,
            route: self.route,
            authenticator: AuthenticationProvider::new(verifier, assertions, mapper),
        })
    }
}

impl Default for RegistrationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of dispatching one request through the registry.
#[derive(Debug)]
pub enum AuthenticationOutcome {
    /// A registration matched and its pipeline produced a principal.
    Authenticated(Principal),

    /// No registration matched; the request proceeds unauthenticated.
    Passthrough,

    /// A registration matched but authentication failed.
    Rejected(AuthenticationFailure),
}

/// The ordered set of configured providers.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    registrations: Vec<IdentityProviderRegistration>,
}

impl ProviderRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration. Registration order is dispatch order.
    pub fn register(&mut self, registration: IdentityProviderRegistration) {
        self.registrations.push(registration);
    }

    /// Append a registration, builder-style.
    #[must_use]
    pub fn with(mut self, registration: IdentityProviderRegistration) -> Self {
        self.register(registration);
        self
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Select the first registration whose route predicate matches.
    ///
    /// Predicates may overlap (a catch-all behind a path-scoped one), so
    /// first-match-wins in registration order is load-bearing.
    #[must_use]
    pub fn match_request(&self, request: &RouteRequest<'_>) -> Option<&IdentityProviderRegistration> {
        self.registrations
            .iter()
            .find(|registration| registration.route.matches(request))
    }

    /// Dispatch a request and run the matching provider's pipeline.
    pub async fn authenticate(
        &self,
        request: &RouteRequest<'_>,
        authorization: &AuthorizationResult,
    ) -> AuthenticationOutcome {
        let Some(registration) = self.match_request(request) else {
            tracing::debug!(
                target: "gatehouse.registry",
                path = %request.path,
                "No provider matched; passing request through"
            );
            return AuthenticationOutcome::Passthrough;
        };

        tracing::debug!(
            target: "gatehouse.registry",
            provider = %registration.name(),
            path = %request.path,
            "Dispatched request to provider"
        );

        match registration.authenticator().authenticate(authorization).await {
            Ok(principal) => AuthenticationOutcome::Authenticated(principal),
            Err(failure) => {
                tracing::warn!(
                    target: "gatehouse.registry",
                    provider = %registration.name(),
                    cause = %failure.cause,
                    "Authentication rejected"
                );
                AuthenticationOutcome::Rejected(failure)
            }
        }
    }
}
