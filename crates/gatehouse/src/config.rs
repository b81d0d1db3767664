//! Provider and client configuration.
//!
//! Both structs are immutable provider metadata: loaded once at startup
//! and shared read-only by every request routed to that provider. The
//! client secret is held as a [`SecretString`] and redacted in Debug
//! output.

use secrecy::SecretString;
use std::fmt;

/// One identity provider's published metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProviderConfig {
    /// Issuer URL, matched exactly against the `iss` claim.
    pub issuer: String,

    /// JWKS endpoint URL.
    pub jwks_url: String,

    /// Authorization endpoint, consumed by the external OAuth2 client.
    pub authorization_endpoint: String,

    /// Token endpoint, consumed by the external OAuth2 client.
    pub token_endpoint: String,
}

impl IdentityProviderConfig {
    /// Provider metadata following the conventional OIDC endpoint layout
    /// under the issuer URL.
    #[must_use]
    pub fn for_issuer(issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let base = issuer.trim_end_matches('/');
        Self {
            jwks_url: format!("{base}/.well-known/jwks.json"),
            authorization_endpoint: format!("{base}/authorize"),
            token_endpoint: format!("{base}/token"),
            issuer,
        }
    }

    /// Override the JWKS endpoint URL.
    #[must_use]
    pub fn with_jwks_url(mut self, jwks_url: impl Into<String>) -> Self {
        self.jwks_url = jwks_url.into();
        self
    }

    /// Override the authorization endpoint.
    #[must_use]
    pub fn with_authorization_endpoint(mut self, url: impl Into<String>) -> Self {
        self.authorization_endpoint = url.into();
        self
    }

    /// Override the token endpoint.
    #[must_use]
    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = url.into();
        self
    }
}

/// This relying party's registration with one provider.
#[derive(Clone)]
pub struct ClientConfig {
    /// OAuth client id; must appear in the token's `aud` claim.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// Redirect URL registered with the provider.
    pub redirect_url: String,

    /// Scopes requested during authorization.
    pub scopes: Vec<String>,
}

impl ClientConfig {
    /// Build a client registration with no extra scopes.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_url: redirect_url.into(),
            scopes: Vec::new(),
        }
    }

    /// Add requested scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}
