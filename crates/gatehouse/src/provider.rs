//! The per-provider authentication pipeline.
//!
//! An [`AuthenticationProvider`] orchestrates signature verification and
//! claim assertion for one identity-provider configuration, then maps the
//! verified claim set to a [`Principal`] through the configured
//! user-mapping strategy.
//!
//! Every failure below this layer arrives as a typed result; this is the
//! boundary that wraps them into [`AuthenticationFailure`], preserving
//! the cause for logging while presenting a generic message externally.

use crate::assertions::{AssertionChain, AssertionContext};
use crate::errors::{AuthenticationFailure, FailureCause};
use crate::principal::{MapClaimsToPrincipal, Principal};
use crate::verify::SignatureVerifier;
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// The outcome of the external OAuth2 authorization-code exchange.
///
/// Produced by the host's OAuth2 client; this crate only consumes it.
#[derive(Clone)]
pub struct AuthorizationResult {
    /// The compact-encoded ID token.
    pub id_token: String,

    /// Access token from the exchange, if any.
    pub access_token: Option<SecretString>,

    /// Nonce bound to the original authorization request, if any.
    pub nonce: Option<String>,
}

impl AuthorizationResult {
    /// An authorization result carrying only an ID token, as presented by
    /// a bearer request.
    #[must_use]
    pub fn bearer(id_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
            access_token: None,
            nonce: None,
        }
    }

    /// Attach the access token from the exchange.
    #[must_use]
    pub fn with_access_token(mut self, access_token: SecretString) -> Self {
        self.access_token = Some(access_token);
        self
    }

    /// Attach the nonce bound to the authorization request.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}

impl fmt::Debug for AuthorizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationResult")
            .field("id_token", &"[REDACTED]")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("nonce", &self.nonce)
            .finish()
    }
}

/// Verify / assert / map pipeline for one identity provider.
pub struct AuthenticationProvider {
    verifier: SignatureVerifier,
    assertions: AssertionChain,
    mapper: Arc<dyn MapClaimsToPrincipal>,
}

impl AuthenticationProvider {
    /// Build a provider from its three collaborators.
    #[must_use]
    pub fn new(
        verifier: SignatureVerifier,
        assertions: AssertionChain,
        mapper: Arc<dyn MapClaimsToPrincipal>,
    ) -> Self {
        Self {
            verifier,
            assertions,
            mapper,
        }
    }

    /// The signature verifier driving this provider.
    #[must_use]
    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// Authenticate an authorization result.
    ///
    /// Steps run strictly in sequence: signature verification, claim
    /// assertion, user mapping. No side effects beyond the returned
    /// result; session persistence is the caller's concern.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationFailure`] wrapping the verification,
    /// claim, or mapping cause.
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        authorization: &AuthorizationResult,
    ) -> Result<Principal, AuthenticationFailure> {
        let claims = self
            .verifier
            .verify(&authorization.id_token)
            .await
            .map_err(|e| {
                tracing::debug!(target: "gatehouse.provider", cause = %e, "Token verification failed");
                AuthenticationFailure::new(e)
            })?;

        let mut context = AssertionContext::current();
        if let Some(nonce) = &authorization.nonce {
            context = context.with_nonce(nonce.clone());
        }

        self.assertions.evaluate(&claims, &context).map_err(|e| {
            tracing::debug!(target: "gatehouse.provider", cause = %e, "Claim assertion failed");
            AuthenticationFailure::new(e)
        })?;

        let principal = self.mapper.map(&claims).map_err(|reason| {
            tracing::debug!(target: "gatehouse.provider", reason = %reason, "User mapping failed");
            AuthenticationFailure::new(FailureCause::Mapping(reason))
        })?;

        tracing::debug!(target: "gatehouse.provider", "Authentication succeeded");
        Ok(principal)
    }
}

impl fmt::Debug for AuthenticationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationProvider")
            .field("verifier", &self.verifier)
            .field("assertions", &self.assertions)
            .finish()
    }
}
