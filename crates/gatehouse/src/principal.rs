//! The authenticated principal and user-mapping strategies.

use crate::claims::TokenClaims;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default authority granted by [`SubjectMapper`].
pub const ROLE_USER: &str = "ROLE_USER";

/// The authenticated identity handed to the rest of the request pipeline.
///
/// Created per successful authentication and owned by the request's
/// authentication context; never shared across requests.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    /// Stable user identifier, normally mapped from the `sub` claim.
    pub id: String,

    /// Granted authorities/roles.
    pub authorities: Vec<String>,
}

impl Principal {
    /// Build a principal.
    #[must_use]
    pub fn new(id: impl Into<String>, authorities: Vec<String>) -> Self {
        Self {
            id: id.into(),
            authorities,
        }
    }

    /// Whether the principal holds a given authority.
    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &"[REDACTED]")
            .field("authorities", &self.authorities)
            .finish()
    }
}

/// Strategy for turning a verified claim set into a [`Principal`].
///
/// Hosts supply their own implementation to look up application users,
/// derive roles from custom claims, and so on.
pub trait MapClaimsToPrincipal: Send + Sync {
    /// Map verified claims to a principal.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when no principal can be built
    /// (e.g. a required claim is missing).
    fn map(&self, claims: &TokenClaims) -> Result<Principal, String>;
}

/// Default mapping: `sub` claim becomes the user id, with the single
/// [`ROLE_USER`] authority.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectMapper;

impl MapClaimsToPrincipal for SubjectMapper {
    fn map(&self, claims: &TokenClaims) -> Result<Principal, String> {
        let sub = claims
            .subject()
            .ok_or_else(|| "token has no sub claim".to_string())?;
        Ok(Principal::new(sub, vec![ROLE_USER.to_string()]))
    }
}
