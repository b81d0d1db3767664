//! Axum integration for the provider registry.
//!
//! The middleware dispatches each request through the registry. Requests
//! no registration claims pass through untouched; intercepted requests
//! must carry a bearer ID token, which runs the matched provider's
//! pipeline. On success the [`Principal`] lands in request extensions for
//! downstream handlers; on failure the response is a 401 with a generic
//! JSON error body.
//!
//! ```rust,ignore
//! use axum::{middleware::from_fn_with_state, Router};
//! use gatehouse::middleware::{authenticate_request, AuthenticationState};
//!
//! let state = AuthenticationState::new(registry);
//! let app = Router::new()
//!     .route("/app", get(handler))
//!     .layer(from_fn_with_state(state, authenticate_request));
//! ```

use crate::errors::{AuthenticationFailure, FailureCause};
use crate::principal::Principal;
use crate::provider::AuthorizationResult;
use crate::registry::{AuthenticationOutcome, ProviderRegistry, RouteRequest};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthenticationState {
    /// The configured provider registry.
    pub registry: Arc<ProviderRegistry>,
}

impl AuthenticationState {
    /// Wrap a registry for use as middleware state.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }
}

/// Extract the bearer token from the Authorization header.
fn extract_bearer_token(req: &Request) -> Result<String, AuthenticationFailure> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "gatehouse.middleware", "Missing Authorization header");
            AuthenticationFailure::new(FailureCause::MissingCredentials)
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "gatehouse.middleware", "Invalid Authorization header format");
            AuthenticationFailure::new(FailureCause::MissingCredentials)
        })
}

/// Authentication middleware over the provider registry.
///
/// # Response
///
/// - Non-matching requests continue unauthenticated (passthrough)
/// - Matching requests without valid credentials get 401 Unauthorized
/// - Matching requests with a valid token continue with [`Principal`] in
///   request extensions
#[instrument(skip_all, name = "gatehouse.middleware")]
pub async fn authenticate_request(
    State(state): State<AuthenticationState>,
    mut req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_owned();
    let path = req.uri().path().to_owned();
    let route = RouteRequest::new(&method, &path);

    if state.registry.match_request(&route).is_none() {
        return next.run(req).await;
    }

    let token = match extract_bearer_token(&req) {
        Ok(token) => token,
        Err(failure) => return failure.into_response(),
    };

    let authorization = AuthorizationResult::bearer(token);
    match state.registry.authenticate(&route, &authorization).await {
        AuthenticationOutcome::Authenticated(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        AuthenticationOutcome::Rejected(failure) => failure.into_response(),
        // match_request already succeeded, but a second lookup inside
        // authenticate keeps this arm honest.
        AuthenticationOutcome::Passthrough => next.run(req).await,
    }
}

/// Extension trait for extracting the authenticated principal.
pub trait PrincipalExt {
    /// The authenticated principal, if the middleware ran for this
    /// request.
    fn principal(&self) -> Option<&Principal>;
}

impl PrincipalExt for Request {
    fn principal(&self) -> Option<&Principal> {
        self.extensions().get::<Principal>()
    }
}
