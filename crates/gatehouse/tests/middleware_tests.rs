//! Axum middleware integration tests.
//!
//! Exercises dispatch through a router: passthrough for unclaimed routes,
//! 401 with a structured body on failure, and the principal landing in
//! request extensions on success.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::body::Body;
use axum::extract::Extension;
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use gatehouse::middleware::{authenticate_request, AuthenticationState};
use gatehouse::principal::Principal;
use gatehouse::registry::{ProviderRegistry, RegistrationBuilder, RoutePredicate};
use gatehouse::IdentityProviderConfig;
use gatehouse_test_utils::{
    IdTokenBuilder, TestKeypair, TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_ISSUER, TEST_KEY_ID,
    TEST_REDIRECT_URL, TEST_SUBJECT,
};
use secrecy::SecretString;
use tower::ServiceExt;

async fn whoami(Extension(principal): Extension<Principal>) -> String {
    principal.id
}

async fn public_handler() -> &'static str {
    "public"
}

fn test_app(keypair: &TestKeypair) -> Router {
    let registration = RegistrationBuilder::new()
        .provider(IdentityProviderConfig::for_issuer(TEST_ISSUER))
        .client_credentials(TEST_CLIENT_ID, SecretString::from(TEST_CLIENT_SECRET))
        .redirect_url(TEST_REDIRECT_URL)
        .route(RoutePredicate::path("/app/**"))
        .jwks_keys(keypair.key_set())
        .build()
        .expect("registration should build");

    let registry = std::sync::Arc::new(ProviderRegistry::new().with(registration));
    let state = AuthenticationState::new(registry);

    Router::new()
        .route("/app/whoami", get(whoami))
        .route("/public", get(public_handler))
        .layer(from_fn_with_state(state, authenticate_request))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unclaimed_route_passes_through_without_credentials() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let app = test_app(&keypair);

    let response = app
        .oneshot(Request::get("/public").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_route_requires_credentials() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let app = test_app(&keypair);

    let response = app
        .oneshot(Request::get("/app/whoami").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "AUTHENTICATION_FAILED");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn protected_route_rejects_non_bearer_scheme() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let app = test_app(&keypair);

    let response = app
        .oneshot(
            Request::get("/app/whoami")
                .header("authorization", "Basic dXNlcjpwYXNz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_reaches_handler_with_principal() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let app = test_app(&keypair);

    let token = IdTokenBuilder::new().sign(&keypair);
    let response = app
        .oneshot(
            Request::get("/app/whoami")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), TEST_SUBJECT.as_bytes());
}

#[tokio::test]
async fn rejected_token_never_reaches_handler() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let app = test_app(&keypair);

    let token = IdTokenBuilder::new()
        .audience(&["other-app"])
        .sign(&keypair);
    let response = app
        .oneshot(
            Request::get("/app/whoami")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The body stays generic: no claim-violation detail leaks.
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Authentication failed");
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let app = test_app(&keypair);

    let response = app
        .oneshot(
            Request::get("/app/whoami")
                .header("authorization", "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
