//! End-to-end authentication tests against a static key set.
//!
//! These cover the full verify / assert / map pipeline for one provider
//! without any network: the registration uses a pre-fetched key set.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use gatehouse::claims::TokenClaims;
use gatehouse::errors::{FailureCause, VerifyError};
use gatehouse::principal::{MapClaimsToPrincipal, Principal, ROLE_USER};
use gatehouse::provider::AuthorizationResult;
use gatehouse::registry::{
    AuthenticationOutcome, IdentityProviderRegistration, ProviderRegistry, RegistrationBuilder,
    RoutePredicate, RouteRequest,
};
use gatehouse::{ClientConfig, IdentityProviderConfig};
use gatehouse_test_utils::{
    forge_token, IdTokenBuilder, TestKeypair, TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_ISSUER,
    TEST_KEY_ID, TEST_REDIRECT_URL, TEST_SUBJECT,
};
use secrecy::SecretString;
use serde_json::json;
use std::sync::Arc;

/// Route tracing output through the test harness when RUST_LOG is set.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn test_registration(keypair: &TestKeypair) -> IdentityProviderRegistration {
    init_tracing();
    RegistrationBuilder::new()
        .provider(IdentityProviderConfig::for_issuer(TEST_ISSUER))
        .client_credentials(TEST_CLIENT_ID, SecretString::from(TEST_CLIENT_SECRET))
        .redirect_url(TEST_REDIRECT_URL)
        .jwks_keys(keypair.key_set())
        .build()
        .expect("registration should build")
}

#[tokio::test]
async fn valid_token_yields_principal_with_subject_id() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = test_registration(&keypair);

    let token = IdTokenBuilder::new().sign(&keypair);
    let principal = registration
        .authenticator()
        .authenticate(&AuthorizationResult::bearer(token))
        .await
        .expect("authentication should succeed");

    assert_eq!(principal.id, TEST_SUBJECT);
    assert_eq!(principal.authorities, vec![ROLE_USER.to_string()]);
}

#[tokio::test]
async fn audience_mismatch_is_an_audience_violation() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = test_registration(&keypair);

    let token = IdTokenBuilder::new().audience(&["other-app"]).sign(&keypair);
    let failure = registration
        .authenticator()
        .authenticate(&AuthorizationResult::bearer(token))
        .await
        .unwrap_err();

    assert!(matches!(
        failure.cause,
        FailureCause::Claims(ref violation) if violation.assertion == "audience"
    ));
}

#[tokio::test]
async fn issuer_mismatch_is_an_issuer_violation_despite_valid_signature() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = test_registration(&keypair);

    // The signature is genuine; only the issuer is wrong.
    let token = IdTokenBuilder::new()
        .issuer("https://evil.example")
        .sign(&keypair);
    let failure = registration
        .authenticator()
        .authenticate(&AuthorizationResult::bearer(token))
        .await
        .unwrap_err();

    assert!(matches!(
        failure.cause,
        FailureCause::Claims(ref violation) if violation.assertion == "issuer"
    ));
}

#[tokio::test]
async fn expired_token_is_an_expiry_violation() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = test_registration(&keypair);

    let token = IdTokenBuilder::new()
        .expires_in(-3600)
        .issued_at(chrono::Utc::now().timestamp() - 7200)
        .sign(&keypair);
    let failure = registration
        .authenticator()
        .authenticate(&AuthorizationResult::bearer(token))
        .await
        .unwrap_err();

    assert!(matches!(
        failure.cause,
        FailureCause::Claims(ref violation) if violation.assertion == "expiry"
    ));
}

#[tokio::test]
async fn sign_then_verify_round_trips_the_claim_set() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = test_registration(&keypair);

    let builder = IdTokenBuilder::new()
        .claim("acr", json!("urn:mace:incommon:iap:silver"))
        .claim("email", json!("user-42@rp.example"));
    let expected: TokenClaims = serde_json::from_value(builder.build_claims()).unwrap();

    let token = builder.sign(&keypair);
    let verified = registration
        .authenticator()
        .verifier()
        .verify(&token)
        .await
        .expect("verification should succeed");

    assert_eq!(verified, expected);
}

#[tokio::test]
async fn unsupported_algorithm_rejected_before_any_key_lookup() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = test_registration(&keypair);
    let verifier = registration.authenticator().verifier();

    let claims = IdTokenBuilder::new().build_claims();
    for alg in ["none", "HS256"] {
        let token = forge_token(
            &json!({"alg": alg, "typ": "JWT", "kid": TEST_KEY_ID}),
            &claims,
            "Zm9yZ2Vk",
        );

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(
            matches!(err, VerifyError::UnsupportedAlgorithm(_)),
            "alg {alg}: {err:?}"
        );
    }

    // Key lookup must be observably skipped for both rejections.
    assert_eq!(verifier.key_provider().resolve_calls(), 0);
}

#[tokio::test]
async fn tampered_payload_is_a_signature_failure() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = test_registration(&keypair);

    let token = IdTokenBuilder::new().sign(&keypair);
    let mut segments = token.split('.');
    let header = segments.next().unwrap();
    let _original_payload = segments.next().unwrap();
    let signature = segments.next().unwrap();

    let inflated = forge_token(
        &json!({"alg": "EdDSA", "typ": "JWT", "kid": TEST_KEY_ID}),
        &IdTokenBuilder::new().subject("admin").build_claims(),
        "",
    );
    let swapped_payload = inflated.split('.').nth(1).unwrap().to_string();
    let tampered = format!("{header}.{swapped_payload}.{signature}");

    let failure = registration
        .authenticator()
        .authenticate(&AuthorizationResult::bearer(tampered))
        .await
        .unwrap_err();

    assert!(matches!(
        failure.cause,
        FailureCause::Verification(VerifyError::SignatureInvalid)
    ));
}

#[tokio::test]
async fn bound_nonce_must_match_the_token() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = test_registration(&keypair);
    let nonce = uuid::Uuid::new_v4().to_string();

    let token = IdTokenBuilder::new().nonce(&nonce).sign(&keypair);

    // Matching bound nonce authenticates.
    let principal = registration
        .authenticator()
        .authenticate(&AuthorizationResult::bearer(token.clone()).with_nonce(nonce))
        .await
        .expect("matching nonce should authenticate");
    assert_eq!(principal.id, TEST_SUBJECT);

    // A different bound nonce is a nonce violation.
    let failure = registration
        .authenticator()
        .authenticate(&AuthorizationResult::bearer(token).with_nonce("different"))
        .await
        .unwrap_err();
    assert!(matches!(
        failure.cause,
        FailureCause::Claims(ref violation) if violation.assertion == "nonce"
    ));
}

#[tokio::test]
async fn custom_assertion_runs_after_baseline() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = RegistrationBuilder::new()
        .provider(IdentityProviderConfig::for_issuer(TEST_ISSUER))
        .client_credentials(TEST_CLIENT_ID, SecretString::from(TEST_CLIENT_SECRET))
        .redirect_url(TEST_REDIRECT_URL)
        .jwks_keys(keypair.key_set())
        .assert_claims(gatehouse::ClaimAssertion::new("email-domain", |claims, _ctx| {
            match claims.get("email").and_then(serde_json::Value::as_str) {
                Some(email) if email.ends_with("@rp.example") => Ok(()),
                _ => Err("email is not in the rp.example domain".to_string()),
            }
        }))
        .build()
        .unwrap();

    let token = IdTokenBuilder::new()
        .claim("email", json!("user-42@elsewhere.example"))
        .sign(&keypair);
    let failure = registration
        .authenticator()
        .authenticate(&AuthorizationResult::bearer(token))
        .await
        .unwrap_err();
    assert!(matches!(
        failure.cause,
        FailureCause::Claims(ref violation) if violation.assertion == "email-domain"
    ));

    let token = IdTokenBuilder::new()
        .claim("email", json!("user-42@rp.example"))
        .sign(&keypair);
    assert!(registration
        .authenticator()
        .authenticate(&AuthorizationResult::bearer(token))
        .await
        .is_ok());
}

#[tokio::test]
async fn host_supplied_mapper_overrides_subject_mapping() {
    struct RoleClaimMapper;
    impl MapClaimsToPrincipal for RoleClaimMapper {
        fn map(&self, claims: &TokenClaims) -> Result<Principal, String> {
            let sub = claims.subject().ok_or("token has no sub claim")?;
            let roles = claims
                .get("roles")
                .and_then(serde_json::Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(serde_json::Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Ok(Principal::new(sub, roles))
        }
    }

    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = RegistrationBuilder::new()
        .provider(IdentityProviderConfig::for_issuer(TEST_ISSUER))
        .client_credentials(TEST_CLIENT_ID, SecretString::from(TEST_CLIENT_SECRET))
        .redirect_url(TEST_REDIRECT_URL)
        .jwks_keys(keypair.key_set())
        .map_claims(Arc::new(RoleClaimMapper))
        .build()
        .unwrap();

    let token = IdTokenBuilder::new()
        .claim("roles", json!(["ROLE_USER", "ROLE_ADMIN"]))
        .sign(&keypair);
    let principal = registration
        .authenticator()
        .authenticate(&AuthorizationResult::bearer(token))
        .await
        .unwrap();

    assert!(principal.has_authority("ROLE_ADMIN"));
}

#[tokio::test]
async fn two_providers_with_distinct_keys_and_policies() {
    let keypair_a = TestKeypair::new(1, TEST_KEY_ID);
    let keypair_b = TestKeypair::new(2, "other-key-01");

    let registry = ProviderRegistry::new()
        .with(
            RegistrationBuilder::new()
                .name("primary")
                .provider(IdentityProviderConfig::for_issuer(TEST_ISSUER))
                .client_credentials(TEST_CLIENT_ID, SecretString::from(TEST_CLIENT_SECRET))
                .redirect_url(TEST_REDIRECT_URL)
                .route(RoutePredicate::path("/login/primary/**"))
                .jwks_keys(keypair_a.key_set())
                .build()
                .unwrap(),
        )
        .with(
            RegistrationBuilder::new()
                .name("secondary")
                .provider(IdentityProviderConfig::for_issuer("https://other-idp.example"))
                .client_credentials("app2", SecretString::from(TEST_CLIENT_SECRET))
                .redirect_url(TEST_REDIRECT_URL)
                .route(RoutePredicate::path("/login/secondary/**"))
                .jwks_keys(keypair_b.key_set())
                .build()
                .unwrap(),
        );

    // A token for the secondary provider authenticates on its route...
    let token_b = IdTokenBuilder::new()
        .issuer("https://other-idp.example")
        .audience(&["app2"])
        .sign_with_kid(&keypair_b, "other-key-01");
    let outcome = registry
        .authenticate(
            &RouteRequest::new("GET", "/login/secondary/callback"),
            &AuthorizationResult::bearer(token_b.clone()),
        )
        .await;
    assert!(matches!(outcome, AuthenticationOutcome::Authenticated(_)));

    // ...but is rejected on the primary provider's route, whose keys and
    // claim policy are different.
    let outcome = registry
        .authenticate(
            &RouteRequest::new("GET", "/login/primary/callback"),
            &AuthorizationResult::bearer(token_b),
        )
        .await;
    assert!(matches!(outcome, AuthenticationOutcome::Rejected(_)));
}

#[test]
fn client_config_holds_registration_values() {
    let keypair = TestKeypair::new(1, TEST_KEY_ID);
    let registration = test_registration(&keypair);

    let client: &ClientConfig = registration.client();
    assert_eq!(client.client_id, TEST_CLIENT_ID);
    assert_eq!(client.redirect_url, TEST_REDIRECT_URL);
}
