//! A wiremock-backed JWKS server harness.
//!
//! Serves JWKS documents at the conventional `/.well-known/jwks.json`
//! path and counts how many fetches the code under test made, so tests
//! can assert singleflight behavior and observable lookup skips.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the harness serves JWKS documents at.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A mock identity-provider JWKS endpoint.
pub struct JwksServer {
    server: MockServer,
}

impl JwksServer {
    /// Start the server with nothing mounted.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// The full JWKS endpoint URL.
    #[must_use]
    pub fn jwks_url(&self) -> String {
        format!("{}{JWKS_PATH}", self.server.uri())
    }

    /// The underlying mock server, for custom mounts.
    #[must_use]
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serve a JWKS document on every fetch.
    pub async fn serve_keys(&self, document: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&self.server)
            .await;
    }

    /// Serve an error status on every fetch.
    pub async fn serve_error(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Serve a body that is not a JWKS document.
    pub async fn serve_malformed(&self) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .mount(&self.server)
            .await;
    }

    /// Replace all mounts, e.g. to simulate key rotation.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Number of JWKS fetches the server has received.
    ///
    /// # Panics
    ///
    /// Panics if request recording is disabled (test-only code).
    pub async fn received_fetches(&self) -> usize {
        self.server
            .received_requests()
            .await
            .expect("request recording should be enabled")
            .iter()
            .filter(|req| req.url.path() == JWKS_PATH)
            .count()
    }
}
