//! Fixed test identifiers for deterministic tests.
//!
//! Using fixed values keeps test tokens and registrations reproducible
//! across runs.

/// Issuer used by the test identity provider.
pub const TEST_ISSUER: &str = "https://idp.example";

/// Issuer for a second provider in multi-provider tests.
pub const TEST_ISSUER_2: &str = "https://other-idp.example";

/// Client id this relying party registers with the test provider.
pub const TEST_CLIENT_ID: &str = "app1";

/// Client id for the second provider.
pub const TEST_CLIENT_ID_2: &str = "app2";

/// Client secret for test registrations.
pub const TEST_CLIENT_SECRET: &str = "test-secret-do-not-use-in-production";

/// Redirect URL registered with the test provider.
pub const TEST_REDIRECT_URL: &str = "https://rp.example/login/callback";

/// Subject of the default test token.
pub const TEST_SUBJECT: &str = "user-42";

/// Signing key ids.
pub const TEST_KEY_ID: &str = "test-key-2025-01";
pub const TEST_KEY_ID_2: &str = "test-key-2025-02";
