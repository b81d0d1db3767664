//! # Gatehouse Test Utilities
//!
//! Shared test utilities for the Gatehouse crates.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (seeded Ed25519 keypairs)
//! - ID-token builders (signed and deliberately-forged tokens)
//! - A wiremock-backed JWKS server harness with fetch counting
//! - Fixed test identifiers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gatehouse_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::new(1, TEST_KEY_ID);
//!     let server = JwksServer::start().await;
//!     server.serve_keys(keypair.jwks_document()).await;
//!
//!     let token = IdTokenBuilder::new().subject("alice").sign(&keypair);
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use test_ids::*;
pub use token_builders::*;
