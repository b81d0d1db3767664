//! The ordered, composable claim-assertion engine.
//!
//! An [`AssertionChain`] evaluates named predicates against decoded token
//! claims, in order, stopping at the first violation. The baseline
//! assertions (issuer, audience, expiry, issued-at, nonce) always run
//! first in a fixed order; callers append provider-specific assertions
//! after them without affecting baseline behavior.
//!
//! Assertions are pure functions of the claims and an
//! [`AssertionContext`] carrying the per-attempt expectations (evaluation
//! instant, bound nonce), so every rule is deterministic under test.

use crate::claims::TokenClaims;
use crate::errors::ClaimViolation;
use std::fmt;
use std::time::Duration;

/// Maximum allowed clock-skew tolerance (10 minutes).
///
/// Prevents misconfiguration that would weaken expiry checking.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Per-attempt expectations an assertion may check against.
#[derive(Debug, Clone)]
pub struct AssertionContext {
    /// Evaluation instant as Unix epoch seconds.
    pub now: i64,

    /// Nonce bound to the original authorization request, if any.
    pub expected_nonce: Option<String>,
}

impl AssertionContext {
    /// Context at an explicit instant, with no bound nonce.
    #[must_use]
    pub fn at(now: i64) -> Self {
        Self {
            now,
            expected_nonce: None,
        }
    }

    /// Context at the current wall-clock instant.
    #[must_use]
    pub fn current() -> Self {
        Self::at(chrono::Utc::now().timestamp())
    }

    /// Bind the nonce expected in the token.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.expected_nonce = Some(nonce.into());
        self
    }
}

type AssertFn = dyn Fn(&TokenClaims, &AssertionContext) -> Result<(), String> + Send + Sync;

/// A named predicate over token claims.
///
/// Returns `Ok(())` on pass, or a human-readable violation reason.
pub struct ClaimAssertion {
    name: String,
    check: Box<AssertFn>,
}

impl ClaimAssertion {
    /// Build an assertion from a name and a predicate.
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&TokenClaims, &AssertionContext) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }

    /// The assertion's name, used in violation reports.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the assertion.
    ///
    /// # Errors
    ///
    /// Returns the violation reason when the predicate fails.
    pub fn check(
        &self,
        claims: &TokenClaims,
        context: &AssertionContext,
    ) -> Result<(), String> {
        (self.check)(claims, context)
    }

    /// Baseline: `iss` claim equals the configured issuer exactly.
    #[must_use]
    pub fn issuer(expected: impl Into<String>) -> Self {
        let expected = expected.into();
        Self::new("issuer", move |claims, _ctx| match claims.issuer() {
            Some(iss) if iss == expected => Ok(()),
            Some(iss) => Err(format!("issuer {iss} does not match configured issuer")),
            None => Err("token has no iss claim".to_string()),
        })
    }

    /// Baseline: `aud` claim contains the configured client id.
    #[must_use]
    pub fn audience(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self::new("audience", move |claims, _ctx| {
            let audiences = claims.audiences();
            if audiences.iter().any(|aud| *aud == client_id) {
                Ok(())
            } else if audiences.is_empty() {
                Err("token has no aud claim".to_string())
            } else {
                Err(format!("audience does not contain client id {client_id}"))
            }
        })
    }

    /// Baseline: the token is not expired.
    ///
    /// A token is expired iff `exp < now - skew`: `exp` equal to the
    /// evaluation instant is still valid under zero skew.
    #[must_use]
    pub fn expiry(clock_skew: Duration) -> Self {
        let skew = clamp_skew(clock_skew);
        Self::new("expiry", move |claims, ctx| {
            let exp = claims
                .expires_at()
                .ok_or_else(|| "token has no exp claim".to_string())?;
            if exp < ctx.now - skew {
                Err(format!("token expired at {exp}"))
            } else {
                Ok(())
            }
        })
    }

    /// Baseline: the token was not issued in the future.
    ///
    /// Rejects iff `iat - skew > now`.
    #[must_use]
    pub fn issued_at(clock_skew: Duration) -> Self {
        let skew = clamp_skew(clock_skew);
        Self::new("issued-at", move |claims, ctx| {
            let iat = claims
                .issued_at()
                .ok_or_else(|| "token has no iat claim".to_string())?;
            if iat - skew > ctx.now {
                Err(format!("token issued in the future at {iat}"))
            } else {
                Ok(())
            }
        })
    }

    /// Baseline: when a nonce was bound to the authorization request, the
    /// `nonce` claim must equal it. Passes when no nonce is bound.
    #[must_use]
    pub fn nonce() -> Self {
        Self::new("nonce", |claims, ctx| {
            let Some(expected) = ctx.expected_nonce.as_deref() else {
                return Ok(());
            };
            match claims.nonce() {
                Some(nonce) if nonce == expected => Ok(()),
                Some(_) => Err("nonce does not match the bound value".to_string()),
                None => Err("token has no nonce claim".to_string()),
            }
        })
    }
}

impl fmt::Debug for ClaimAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimAssertion")
            .field("name", &self.name)
            .finish()
    }
}

fn clamp_skew(clock_skew: Duration) -> i64 {
    // Safe cast: skew is capped to MAX_CLOCK_SKEW (600 seconds).
    #[allow(clippy::cast_possible_wrap)]
    let secs = clock_skew.min(MAX_CLOCK_SKEW).as_secs() as i64;
    secs
}

/// An ordered sequence of assertions with short-circuit evaluation.
#[derive(Debug)]
pub struct AssertionChain {
    assertions: Vec<ClaimAssertion>,
}

impl AssertionChain {
    /// Build the baseline chain for one provider configuration:
    /// issuer, audience, expiry, issued-at, nonce - in that order.
    #[must_use]
    pub fn baseline(issuer: &str, client_id: &str, clock_skew: Duration) -> Self {
        Self {
            assertions: vec![
                ClaimAssertion::issuer(issuer),
                ClaimAssertion::audience(client_id),
                ClaimAssertion::expiry(clock_skew),
                ClaimAssertion::issued_at(clock_skew),
                ClaimAssertion::nonce(),
            ],
        }
    }

    /// An empty chain, for callers composing every rule themselves.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            assertions: Vec::new(),
        }
    }

    /// Append an assertion after the existing ones.
    pub fn push(&mut self, assertion: ClaimAssertion) {
        self.assertions.push(assertion);
    }

    /// Append an assertion, builder-style.
    #[must_use]
    pub fn with(mut self, assertion: ClaimAssertion) -> Self {
        self.push(assertion);
        self
    }

    /// Number of assertions in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// Evaluate all assertions in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`ClaimViolation`], naming the failed assertion.
    pub fn evaluate(
        &self,
        claims: &TokenClaims,
        context: &AssertionContext,
    ) -> Result<(), ClaimViolation> {
        for assertion in &self.assertions {
            if let Err(reason) = assertion.check(claims, context) {
                tracing::debug!(
                    target: "gatehouse.assert",
                    assertion = %assertion.name(),
                    reason = %reason,
                    "Claim assertion failed"
                );
                return Err(ClaimViolation {
                    assertion: assertion.name().to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }
}
