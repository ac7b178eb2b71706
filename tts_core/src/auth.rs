//! Shared-secret gate in front of the synthesis pipeline.

use sha2::{Digest, Sha256};

/// Result of checking a presented credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Denied,
}

/// How requests are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Every request is allowed; no credential is looked at.
    Disabled,
    /// The presented credential must equal `secret`. With no secret configured
    /// every request is denied.
    Required { secret: Option<String> },
}

impl AuthPolicy {
    /// Build the policy from the `auth_required` switch and the configured key.
    /// An empty key counts as no key.
    pub fn from_config(auth_required: bool, secret: Option<String>) -> Self {
        if !auth_required {
            return AuthPolicy::Disabled;
        }
        AuthPolicy::Required {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }
}

impl std::fmt::Debug for AuthPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthPolicy::Disabled => f.write_str("Disabled"),
            AuthPolicy::Required { secret } => f
                .debug_struct("Required")
                .field("secret", &secret.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    policy: AuthPolicy,
}

impl AuthGate {
    pub fn new(policy: AuthPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    pub fn authorize(&self, presented: Option<&str>) -> AuthDecision {
        let expected = match &self.policy {
            AuthPolicy::Disabled => return AuthDecision::Allowed,
            AuthPolicy::Required { secret: None } => return AuthDecision::Denied,
            AuthPolicy::Required { secret: Some(secret) } => secret,
        };
        match presented {
            Some(p) if !p.is_empty() && digests_equal(p, expected) => AuthDecision::Allowed,
            _ => AuthDecision::Denied,
        }
    }
}

// Comparing fixed-size digests keeps the time independent of where (or
// whether) the strings differ, including their lengths.
fn digests_equal(a: &str, b: &str) -> bool {
    let da = Sha256::digest(a.as_bytes());
    let db = Sha256::digest(b.as_bytes());
    da.iter().zip(db.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
