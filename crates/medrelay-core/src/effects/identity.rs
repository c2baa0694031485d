//! Identity and session interface

use crate::actor::ActorProfile;
use crate::identifiers::ActorId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error type for identity operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AuthError {
    /// Network hiccup, timeout, rate limit or server-side failure
    #[error("Authentication temporarily unavailable: {reason}")]
    Transient { reason: String },
    /// Invalid credentials or an explicit refusal
    #[error("Authentication rejected: {reason}")]
    Rejected { reason: String },
    /// Credentials accepted but no profile exists for the user
    #[error("User profile not found: {user_id}")]
    ProfileMissing { user_id: ActorId },
}

impl AuthError {
    /// Shorthand for `Transient`
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    /// Shorthand for `Rejected`
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Only transient failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Opaque bearer token returned by sign-in
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Expose the raw token for an outgoing request
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Successful credential exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInGrant {
    pub user_id: ActorId,
    pub session_token: SessionToken,
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for a session
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInGrant, AuthError>;

    /// Resolve the profile of an authenticated user
    async fn fetch_profile(
        &self,
        user_id: &ActorId,
        token: &SessionToken,
    ) -> Result<ActorProfile, AuthError>;

    /// Invalidate a session. Providers without server-side sessions may no-op.
    async fn sign_out(&self, token: &SessionToken) -> Result<(), AuthError>;
}
