//! Session manager
//!
//! Composes credential exchange and profile lookup into one authenticated
//! session. Both steps run under `SessionRecoveryManager`; neither retries
//! a rejection.

use crate::recovery::SessionRecoveryManager;
use crate::retry::RetryPolicy;
use medrelay_core::{
    ActorId, ActorProfile, IdentityProvider, MedRelayError, MedRelayResult, PhysicalClock,
    SessionToken,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a successful sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub user_id: ActorId,
    pub token: SessionToken,
    /// Profile of the signed-in user; every decision is attributed to it
    pub actor: ActorProfile,
}

/// Signs users in and out against an `IdentityProvider`
pub struct SessionManager<P, C> {
    provider: Arc<P>,
    recovery: SessionRecoveryManager<C>,
}

impl<P, C> SessionManager<P, C>
where
    P: IdentityProvider,
    C: PhysicalClock,
{
    pub fn new(provider: Arc<P>, clock: Arc<C>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            recovery: SessionRecoveryManager::new(policy, clock),
        }
    }

    pub fn recovery(&self) -> &SessionRecoveryManager<C> {
        &self.recovery
    }

    /// Exchange credentials for a session and resolve the user's profile.
    ///
    /// A user without a profile cannot act and is rejected; the half-open
    /// session is signed out best-effort.
    pub async fn sign_in(&self, email: &str, password: &str) -> MedRelayResult<AuthenticatedSession> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(MedRelayError::validation("a valid email address is required"));
        }
        if password.is_empty() {
            return Err(MedRelayError::validation("password is required"));
        }

        let grant = self
            .recovery
            .with_retry(|| self.provider.sign_in(email, password))
            .await?;

        let profile = self
            .recovery
            .with_retry(|| self.provider.fetch_profile(&grant.user_id, &grant.session_token))
            .await;
        let actor = match profile {
            Ok(actor) => actor,
            Err(error) => {
                if let Err(sign_out) = self.provider.sign_out(&grant.session_token).await {
                    warn!(user_id = %grant.user_id, error = %sign_out, "failed to close session");
                }
                // a missing profile converts to `AuthRejected`
                return Err(error.into());
            }
        };

        info!(user_id = %grant.user_id, role = %actor.role, "signed in");
        Ok(AuthenticatedSession {
            user_id: grant.user_id,
            token: grant.session_token,
            actor,
        })
    }

    /// End a session. Not retried: an expired token is already signed out.
    pub async fn sign_out(&self, session: &AuthenticatedSession) -> MedRelayResult<()> {
        self.provider.sign_out(&session.token).await?;
        info!(user_id = %session.user_id, "signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use medrelay_core::AuthError;
    use medrelay_testkit::{fixed_time, nurse, signer, ManualClock, ScriptedIdentity};
    use std::time::Duration;

    fn manager(identity: &ScriptedIdentity) -> (SessionManager<ScriptedIdentity, ManualClock>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(fixed_time(0)));
        let manager = SessionManager::new(
            Arc::new(identity.clone()),
            Arc::clone(&clock),
            RetryPolicy::default(),
        );
        (manager, clock)
    }

    #[tokio::test]
    async fn sign_in_resolves_the_actor() {
        let identity = ScriptedIdentity::new().with_account("morgan@example.org", "pw", signer());
        let (manager, _) = manager(&identity);

        let session = manager.sign_in("morgan@example.org", "pw").await.unwrap();

        assert_eq!(session.user_id, signer().id);
        assert_eq!(session.actor, signer());
        assert_eq!(identity.sign_in_calls(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_within_budget() {
        let identity = ScriptedIdentity::new().with_account("rn@example.org", "pw", nurse());
        identity.fail_sign_in(AuthError::transient("503 Service Unavailable"));
        identity.fail_sign_in(AuthError::transient("connection reset"));
        let (manager, clock) = manager(&identity);

        let session = manager.sign_in("rn@example.org", "pw").await.unwrap();

        assert_eq!(session.actor, nurse());
        assert_eq!(identity.sign_in_calls(), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 2]);
    }

    #[tokio::test]
    async fn wrong_password_is_not_retried() {
        let identity = ScriptedIdentity::new().with_account("rn@example.org", "pw", nurse());
        let (manager, clock) = manager(&identity);

        let err = manager.sign_in("rn@example.org", "nope").await.unwrap_err();

        assert_matches!(err, MedRelayError::AuthRejected { .. });
        assert_eq!(identity.sign_in_calls(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn missing_profile_is_rejected_and_signed_out() {
        let identity = ScriptedIdentity::new().with_orphan_account(
            "ghost@example.org",
            "pw",
            ActorId::new("ghost"),
        );
        let (manager, _) = manager(&identity);

        let err = manager.sign_in("ghost@example.org", "pw").await.unwrap_err();

        assert_matches!(err, MedRelayError::AuthRejected { .. });
        assert_eq!(identity.profile_calls(), 1);
        assert_eq!(identity.sign_outs(), 1);
    }

    #[tokio::test]
    async fn malformed_input_never_reaches_the_provider() {
        let identity = ScriptedIdentity::new();
        let (manager, _) = manager(&identity);

        assert_matches!(
            manager.sign_in("not-an-email", "pw").await,
            Err(MedRelayError::Validation { .. })
        );
        assert_matches!(
            manager.sign_in("a@b.org", "").await,
            Err(MedRelayError::Validation { .. })
        );
        assert_eq!(identity.sign_in_calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_transient() {
        let identity = ScriptedIdentity::new().with_account("rn@example.org", "pw", nurse());
        for _ in 0..3 {
            identity.fail_sign_in(AuthError::transient("timeout"));
        }
        let (manager, _) = manager(&identity);

        let err = manager.sign_in("rn@example.org", "pw").await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(identity.sign_in_calls(), 3);
    }
}
