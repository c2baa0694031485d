//! Scripted identity provider

#![allow(clippy::disallowed_types)]

use async_trait::async_trait;
use medrelay_core::{
    ActorId, ActorProfile, AuthError, IdentityProvider, SessionToken, SignInGrant,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct IdentityState {
    /// email -> (password, user)
    accounts: HashMap<String, (String, ActorId)>,
    profiles: HashMap<ActorId, ActorProfile>,
    sign_in_queue: VecDeque<AuthError>,
    profile_queue: VecDeque<AuthError>,
    sign_in_calls: usize,
    profile_calls: usize,
    sign_outs: usize,
}

/// In-memory identity provider with injectable failures
///
/// Queued errors are returned before the account table is consulted, so
/// `fail_sign_in(AuthError::transient(..))` twice followed by a real account
/// models "fails twice, then succeeds".
#[derive(Debug, Clone, Default)]
pub struct ScriptedIdentity {
    state: Arc<Mutex<IdentityState>>,
}

impl ScriptedIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and its profile
    pub fn with_account(self, email: &str, password: &str, profile: ActorProfile) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .accounts
                .insert(email.to_string(), (password.to_string(), profile.id.clone()));
            state.profiles.insert(profile.id.clone(), profile);
        }
        self
    }

    /// Register an account whose profile row is missing
    pub fn with_orphan_account(self, email: &str, password: &str, user: ActorId) -> Self {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(email.to_string(), (password.to_string(), user));
        self
    }

    /// Queue a failure for the next sign-in attempt
    pub fn fail_sign_in(&self, error: AuthError) {
        self.state.lock().unwrap().sign_in_queue.push_back(error);
    }

    /// Queue a failure for the next profile lookup
    pub fn fail_profile(&self, error: AuthError) {
        self.state.lock().unwrap().profile_queue.push_back(error);
    }

    pub fn sign_in_calls(&self) -> usize {
        self.state.lock().unwrap().sign_in_calls
    }

    pub fn profile_calls(&self) -> usize {
        self.state.lock().unwrap().profile_calls
    }

    pub fn sign_outs(&self) -> usize {
        self.state.lock().unwrap().sign_outs
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInGrant, AuthError> {
        let mut state = self.state.lock().unwrap();
        state.sign_in_calls += 1;
        if let Some(error) = state.sign_in_queue.pop_front() {
            return Err(error);
        }
        match state.accounts.get(email) {
            Some((expected, user)) if expected == password => Ok(SignInGrant {
                user_id: user.clone(),
                session_token: SessionToken::new(format!("token-{user}-{}", state.sign_in_calls)),
            }),
            _ => Err(AuthError::rejected("Invalid login credentials")),
        }
    }

    async fn fetch_profile(
        &self,
        user_id: &ActorId,
        _token: &SessionToken,
    ) -> Result<ActorProfile, AuthError> {
        let mut state = self.state.lock().unwrap();
        state.profile_calls += 1;
        if let Some(error) = state.profile_queue.pop_front() {
            return Err(error);
        }
        state
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| AuthError::ProfileMissing {
                user_id: user_id.clone(),
            })
    }

    async fn sign_out(&self, _token: &SessionToken) -> Result<(), AuthError> {
        self.state.lock().unwrap().sign_outs += 1;
        Ok(())
    }
}
