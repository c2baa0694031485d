//! HTTP identity provider
//!
//! Talks to a hosted auth backend exposing a password grant endpoint and a
//! `profiles` table over a REST gateway. Every request carries the public
//! API key; profile reads also carry the user's bearer token.

use async_trait::async_trait;
use medrelay_core::{
    ActorId, ActorProfile, AuthError, IdentityConfig, IdentityProvider, MedRelayError, Role,
    SessionToken, SignInGrant,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: String,
    name: String,
    role: String,
}

/// Error body shapes returned by the auth backend and the REST gateway
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn reason(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message)
    }
}

/// `IdentityProvider` over HTTP
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
}

impl HttpIdentityProvider {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::transient(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            client,
        })
    }

    /// Build from configuration; identity must be enabled
    pub fn from_config(config: &IdentityConfig) -> Result<Self, MedRelayError> {
        let url = config
            .url
            .as_deref()
            .filter(|_| config.is_enabled())
            .ok_or_else(|| MedRelayError::config("identity.url is not configured"))?;
        let anon_key = config.anon_key.clone().unwrap_or_default();
        Self::new(url, anon_key, Duration::from_millis(config.request_timeout_ms))
            .map_err(|e| MedRelayError::config(e.to_string()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, AuthError> {
        let response = request
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| AuthError::transient(format!("{what} request failed: {e}")))?;

        let status = response.status();
        debug!(%status, what, "identity response");
        if status.is_success() {
            return Ok(response);
        }
        let reason = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::reason)
            .unwrap_or_else(|| status.to_string());
        Err(classify_status(status, format!("{what}: {reason}")))
    }
}

/// Map a non-success HTTP status to the retry taxonomy
pub(crate) fn classify_status(status: StatusCode, reason: String) -> AuthError {
    match status.as_u16() {
        408 | 429 => AuthError::Transient { reason },
        s if (500..600).contains(&s) => AuthError::Transient { reason },
        _ => AuthError::Rejected { reason },
    }
}

fn decode_error(what: &str, error: reqwest::Error) -> AuthError {
    AuthError::rejected(format!("{what}: unexpected response body: {error}"))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInGrant, AuthError> {
        let request = self
            .client
            .post(self.endpoint("/auth/v1/token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let response = self.send(request, "sign-in").await?;
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| decode_error("sign-in", e))?;

        Ok(SignInGrant {
            user_id: ActorId::new(body.user.id),
            session_token: SessionToken::new(body.access_token),
        })
    }

    async fn fetch_profile(
        &self,
        user_id: &ActorId,
        token: &SessionToken,
    ) -> Result<ActorProfile, AuthError> {
        let request = self
            .client
            .get(self.endpoint("/rest/v1/profiles"))
            .query(&[
                ("id", format!("eq.{user_id}")),
                ("select", "id,name,role".to_string()),
            ])
            .bearer_auth(token.expose());
        let response = self.send(request, "profile lookup").await?;
        let rows: Vec<ProfileRow> = response
            .json()
            .await
            .map_err(|e| decode_error("profile lookup", e))?;

        let Some(row) = rows.into_iter().next() else {
            return Err(AuthError::ProfileMissing {
                user_id: user_id.clone(),
            });
        };
        let role: Role = row.role.parse().map_err(AuthError::rejected)?;
        Ok(ActorProfile::new(row.id, row.name, role))
    }

    async fn sign_out(&self, token: &SessionToken) -> Result<(), AuthError> {
        let request = self
            .client
            .post(self.endpoint("/auth/v1/logout"))
            .bearer_auth(token.expose());
        match self.send(request, "sign-out").await {
            Ok(_) => Ok(()),
            // the token already expired
            Err(AuthError::Rejected { .. }) => Ok(()),
            Err(error) => Err(error),
        }
    }
}
