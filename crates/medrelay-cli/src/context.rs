//! Effect wiring for CLI commands

use crate::IdentityArgs;
use anyhow::{anyhow, bail, Context as _, Result};
use medrelay_consent::{AnchorPolicy, AnchorReconciler, ConsentCoordinator};
use medrelay_core::{ActorProfile, MedRelayConfig, SystemClock};
use medrelay_ledger::{EthLedgerClient, HttpRpcTransport};
use medrelay_session::{HttpIdentityProvider, RetryPolicy, SessionManager};
use medrelay_store::FileConsentStore;
use std::sync::Arc;
use tracing::debug;

pub type Ledger = EthLedgerClient<HttpRpcTransport, SystemClock>;
pub type Coordinator = ConsentCoordinator<FileConsentStore, Ledger, SystemClock>;
pub type Reconciler = AnchorReconciler<FileConsentStore, Ledger, SystemClock>;

pub struct AppContext {
    pub config: MedRelayConfig,
    pub store: Arc<FileConsentStore>,
    pub ledger: Arc<Ledger>,
    pub clock: Arc<SystemClock>,
}

impl AppContext {
    pub fn from_config(config: MedRelayConfig) -> Result<Self> {
        let store = Arc::new(FileConsentStore::new(config.store.path.clone()));
        let ledger = Arc::new(
            EthLedgerClient::from_config(&config.ledger).context("building ledger client")?,
        );
        debug!(
            store = %config.store.path.display(),
            ledger_enabled = config.ledger.is_enabled(),
            identity_enabled = config.identity.is_enabled(),
            "effects wired"
        );
        Ok(Self {
            config,
            store,
            ledger,
            clock: Arc::new(SystemClock),
        })
    }

    fn policy(&self) -> AnchorPolicy {
        AnchorPolicy::from(&self.config.policy)
    }

    pub fn coordinator(&self) -> Coordinator {
        ConsentCoordinator::new(
            Arc::clone(&self.store),
            Arc::clone(&self.ledger),
            Arc::clone(&self.clock),
        )
        .with_policy(self.policy())
    }

    pub fn reconciler(&self) -> Reconciler {
        AnchorReconciler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.ledger),
            Arc::clone(&self.clock),
        )
        .with_policy(self.policy())
    }

    /// The acting user: `--actor` if given, otherwise a signed-in session
    pub async fn resolve_actor(&self, identity: &IdentityArgs) -> Result<ActorProfile> {
        if let Some(spec) = &identity.actor {
            return Ok(spec.clone().into_profile());
        }
        let Some(email) = identity.email.as_deref() else {
            bail!("this command needs an actor: pass --actor ID:ROLE:NAME or --email");
        };
        if !self.config.identity.is_enabled() {
            bail!("--email needs identity.url to be configured");
        }
        let password = std::env::var(&identity.password_env)
            .map_err(|_| anyhow!("set {} to the account password", identity.password_env))?;

        let provider = Arc::new(HttpIdentityProvider::from_config(&self.config.identity)?);
        let sessions = SessionManager::new(
            provider,
            Arc::clone(&self.clock),
            RetryPolicy::from(&self.config.session),
        );
        let session = sessions.sign_in(email, &password).await?;
        Ok(session.actor)
    }
}
