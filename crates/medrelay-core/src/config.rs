//! Deployment configuration
//!
//! Loaded from a TOML or JSON file (chosen by extension), overlaid with
//! `MEDRELAY_*` environment variables, then validated. A missing contract
//! address is a supported deployment shape ("ledger disabled"), not an error.

use crate::errors::{MedRelayError, MedRelayResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "MEDRELAY_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MedRelayConfig {
    pub store: StoreConfig,
    pub ledger: LedgerConfig,
    pub identity: IdentityConfig,
    pub session: SessionConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

/// Record store location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON document per consent record
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./medrelay-data/consents"),
        }
    }
}

/// Ledger endpoint and contract binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the ledger node
    pub rpc_url: String,
    /// Consent contract address; absent or empty disables anchoring
    pub contract_address: Option<String>,
    /// Node-managed signer account; defaults to the node's first account
    pub from_address: Option<String>,
    /// Per-request HTTP timeout
    pub request_timeout_ms: u64,
    /// How long a write waits for its receipt before reporting `Submitted`
    pub confirmation_timeout_ms: u64,
    /// Receipt polling interval while waiting for confirmation
    pub poll_interval_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            contract_address: None,
            from_address: None,
            request_timeout_ms: 10_000,
            confirmation_timeout_ms: 30_000,
            poll_interval_ms: 1_000,
        }
    }
}

impl LedgerConfig {
    /// The configured contract address, if anchoring is enabled
    pub fn contract(&self) -> Option<&str> {
        self.contract_address
            .as_deref()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
    }

    pub fn is_enabled(&self) -> bool {
        self.contract().is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Identity provider endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL of the identity backend; absent means offline actors
    pub url: Option<String>,
    /// Public API key sent with every identity request
    pub anon_key: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            request_timeout_ms: 10_000,
        }
    }
}

impl IdentityConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }
}

/// Session recovery retry bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Total invocations, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1_000,
        }
    }
}

/// Consent anchoring policy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Also anchor rejections (signatures are always anchored)
    pub anchor_rejections: bool,
}

/// Logging defaults; `RUST_LOG` wins when set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl MedRelayConfig {
    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> MedRelayResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MedRelayError::config(format!("Failed to read {}: {e}", path.display()))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| MedRelayError::config(format!("Invalid TOML: {e}"))),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| MedRelayError::config(format!("Invalid JSON: {e}"))),
            _ => Err(MedRelayError::config(format!(
                "Unsupported config format: {}",
                path.display()
            ))),
        }
    }

    /// Defaults, optionally overlaid by a file, then the process environment,
    /// then validated.
    pub fn load(path: Option<&Path>) -> MedRelayResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_with_env()?;
        config.validate()?;
        tracing::debug!(
            source = %path.map_or_else(|| "defaults".into(), |p| p.display().to_string()),
            ledger_enabled = config.ledger.is_enabled(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Merge with process environment variables
    pub fn merge_with_env(&mut self) -> MedRelayResult<()> {
        self.merge_with_vars(|key| std::env::var(key).ok())
    }

    /// Merge with variables from an arbitrary lookup (keys include the prefix)
    pub fn merge_with_vars<F>(&mut self, lookup: F) -> MedRelayResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(path) = var("STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(url) = var("ETHEREUM_RPC_URL") {
            self.ledger.rpc_url = url;
        }
        if let Some(address) = var("CONSENT_CONTRACT_ADDRESS") {
            self.ledger.contract_address = Some(address);
        }
        if let Some(from) = var("LEDGER_FROM") {
            self.ledger.from_address = Some(from);
        }
        if let Some(url) = var("IDENTITY_URL") {
            self.identity.url = Some(url);
        }
        if let Some(key) = var("IDENTITY_ANON_KEY") {
            self.identity.anon_key = Some(key);
        }
        if let Some(attempts) = var("SESSION_MAX_ATTEMPTS") {
            self.session.max_attempts = attempts.parse().map_err(|_| {
                MedRelayError::config("Invalid number in MEDRELAY_SESSION_MAX_ATTEMPTS")
            })?;
        }
        if let Some(backoff) = var("SESSION_BACKOFF_MS") {
            self.session.backoff_ms = backoff.parse().map_err(|_| {
                MedRelayError::config("Invalid number in MEDRELAY_SESSION_BACKOFF_MS")
            })?;
        }
        if let Some(flag) = var("ANCHOR_REJECTIONS") {
            self.policy.anchor_rejections = flag.parse().map_err(|_| {
                MedRelayError::config("Invalid boolean in MEDRELAY_ANCHOR_REJECTIONS")
            })?;
        }
        if let Some(filter) = var("LOG") {
            self.logging.filter = filter;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> MedRelayResult<()> {
        if let Some(address) = self.ledger.contract() {
            if !is_evm_address(address) {
                return Err(MedRelayError::config(format!(
                    "ledger.contract_address is not a 20-byte hex address: {address}"
                )));
            }
        }
        if let Some(from) = self.ledger.from_address.as_deref() {
            if !is_evm_address(from) {
                return Err(MedRelayError::config(format!(
                    "ledger.from_address is not a 20-byte hex address: {from}"
                )));
            }
        }
        if self.ledger.is_enabled() && self.ledger.rpc_url.trim().is_empty() {
            return Err(MedRelayError::config(
                "ledger.rpc_url is required when a contract address is set",
            ));
        }
        if self.ledger.poll_interval_ms == 0 {
            return Err(MedRelayError::config("ledger.poll_interval_ms must be positive"));
        }
        if self.session.max_attempts == 0 {
            return Err(MedRelayError::config("session.max_attempts must be at least 1"));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(MedRelayError::config("store.path must not be empty"));
        }
        Ok(())
    }
}

/// `0x` followed by 40 hex digits
pub fn is_evm_address(candidate: &str) -> bool {
    candidate
        .strip_prefix("0x")
        .map(|digits| digits.len() == 40 && hex::decode(digits).is_ok())
        .unwrap_or(false)
}
