//! Ledger client interface
//!
//! A ledger client performs exactly one attempt per call. It never retries and
//! never touches the record store; callers apply the returned outcome.

use crate::identifiers::{LedgerConsentId, TxHash};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LedgerError {
    /// Network or RPC failure; the call may or may not have reached the chain
    #[error("Ledger unavailable: {reason}")]
    Unavailable { reason: String },
    /// The contract reverted or the node refused the transaction
    #[error("Ledger rejected the call: {reason}")]
    Rejected { reason: String },
    /// No contract address is configured for this deployment
    #[error("Ledger is not configured")]
    Unconfigured,
}

impl LedgerError {
    /// Shorthand for `Unavailable`
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Shorthand for `Rejected`
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// Whether the client observed the transaction in a block before returning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confirmation {
    /// Receipt observed
    Confirmed,
    /// Transaction accepted by the node; receipt not yet observed
    Submitted,
}

/// Outcome of a successful ledger write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub tx_hash: TxHash,
    /// Consent id assigned by the contract (create only, and only once confirmed)
    pub consent_id: Option<LedgerConsentId>,
    pub confirmation: Confirmation,
}

impl LedgerReceipt {
    /// Whether the write is known to be in a block
    pub fn is_confirmed(&self) -> bool {
        self.confirmation == Confirmation::Confirmed
    }
}

/// Receipt lookup result for a previously submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    /// Included and succeeded
    Confirmed { consent_id: Option<LedgerConsentId> },
    /// Included but reverted
    Reverted,
    /// Not (yet) visible to the node
    NotFound,
}

/// Smart-contract interface for consent anchoring.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Whether a contract address is configured. When false every contract
    /// call returns `LedgerError::Unconfigured` without network traffic.
    fn is_configured(&self) -> bool;

    /// Create the consent on chain
    async fn create_on_chain(
        &self,
        patient_id: &str,
        procedure_type: &str,
        description: &str,
    ) -> Result<LedgerReceipt, LedgerError>;

    /// Record the signature for a consent created earlier
    async fn sign_on_chain(&self, consent_id: LedgerConsentId)
        -> Result<LedgerReceipt, LedgerError>;

    /// Read the signed flag held by the contract
    async fn consent_status(&self, consent_id: LedgerConsentId) -> Result<bool, LedgerError>;

    /// Look up the receipt of a submitted transaction
    async fn receipt_status(&self, tx_hash: &TxHash) -> Result<ReceiptStatus, LedgerError>;

    /// Whether the node knows the transaction. Display and audit only;
    /// `false` means unconfirmed or unpropagated, not invalid. Needs no
    /// contract address.
    async fn verify_transaction(&self, tx_hash: &TxHash) -> Result<bool, LedgerError>;
}
