//! Consent record and its two state axes
//!
//! A record carries a legal `status` axis (`Pending` → `Signed` | `Rejected`,
//! both terminal) and an independent `ledger_status` axis describing how far
//! anchoring has progressed. Neither axis gates the other: a record can be
//! `Signed` while its anchor is still `AnchorFailed`, and an anchor can reach
//! `Anchored` long after the record became terminal.

use crate::effects::store::StoreError;
use crate::identifiers::{ActorId, ConsentId, LedgerConsentId, PatientId, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Legal status of a consent record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    /// Awaiting a decision from the consent signer
    Pending,
    /// Affirmative consent recorded (terminal)
    Signed,
    /// Consent declined (terminal)
    Rejected,
}

impl ConsentStatus {
    /// Whether no further transition is allowed
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Signed | Self::Rejected)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: ConsentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Signed) | (Self::Pending, Self::Rejected)
        )
    }

    /// Stable lowercase name used in storage and exports
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Signed => "signed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anchoring progress of a consent record
///
/// None of these values is terminal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// Never submitted (ledger disabled, or nothing to anchor yet)
    #[default]
    Unanchored,
    /// Submitted; confirmation not yet observed
    AnchorPending,
    /// Confirmed on the ledger
    Anchored,
    /// Last submission failed; eligible for reconciliation
    AnchorFailed,
}

impl LedgerStatus {
    /// Stable lowercase name used in storage and exports
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unanchored => "unanchored",
            Self::AnchorPending => "anchor_pending",
            Self::Anchored => "anchored",
            Self::AnchorFailed => "anchor_failed",
        }
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated input for a new consent record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentDraft {
    /// Pre-allocated record id (idempotency key for anchoring)
    pub id: ConsentId,
    /// Human readable title
    pub title: String,
    /// Procedure description shown to the signer
    pub description: String,
    /// Procedure category, also written to the ledger
    pub procedure_type: String,
    /// Patient the consent concerns
    pub patient: PatientId,
    /// Clinician requesting consent
    pub issuer: ActorId,
}

/// Persisted consent record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: ConsentId,
    pub title: String,
    pub description: String,
    pub procedure_type: String,
    pub patient: PatientId,
    pub issuer: ActorId,
    pub status: ConsentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signed_by: Option<ActorId>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_by: Option<ActorId>,
    pub ledger_status: LedgerStatus,
    /// Most recent anchoring transaction; at most one is active per record
    #[serde(default)]
    pub tx_hash: Option<TxHash>,
    /// On-chain consent id, fixed once known
    #[serde(default)]
    pub ledger_consent_id: Option<LedgerConsentId>,
    /// Whether the anchor covers the sign or reject decision, not only creation
    #[serde(default)]
    pub decision_anchored: bool,
    pub updated_at: DateTime<Utc>,
}

impl ConsentRecord {
    /// Build a new `Pending` record from a draft and the anchoring outcome.
    pub fn pending(draft: ConsentDraft, created_at: DateTime<Utc>, anchor: LedgerUpdate) -> Self {
        Self {
            id: draft.id,
            title: draft.title,
            description: draft.description,
            procedure_type: draft.procedure_type,
            patient: draft.patient,
            issuer: draft.issuer,
            status: ConsentStatus::Pending,
            created_at,
            signed_at: None,
            signed_by: None,
            rejected_at: None,
            rejected_by: None,
            ledger_status: anchor.status,
            tx_hash: anchor.tx_hash,
            ledger_consent_id: anchor.ledger_consent_id,
            decision_anchored: false,
            updated_at: created_at,
        }
    }

    /// Apply a status transition if the record is still at `expected`.
    ///
    /// This is the compare-and-swap every store implementation delegates to,
    /// so memory and durable stores share one definition of a legal update.
    pub fn apply_transition(
        &mut self,
        expected: ConsentStatus,
        transition: &StatusTransition,
    ) -> Result<(), StoreError> {
        if self.status != expected {
            return Err(StoreError::Conflict {
                id: self.id,
                expected,
                actual: self.status,
            });
        }
        if !self.status.can_transition_to(transition.to) {
            return Err(StoreError::IllegalTransition {
                id: self.id,
                from: self.status,
                to: transition.to,
            });
        }

        self.status = transition.to;
        match transition.to {
            ConsentStatus::Signed => {
                self.signed_at = Some(transition.at);
                self.signed_by = Some(transition.by.clone());
            }
            ConsentStatus::Rejected => {
                self.rejected_at = Some(transition.at);
                self.rejected_by = Some(transition.by.clone());
            }
            ConsentStatus::Pending => {}
        }
        self.updated_at = transition.at;
        Ok(())
    }

    /// Apply a ledger-axis update if the anchor is still at `expected`.
    ///
    /// Never touches `status`. A known on-chain consent id is never replaced
    /// and an anchored decision stays anchored.
    pub fn apply_ledger(
        &mut self,
        expected: LedgerStatus,
        update: &LedgerUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.ledger_status != expected {
            return Err(StoreError::LedgerConflict {
                id: self.id,
                expected,
                actual: self.ledger_status,
            });
        }

        self.ledger_status = update.status;
        if let Some(hash) = &update.tx_hash {
            self.tx_hash = Some(hash.clone());
        }
        if self.ledger_consent_id.is_none() {
            self.ledger_consent_id = update.ledger_consent_id;
        }
        if update.decision_anchored {
            self.decision_anchored = true;
        }
        self.updated_at = at;
        Ok(())
    }

    /// Timestamp of the terminal decision, if any
    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            ConsentStatus::Signed => self.signed_at,
            ConsentStatus::Rejected => self.rejected_at,
            ConsentStatus::Pending => None,
        }
    }
}

/// Fields written together with a status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    /// Target status
    pub to: ConsentStatus,
    /// When the authenticated actor decided
    pub at: DateTime<Utc>,
    /// The authenticated actor who decided
    pub by: ActorId,
}

/// Outcome of an anchoring attempt, as applied to the ledger axis
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerUpdate {
    pub status: LedgerStatus,
    pub tx_hash: Option<TxHash>,
    pub ledger_consent_id: Option<LedgerConsentId>,
    /// Set when this update confirms the record's decision on chain
    pub decision_anchored: bool,
}

impl LedgerUpdate {
    /// Update that only moves the ledger status
    pub fn status(status: LedgerStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Mark the update as confirming the decision, not only the creation
    pub fn covering_decision(mut self) -> Self {
        self.decision_anchored = true;
        self
    }
}
