//! Ledger advisories and anchoring outcomes
//!
//! A ledger problem never fails a consent operation. It is folded into the
//! record's `ledger_status` and reported to the caller as an advisory next
//! to the committed record.

use medrelay_core::{
    ConsentRecord, LedgerConsentId, LedgerError, LedgerReceipt, LedgerStatus, LedgerUpdate, TxHash,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-blocking notice about the ledger side of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerAdvisory {
    /// The ledger could not be reached; the record is `AnchorFailed`
    Unavailable { reason: String },
    /// The ledger refused the call; the record is `AnchorFailed`
    Rejected { reason: String },
    /// The transaction was accepted but not yet observed in a block
    AwaitingConfirmation { tx_hash: TxHash },
    /// The record has no on-chain consent id to act on yet
    MissingLedgerConsentId,
    /// The ledger outcome could not be written back to the store
    OutcomeNotRecorded { reason: String },
}

impl LedgerAdvisory {
    /// Whether the anchor needs reconciliation to recover
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::AwaitingConfirmation { .. })
    }
}

impl fmt::Display for LedgerAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "ledger unavailable: {reason}"),
            Self::Rejected { reason } => write!(f, "ledger rejected the anchor: {reason}"),
            Self::AwaitingConfirmation { tx_hash } => {
                write!(f, "anchor submitted, awaiting confirmation: {tx_hash}")
            }
            Self::MissingLedgerConsentId => {
                f.write_str("record has no on-chain consent id yet; left for reconciliation")
            }
            Self::OutcomeNotRecorded { reason } => {
                write!(f, "ledger outcome not recorded: {reason}")
            }
        }
    }
}

/// Committed record plus any ledger advisory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentOutcome {
    pub record: ConsentRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory: Option<LedgerAdvisory>,
}

impl ConsentOutcome {
    pub fn new(record: ConsentRecord, advisory: Option<LedgerAdvisory>) -> Self {
        Self { record, advisory }
    }
}

/// Ledger-axis update for a successful write. A known on-chain id means the
/// write was the decision (creation is the only write that learns the id).
pub(crate) fn receipt_update(
    receipt: LedgerReceipt,
    known_id: Option<LedgerConsentId>,
) -> (LedgerUpdate, Option<LedgerAdvisory>) {
    let ledger_consent_id = known_id.or(receipt.consent_id);
    if receipt.is_confirmed() {
        let advisory = ledger_consent_id
            .is_none()
            .then_some(LedgerAdvisory::MissingLedgerConsentId);
        (
            LedgerUpdate {
                status: LedgerStatus::Anchored,
                tx_hash: Some(receipt.tx_hash),
                ledger_consent_id,
                decision_anchored: known_id.is_some(),
            },
            advisory,
        )
    } else {
        let advisory = LedgerAdvisory::AwaitingConfirmation {
            tx_hash: receipt.tx_hash.clone(),
        };
        (
            LedgerUpdate {
                status: LedgerStatus::AnchorPending,
                tx_hash: Some(receipt.tx_hash),
                ledger_consent_id,
                decision_anchored: false,
            },
            Some(advisory),
        )
    }
}

/// Ledger-axis update for a failed write. `None` for an unconfigured ledger,
/// which leaves the anchor untouched.
pub(crate) fn failure_update(
    error: &LedgerError,
    known_id: Option<LedgerConsentId>,
) -> Option<(LedgerUpdate, LedgerAdvisory)> {
    let advisory = match error {
        LedgerError::Unconfigured => return None,
        LedgerError::Unavailable { reason } => LedgerAdvisory::Unavailable {
            reason: reason.clone(),
        },
        LedgerError::Rejected { reason } => LedgerAdvisory::Rejected {
            reason: reason.clone(),
        },
    };
    Some((
        LedgerUpdate {
            status: LedgerStatus::AnchorFailed,
            tx_hash: None,
            ledger_consent_id: known_id,
            decision_anchored: false,
        },
        advisory,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrelay_core::Confirmation;
    use medrelay_testkit::tx_hash;

    #[test]
    fn submitted_receipt_is_pending() {
        let (update, advisory) = receipt_update(
            LedgerReceipt {
                tx_hash: tx_hash(1),
                consent_id: None,
                confirmation: Confirmation::Submitted,
            },
            Some(LedgerConsentId(4)),
        );
        assert_eq!(update.status, LedgerStatus::AnchorPending);
        assert_eq!(update.ledger_consent_id, Some(LedgerConsentId(4)));
        assert!(!update.decision_anchored);
        assert!(!advisory.unwrap().is_failure());
    }

    #[test]
    fn confirmed_write_with_known_id_anchors_the_decision() {
        let confirmed = |known_id| {
            receipt_update(
                LedgerReceipt {
                    tx_hash: tx_hash(2),
                    consent_id: Some(LedgerConsentId(4)),
                    confirmation: Confirmation::Confirmed,
                },
                known_id,
            )
            .0
        };
        assert!(confirmed(Some(LedgerConsentId(4))).decision_anchored);
        assert!(!confirmed(None).decision_anchored);
    }

    #[test]
    fn unconfigured_leaves_anchor_alone() {
        assert!(failure_update(&LedgerError::Unconfigured, None).is_none());
        let (update, advisory) =
            failure_update(&LedgerError::unavailable("timeout"), None).unwrap();
        assert_eq!(update.status, LedgerStatus::AnchorFailed);
        assert!(advisory.is_failure());
    }
}
