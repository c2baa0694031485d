//! Audit event types

use chrono::{DateTime, Utc};
use medrelay_core::{ActorId, ConsentId, LedgerConsentId, LedgerStatus, PatientId, Role, TxHash};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// What happened to a consent record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuditEventKind {
    #[serde(rename = "consent_created")]
    Created,
    #[serde(rename = "consent_signed")]
    Signed,
    #[serde(rename = "consent_rejected")]
    Rejected,
}

impl AuditEventKind {
    pub const ALL: [AuditEventKind; 3] = [Self::Created, Self::Signed, Self::Rejected];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "consent_created",
            Self::Signed => "consent_signed",
            Self::Rejected => "consent_rejected",
        }
    }

    /// Verb used in event descriptions
    pub fn verb(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Signed => "Signed",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" | "consent_created" => Ok(Self::Created),
            "signed" | "consent_signed" => Ok(Self::Signed),
            "rejected" | "consent_rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// Who acted, resolved for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActor {
    /// Reference carried on the record; absent on records that predate it
    pub id: Option<ActorId>,
    pub name: String,
    pub role: Role,
}

/// Ledger evidence known for the record when the trail was derived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerProof {
    pub tx_hash: TxHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_consent_id: Option<LedgerConsentId>,
    /// `None` until `verify_proofs` ran and the ledger answered
    #[serde(default)]
    pub verified: Option<bool>,
}

/// A single derived audit event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// `<record id>_<kind suffix>`, stable across derivations
    pub id: String,
    pub record_id: ConsentId,
    pub kind: AuditEventKind,
    pub actor: AuditActor,
    pub patient: PatientId,
    pub patient_name: String,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub ledger_status: LedgerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<LedgerProof>,
}

impl AuditEvent {
    /// Newest first; ties by record id, then kind
    pub fn chronological(a: &AuditEvent, b: &AuditEvent) -> Ordering {
        order_key(a.timestamp, a.record_id, a.kind, b.timestamp, b.record_id, b.kind)
    }
}

pub(crate) fn order_key(
    a_at: DateTime<Utc>,
    a_id: ConsentId,
    a_kind: AuditEventKind,
    b_at: DateTime<Utc>,
    b_id: ConsentId,
    b_kind: AuditEventKind,
) -> Ordering {
    b_at.cmp(&a_at)
        .then_with(|| a_id.cmp(&b_id))
        .then_with(|| a_kind.cmp(&b_kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_short_and_wire_names() {
        assert_eq!("signed".parse::<AuditEventKind>().unwrap(), AuditEventKind::Signed);
        assert_eq!(
            "CONSENT_REJECTED".parse::<AuditEventKind>().unwrap(),
            AuditEventKind::Rejected
        );
        assert!("user_login".parse::<AuditEventKind>().is_err());
        assert_eq!(
            serde_json::to_string(&AuditEventKind::Created).unwrap(),
            "\"consent_created\""
        );
    }
}
