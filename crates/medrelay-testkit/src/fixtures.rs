//! Reusable actors, patients and records

use chrono::{DateTime, TimeZone, Utc};
use medrelay_core::{
    ActorId, ActorProfile, ConsentDraft, ConsentId, ConsentRecord, ConsentStatus, LedgerConsentId,
    LedgerStatus, LedgerUpdate, PatientId, Role, TxHash,
};
use uuid::Uuid;

/// 2024-01-01T00:00:00Z plus `secs`
pub fn fixed_time(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap()
}

/// Deterministic consent id; lower `n` sorts first
pub fn consent_id(n: u128) -> ConsentId {
    ConsentId::from_uuid(Uuid::from_u128(n))
}

/// Deterministic well-formed transaction hash
pub fn tx_hash(n: u64) -> TxHash {
    TxHash::new(format!("0x{n:064x}"))
}

pub fn clinician() -> ActorProfile {
    ActorProfile::new("dr-okafor", "Dr. Amara Okafor", Role::Clinician)
}

pub fn second_clinician() -> ActorProfile {
    ActorProfile::new("dr-lindqvist", "Dr. Erik Lindqvist", Role::Clinician)
}

pub fn signer() -> ActorProfile {
    ActorProfile::new("poa-morgan", "Morgan Doe", Role::ConsentSigner)
}

pub fn nurse() -> ActorProfile {
    ActorProfile::new("rn-patel", "Priya Patel", Role::CareTeam)
}

pub fn jane_doe() -> PatientId {
    PatientId::new("Jane Doe")
}

pub fn john_roe() -> PatientId {
    PatientId::new("John Roe")
}

/// Builder for records in arbitrary states, bypassing the coordinator
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: ConsentRecord,
}

impl RecordBuilder {
    /// Pending, unanchored record created at `fixed_time(created_secs)`
    pub fn new(id: ConsentId, created_secs: i64) -> Self {
        let draft = ConsentDraft {
            id,
            title: "MRI consent".to_string(),
            description: "contrast study".to_string(),
            procedure_type: "MRI".to_string(),
            patient: jane_doe(),
            issuer: clinician().id,
        };
        Self {
            record: ConsentRecord::pending(draft, fixed_time(created_secs), LedgerUpdate::default()),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.record.description = description.to_string();
        self
    }

    pub fn procedure(mut self, procedure_type: &str) -> Self {
        self.record.procedure_type = procedure_type.to_string();
        self
    }

    pub fn patient(mut self, patient: PatientId) -> Self {
        self.record.patient = patient;
        self
    }

    pub fn issuer(mut self, issuer: &ActorProfile) -> Self {
        self.record.issuer = issuer.id.clone();
        self
    }

    pub fn signed(mut self, by: &ActorProfile, at_secs: i64) -> Self {
        self.record.status = ConsentStatus::Signed;
        self.record.signed_by = Some(by.id.clone());
        self.record.signed_at = Some(fixed_time(at_secs));
        self.record.updated_at = fixed_time(at_secs);
        self
    }

    pub fn rejected(mut self, by: &ActorProfile, at_secs: i64) -> Self {
        self.record.status = ConsentStatus::Rejected;
        self.record.rejected_by = Some(by.id.clone());
        self.record.rejected_at = Some(fixed_time(at_secs));
        self.record.updated_at = fixed_time(at_secs);
        self
    }

    pub fn ledger(mut self, status: LedgerStatus) -> Self {
        self.record.ledger_status = status;
        self
    }

    pub fn anchored_by(mut self, hash: TxHash, consent_id: Option<u64>) -> Self {
        self.record.ledger_status = LedgerStatus::Anchored;
        self.record.tx_hash = Some(hash);
        self.record.ledger_consent_id = consent_id.map(LedgerConsentId);
        self
    }

    /// The anchor also covers the sign or reject decision
    pub fn decision_anchored(mut self) -> Self {
        self.record.decision_anchored = true;
        self
    }

    pub fn tx(mut self, hash: TxHash) -> Self {
        self.record.tx_hash = Some(hash);
        self
    }

    pub fn ledger_consent_id(mut self, id: u64) -> Self {
        self.record.ledger_consent_id = Some(LedgerConsentId(id));
        self
    }

    pub fn build(self) -> ConsentRecord {
        self.record
    }
}

/// Actor id shortcut for assertions
pub fn actor(id: &str) -> ActorId {
    ActorId::new(id)
}
