//! Owner scopes for listing records

use crate::consent::ConsentRecord;
use crate::identifiers::{ActorId, PatientId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which records a caller may list
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OwnerScope {
    /// Every record (administrators, reconciliation)
    #[default]
    All,
    /// Records issued by one clinician
    Issuer(ActorId),
    /// Records concerning one patient
    Patient(PatientId),
    /// Records concerning any of a signer's patients
    Patients(BTreeSet<PatientId>),
}

impl OwnerScope {
    /// Whether `record` falls within this scope
    pub fn matches(&self, record: &ConsentRecord) -> bool {
        match self {
            Self::All => true,
            Self::Issuer(issuer) => &record.issuer == issuer,
            Self::Patient(patient) => &record.patient == patient,
            Self::Patients(patients) => patients.contains(&record.patient),
        }
    }
}
