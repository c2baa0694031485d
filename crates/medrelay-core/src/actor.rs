//! Actor references carried on records and audit events

use crate::identifiers::ActorId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of an authenticated actor.
///
/// Roles are display metadata on audit events; they do not gate transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Clinician issuing consent requests
    #[serde(rename = "doctor", alias = "clinician")]
    Clinician,
    /// Person authorised to sign on the patient's behalf (POA)
    #[serde(rename = "poa", alias = "consent_signer")]
    ConsentSigner,
    /// Nurse or other care-team member
    #[serde(rename = "nurse", alias = "care_team")]
    CareTeam,
    #[serde(rename = "admin", alias = "administrator")]
    Administrator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clinician => "doctor",
            Self::ConsentSigner => "poa",
            Self::CareTeam => "nurse",
            Self::Administrator => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "doctor" | "clinician" => Ok(Self::Clinician),
            "poa" | "consent_signer" | "signer" => Ok(Self::ConsentSigner),
            "nurse" | "care_team" => Ok(Self::CareTeam),
            "admin" | "administrator" => Ok(Self::Administrator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Resolved identity of an actor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorProfile {
    pub id: ActorId,
    pub name: String,
    pub role: Role,
}

impl ActorProfile {
    pub fn new(id: impl Into<ActorId>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_accept_legacy_and_descriptive_names() {
        assert_eq!("doctor".parse::<Role>().unwrap(), Role::Clinician);
        assert_eq!("POA".parse::<Role>().unwrap(), Role::ConsentSigner);
        assert_eq!("administrator".parse::<Role>().unwrap(), Role::Administrator);
        assert!("janitor".parse::<Role>().is_err());

        let role: Role = serde_json::from_str("\"nurse\"").unwrap();
        assert_eq!(role, Role::CareTeam);
        assert_eq!(serde_json::to_string(&Role::ConsentSigner).unwrap(), "\"poa\"");
    }
}
