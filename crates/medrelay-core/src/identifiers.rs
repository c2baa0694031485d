//! Identifier types used across MedRelay
//!
//! Consent record ids are generated locally and double as the idempotency key
//! for ledger writes. Patient and actor ids are opaque references issued by
//! external systems (the patient registry and the identity provider), so they
//! are carried as strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Consent record identifier
///
/// Allocated by the coordinator before any ledger call so that the same id
/// keys both the store row and every anchoring attempt for that record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsentId(pub Uuid);

impl ConsentId {
    /// Create a new random consent ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConsentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConsentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConsentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for ConsentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ConsentId> for Uuid {
    fn from(id: ConsentId) -> Self {
        id.0
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an externally issued identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty or whitespace
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Patient reference as issued by the patient registry
    PatientId
);

string_id!(
    /// Authenticated user reference as issued by the identity provider
    ActorId
);

/// Ledger transaction hash (`0x`-prefixed hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Wrap a transaction hash, normalising to lowercase
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into().to_ascii_lowercase())
    }

    /// Borrow the hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the hash has the `0x` + 64 hex digit shape of an EVM tx hash
    pub fn is_well_formed(&self) -> bool {
        self.0
            .strip_prefix("0x")
            .map(|digits| digits.len() == 64 && hex::decode(digits).is_ok())
            .unwrap_or(false)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxHash {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

/// Consent id assigned by the ledger contract
///
/// Fixed once the create transaction is confirmed; every later signature or
/// status query for the record addresses this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerConsentId(pub u64);

impl fmt::Display for LedgerConsentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_id_round_trips_through_display() {
        let id = ConsentId::new();
        let parsed: ConsentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn tx_hash_shape() {
        let good = TxHash::new(format!("0x{}", "AB".repeat(32)));
        assert!(good.is_well_formed());
        assert_eq!(good.as_str(), format!("0x{}", "ab".repeat(32)));
        assert!(!TxHash::new("0x1234").is_well_formed());
        assert!(!TxHash::new("deadbeef").is_well_formed());
    }

    #[test]
    fn blank_string_ids() {
        assert!(PatientId::new("  ").is_blank());
        assert!(!ActorId::from("clinician-1").is_blank());
    }
}
