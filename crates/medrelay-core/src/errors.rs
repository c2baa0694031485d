//! Unified error system for MedRelay
//!
//! Effect seams own narrow error enums (`StoreError`, `LedgerError`,
//! `AuthError`). Operations surface this single type to callers. Ledger
//! variants exist so callers can inspect a ledger outcome, but the consent
//! coordinator never returns them from a business operation: ledger failures
//! are absorbed into record state.

use crate::consent::ConsentStatus;
use crate::effects::{AuthError, LedgerError, StoreError};
use crate::identifiers::ConsentId;
use serde::{Deserialize, Serialize};

/// Unified error type for all MedRelay operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum MedRelayError {
    /// Bad input; fail fast, never retried
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Attempted transition out of a terminal (or otherwise wrong) status
    #[error("Invalid state transition for {record_id}: {from} -> {to}")]
    InvalidStateTransition {
        record_id: ConsentId,
        from: ConsentStatus,
        to: ConsentStatus,
    },

    /// Concurrent update race; refetch and re-present
    #[error("Store conflict: {message}")]
    StoreConflict { message: String },

    /// The store could not be reached or returned garbage; fatal
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Record not found
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Ledger unavailable: {message}")]
    LedgerUnavailable { message: String },

    #[error("Ledger rejected: {message}")]
    LedgerRejected { message: String },

    #[error("Ledger not configured")]
    LedgerUnconfigured,

    /// Authentication failed in a way worth retrying
    #[error("Authentication temporarily failed: {message}")]
    AuthTransient { message: String },

    /// Authentication refused; not retried
    #[error("Authentication rejected: {message}")]
    AuthRejected { message: String },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal invariant violated
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl MedRelayError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid-transition error
    pub fn invalid_transition(record_id: ConsentId, from: ConsentStatus, to: ConsentStatus) -> Self {
        Self::InvalidStateTransition {
            record_id,
            from,
            to,
        }
    }

    /// Whether another attempt of the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AuthTransient { .. } | Self::LedgerUnavailable { .. } | Self::StoreConflict { .. }
        )
    }
}

impl From<StoreError> for MedRelayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } | StoreError::LedgerConflict { .. } => Self::StoreConflict {
                message: err.to_string(),
            },
            StoreError::IllegalTransition { id, from, to } => {
                Self::InvalidStateTransition {
                    record_id: id,
                    from,
                    to,
                }
            }
            StoreError::NotFound { id } => Self::not_found(format!("consent record {id}")),
            StoreError::Duplicate { .. } => Self::validation(err.to_string()),
            StoreError::Unavailable { .. } | StoreError::Corrupt { .. } => Self::StoreUnavailable {
                message: err.to_string(),
            },
        }
    }
}

impl From<LedgerError> for MedRelayError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable { reason } => Self::LedgerUnavailable { message: reason },
            LedgerError::Rejected { reason } => Self::LedgerRejected { message: reason },
            LedgerError::Unconfigured => Self::LedgerUnconfigured,
        }
    }
}

impl From<AuthError> for MedRelayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Transient { reason } => Self::AuthTransient { message: reason },
            AuthError::Rejected { reason } => Self::AuthRejected { message: reason },
            AuthError::ProfileMissing { .. } => Self::AuthRejected {
                message: err.to_string(),
            },
        }
    }
}

/// Standard result type for MedRelay operations
pub type MedRelayResult<T> = Result<T, MedRelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::ActorId;
    use assert_matches::assert_matches;

    #[test]
    fn store_errors_map_to_operation_taxonomy() {
        let id = ConsentId::new();
        assert_matches!(
            MedRelayError::from(StoreError::Conflict {
                id,
                expected: ConsentStatus::Pending,
                actual: ConsentStatus::Signed,
            }),
            MedRelayError::StoreConflict { .. }
        );
        assert_matches!(
            MedRelayError::from(StoreError::unavailable("disk full")),
            MedRelayError::StoreUnavailable { .. }
        );
        assert_matches!(
            MedRelayError::from(StoreError::NotFound { id }),
            MedRelayError::NotFound { .. }
        );
    }

    #[test]
    fn missing_profile_is_not_retried() {
        let err = MedRelayError::from(AuthError::ProfileMissing {
            user_id: ActorId::new("u1"),
        });
        assert!(!err.is_transient());
        assert!(MedRelayError::from(AuthError::transient("timeout")).is_transient());
    }
}
