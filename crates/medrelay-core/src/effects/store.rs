//! Consent record store interface
//!
//! The store is the correctness anchor: it is authoritative for status and
//! timestamps, and every status change goes through a compare-and-swap keyed
//! on the expected current status.

use crate::consent::{ConsentRecord, ConsentStatus, LedgerStatus, LedgerUpdate, StatusTransition};
use crate::identifiers::ConsentId;
use crate::scope::OwnerScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Record {id} is {actual}, expected {expected}")]
    Conflict {
        id: ConsentId,
        expected: ConsentStatus,
        actual: ConsentStatus,
    },
    #[error("Record {id} anchor is {actual}, expected {expected}")]
    LedgerConflict {
        id: ConsentId,
        expected: LedgerStatus,
        actual: LedgerStatus,
    },
    #[error("Illegal transition for record {id}: {from} -> {to}")]
    IllegalTransition {
        id: ConsentId,
        from: ConsentStatus,
        to: ConsentStatus,
    },
    #[error("Record not found: {id}")]
    NotFound { id: ConsentId },
    #[error("Record already exists: {id}")]
    Duplicate { id: ConsentId },
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("Corrupt record: {reason}")]
    Corrupt { reason: String },
}

impl StoreError {
    /// Convenience constructor for I/O style failures
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Relational store of consent records.
///
/// Implementations must make `update_status` and `update_ledger` atomic with
/// respect to each other and to concurrent callers on the same record.
#[async_trait]
pub trait ConsentRecordStore: Send + Sync {
    /// Persist a new record. Fails with `Duplicate` if the id is taken.
    async fn insert_record(&self, record: ConsentRecord) -> Result<ConsentId, StoreError>;

    /// Compare-and-swap the legal status.
    ///
    /// Succeeds only if the stored status equals `expected`; returns the
    /// updated record.
    async fn update_status(
        &self,
        id: ConsentId,
        expected: ConsentStatus,
        transition: StatusTransition,
    ) -> Result<ConsentRecord, StoreError>;

    /// Compare-and-swap the ledger axis. Never touches `status`.
    async fn update_ledger(
        &self,
        id: ConsentId,
        expected: LedgerStatus,
        update: LedgerUpdate,
        at: DateTime<Utc>,
    ) -> Result<ConsentRecord, StoreError>;

    /// Fetch one record
    async fn fetch_by_id(&self, id: ConsentId) -> Result<ConsentRecord, StoreError>;

    /// List records visible within an owner scope, ordered by `created_at`
    /// descending then id ascending.
    async fn list_by_filter(&self, scope: &OwnerScope) -> Result<Vec<ConsentRecord>, StoreError>;
}

/// Sort records the way `list_by_filter` promises.
pub fn sort_newest_first(records: &mut [ConsentRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}
