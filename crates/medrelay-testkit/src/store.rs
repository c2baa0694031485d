//! Store wrapper with injectable outages

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medrelay_core::{
    ConsentId, ConsentRecord, ConsentRecordStore, ConsentStatus, LedgerStatus, LedgerUpdate,
    OwnerScope, StatusTransition, StoreError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Faults {
    inserts: AtomicBool,
    status_updates: AtomicBool,
    ledger_updates: AtomicBool,
    reads: AtomicBool,
    status_update_calls: AtomicUsize,
    ledger_update_calls: AtomicUsize,
}

/// Wraps any store and fails selected operations with `Unavailable`
#[derive(Debug, Clone)]
pub struct FaultyStore<S> {
    inner: Arc<S>,
    faults: Arc<Faults>,
}

impl<S: ConsentRecordStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(inner),
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.faults.inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_status_updates(&self, fail: bool) {
        self.faults.status_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_ledger_updates(&self, fail: bool) {
        self.faults.ledger_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.faults.reads.store(fail, Ordering::SeqCst);
    }

    pub fn status_update_calls(&self) -> usize {
        self.faults.status_update_calls.load(Ordering::SeqCst)
    }

    pub fn ledger_update_calls(&self) -> usize {
        self.faults.ledger_update_calls.load(Ordering::SeqCst)
    }

    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("injected outage"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: ConsentRecordStore> ConsentRecordStore for FaultyStore<S> {
    async fn insert_record(&self, record: ConsentRecord) -> Result<ConsentId, StoreError> {
        Self::check(&self.faults.inserts)?;
        self.inner.insert_record(record).await
    }

    async fn update_status(
        &self,
        id: ConsentId,
        expected: ConsentStatus,
        transition: StatusTransition,
    ) -> Result<ConsentRecord, StoreError> {
        self.faults.status_update_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.faults.status_updates)?;
        self.inner.update_status(id, expected, transition).await
    }

    async fn update_ledger(
        &self,
        id: ConsentId,
        expected: LedgerStatus,
        update: LedgerUpdate,
        at: DateTime<Utc>,
    ) -> Result<ConsentRecord, StoreError> {
        self.faults.ledger_update_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.faults.ledger_updates)?;
        self.inner.update_ledger(id, expected, update, at).await
    }

    async fn fetch_by_id(&self, id: ConsentId) -> Result<ConsentRecord, StoreError> {
        Self::check(&self.faults.reads)?;
        self.inner.fetch_by_id(id).await
    }

    async fn list_by_filter(&self, scope: &OwnerScope) -> Result<Vec<ConsentRecord>, StoreError> {
        Self::check(&self.faults.reads)?;
        self.inner.list_by_filter(scope).await
    }
}
