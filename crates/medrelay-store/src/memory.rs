//! In-memory consent store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medrelay_core::effects::store::sort_newest_first;
use medrelay_core::{
    ConsentId, ConsentRecord, ConsentRecordStore, ConsentStatus, LedgerStatus, LedgerUpdate,
    OwnerScope, StatusTransition, StoreError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory consent store
#[derive(Debug, Clone, Default)]
pub struct MemoryConsentStore {
    records: Arc<RwLock<HashMap<ConsentId, ConsentRecord>>>,
}

impl MemoryConsentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-built records, bypassing duplicate checks
    pub async fn seed(&self, records: impl IntoIterator<Item = ConsentRecord>) {
        let mut map = self.records.write().await;
        for record in records {
            map.insert(record.id, record);
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ConsentRecordStore for MemoryConsentStore {
    async fn insert_record(&self, record: ConsentRecord) -> Result<ConsentId, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate { id: record.id });
        }
        let id = record.id;
        records.insert(id, record);
        Ok(id)
    }

    async fn update_status(
        &self,
        id: ConsentId,
        expected: ConsentStatus,
        transition: StatusTransition,
    ) -> Result<ConsentRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound { id })?;

        // Work on a copy so a refused update leaves the stored record untouched
        let mut updated = record.clone();
        updated.apply_transition(expected, &transition)?;
        *record = updated.clone();
        Ok(updated)
    }

    async fn update_ledger(
        &self,
        id: ConsentId,
        expected: LedgerStatus,
        update: LedgerUpdate,
        at: DateTime<Utc>,
    ) -> Result<ConsentRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound { id })?;

        let mut updated = record.clone();
        updated.apply_ledger(expected, &update, at)?;
        *record = updated.clone();
        Ok(updated)
    }

    async fn fetch_by_id(&self, id: ConsentId) -> Result<ConsentRecord, StoreError> {
        let records = self.records.read().await;
        records.get(&id).cloned().ok_or(StoreError::NotFound { id })
    }

    async fn list_by_filter(&self, scope: &OwnerScope) -> Result<Vec<ConsentRecord>, StoreError> {
        let records = self.records.read().await;
        let mut visible: Vec<ConsentRecord> = records
            .values()
            .filter(|record| scope.matches(record))
            .cloned()
            .collect();
        sort_newest_first(&mut visible);
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use medrelay_testkit::{consent_id, fixed_time, john_roe, signer, RecordBuilder};

    fn sign_at(secs: i64) -> StatusTransition {
        StatusTransition {
            to: ConsentStatus::Signed,
            at: fixed_time(secs),
            by: signer().id,
        }
    }

    #[tokio::test]
    async fn duplicate_insert_is_refused() {
        let store = MemoryConsentStore::new();
        let record = RecordBuilder::new(consent_id(1), 0).build();
        store.insert_record(record.clone()).await.unwrap();

        assert_matches!(
            store.insert_record(record).await,
            Err(StoreError::Duplicate { .. })
        );
    }

    #[tokio::test]
    async fn cas_conflict_leaves_record_unchanged() {
        let store = MemoryConsentStore::new();
        let record = RecordBuilder::new(consent_id(1), 0).build();
        store.insert_record(record).await.unwrap();
        store
            .update_status(consent_id(1), ConsentStatus::Pending, sign_at(10))
            .await
            .unwrap();
        let before = store.fetch_by_id(consent_id(1)).await.unwrap();

        let err = store
            .update_status(consent_id(1), ConsentStatus::Pending, sign_at(20))
            .await
            .unwrap_err();
        assert_matches!(
            err,
            StoreError::Conflict {
                actual: ConsentStatus::Signed,
                ..
            }
        );
        assert_eq!(store.fetch_by_id(consent_id(1)).await.unwrap(), before);
    }

    #[tokio::test]
    async fn ledger_update_never_touches_status() {
        let store = MemoryConsentStore::new();
        store
            .insert_record(RecordBuilder::new(consent_id(1), 0).build())
            .await
            .unwrap();

        let updated = store
            .update_ledger(
                consent_id(1),
                LedgerStatus::Unanchored,
                LedgerUpdate::status(LedgerStatus::AnchorFailed),
                fixed_time(5),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, ConsentStatus::Pending);
        assert_eq!(updated.ledger_status, LedgerStatus::AnchorFailed);

        assert_matches!(
            store
                .update_ledger(
                    consent_id(1),
                    LedgerStatus::Unanchored,
                    LedgerUpdate::status(LedgerStatus::Anchored),
                    fixed_time(6),
                )
                .await,
            Err(StoreError::LedgerConflict { .. })
        );
    }

    #[tokio::test]
    async fn list_applies_scope_and_order() {
        let store = MemoryConsentStore::new();
        store
            .seed([
                RecordBuilder::new(consent_id(3), 10).build(),
                RecordBuilder::new(consent_id(1), 20).build(),
                RecordBuilder::new(consent_id(2), 20).build(),
                RecordBuilder::new(consent_id(4), 30).patient(john_roe()).build(),
            ])
            .await;

        let all = store.list_by_filter(&OwnerScope::All).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![consent_id(4), consent_id(1), consent_id(2), consent_id(3)]
        );

        let roe = store
            .list_by_filter(&OwnerScope::Patient(john_roe()))
            .await
            .unwrap();
        assert_eq!(roe.len(), 1);
        assert_eq!(roe[0].id, consent_id(4));
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let store = MemoryConsentStore::new();
        assert_matches!(
            store.fetch_by_id(consent_id(9)).await,
            Err(StoreError::NotFound { .. })
        );
        assert_matches!(
            store
                .update_status(consent_id(9), ConsentStatus::Pending, sign_at(1))
                .await,
            Err(StoreError::NotFound { .. })
        );
    }
}
