//! Filesystem consent store
//!
//! Each record lives in `<base>/<consent-id>.json`. Writes go to a temporary
//! sibling and are renamed into place, so a crash mid-write leaves either the
//! old or the new document, never a torn one. A single async mutex serializes
//! every read-modify-write, which is what makes the status update a
//! compare-and-swap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medrelay_core::effects::store::sort_newest_first;
use medrelay_core::{
    ConsentId, ConsentRecord, ConsentRecordStore, ConsentStatus, LedgerStatus, LedgerUpdate,
    OwnerScope, StatusTransition, StoreError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error};

const RECORD_EXTENSION: &str = "json";

/// Filesystem-based consent store for single-node deployments
#[derive(Debug, Clone)]
pub struct FileConsentStore {
    /// Directory holding one document per record
    base_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileConsentStore {
    /// Create a store rooted at `base_path`. The directory is created lazily.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, id: ConsentId) -> PathBuf {
        self.base_path.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    async fn read_record(&self, id: ConsentId) -> Result<ConsentRecord, StoreError> {
        let path = self.record_path(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { id })
            }
            Err(e) => {
                return Err(StoreError::unavailable(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        Self::decode(&path, &bytes)
    }

    fn decode(path: &Path, bytes: &[u8]) -> Result<ConsentRecord, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
            reason: format!("{}: {e}", path.display()),
        })
    }

    async fn write_record(&self, record: &ConsentRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            StoreError::unavailable(format!("Failed to create directory: {e}"))
        })?;

        let path = self.record_path(record.id);
        let tmp_path = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| StoreError::Corrupt {
            reason: format!("Failed to encode record {}: {e}", record.id),
        })?;

        fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| StoreError::unavailable(format!("Failed to write file: {e}")))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StoreError::unavailable(format!("Failed to commit file: {e}")))?;

        debug!(consent_id = %record.id, path = %path.display(), "record written");
        Ok(())
    }

    async fn modify<F>(&self, id: ConsentId, apply: F) -> Result<ConsentRecord, StoreError>
    where
        F: FnOnce(&mut ConsentRecord) -> Result<(), StoreError> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut record = self.read_record(id).await?;
        apply(&mut record)?;
        self.write_record(&record).await.map_err(|e| {
            error!(consent_id = %id, error = %e, "failed to persist record update");
            e
        })?;
        Ok(record)
    }
}

#[async_trait]
impl ConsentRecordStore for FileConsentStore {
    async fn insert_record(&self, record: ConsentRecord) -> Result<ConsentId, StoreError> {
        let _guard = self.write_lock.lock().await;
        let id = record.id;
        if fs::try_exists(self.record_path(id)).await.unwrap_or(false) {
            return Err(StoreError::Duplicate { id });
        }
        self.write_record(&record).await?;
        Ok(id)
    }

    async fn update_status(
        &self,
        id: ConsentId,
        expected: ConsentStatus,
        transition: StatusTransition,
    ) -> Result<ConsentRecord, StoreError> {
        self.modify(id, move |record| record.apply_transition(expected, &transition))
            .await
    }

    async fn update_ledger(
        &self,
        id: ConsentId,
        expected: LedgerStatus,
        update: LedgerUpdate,
        at: DateTime<Utc>,
    ) -> Result<ConsentRecord, StoreError> {
        self.modify(id, move |record| record.apply_ledger(expected, &update, at))
            .await
    }

    async fn fetch_by_id(&self, id: ConsentId) -> Result<ConsentRecord, StoreError> {
        self.read_record(id).await
    }

    async fn list_by_filter(&self, scope: &OwnerScope) -> Result<Vec<ConsentRecord>, StoreError> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::unavailable(format!(
                    "Failed to read directory: {e}"
                )))
            }
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StoreError::unavailable(format!("Failed to read directory entry: {e}"))
        })? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let bytes = fs::read(&path)
                .await
                .map_err(|e| StoreError::unavailable(format!("Failed to read file: {e}")))?;
            let record = Self::decode(&path, &bytes)?;
            if scope.matches(&record) {
                records.push(record);
            }
        }

        sort_newest_first(&mut records);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use medrelay_testkit::{consent_id, fixed_time, signer, tx_hash, RecordBuilder};

    #[tokio::test]
    async fn records_survive_a_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConsentStore::new(dir.path());
        store
            .insert_record(RecordBuilder::new(consent_id(1), 0).build())
            .await
            .unwrap();
        store
            .update_ledger(
                consent_id(1),
                LedgerStatus::Unanchored,
                LedgerUpdate {
                    status: LedgerStatus::Anchored,
                    tx_hash: Some(tx_hash(7)),
                    ledger_consent_id: None,
                    decision_anchored: false,
                },
                fixed_time(1),
            )
            .await
            .unwrap();

        let reopened = FileConsentStore::new(dir.path());
        let record = reopened.fetch_by_id(consent_id(1)).await.unwrap();
        assert_eq!(record.ledger_status, LedgerStatus::Anchored);
        assert_eq!(record.tx_hash, Some(tx_hash(7)));
    }

    #[tokio::test]
    async fn refused_transition_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConsentStore::new(dir.path());
        store
            .insert_record(
                RecordBuilder::new(consent_id(1), 0)
                    .rejected(&signer(), 5)
                    .build(),
            )
            .await
            .unwrap();

        let err = store
            .update_status(
                consent_id(1),
                ConsentStatus::Pending,
                StatusTransition {
                    to: ConsentStatus::Signed,
                    at: fixed_time(9),
                    by: signer().id,
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::Conflict { .. });

        let record = store.fetch_by_id(consent_id(1)).await.unwrap();
        assert_eq!(record.status, ConsentStatus::Rejected);
        assert_eq!(record.signed_at, None);
    }

    #[tokio::test]
    async fn corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(format!("{}.json", consent_id(1))), b"{not json").unwrap();
        let store = FileConsentStore::new(dir.path());

        assert_matches!(
            store.fetch_by_id(consent_id(1)).await,
            Err(StoreError::Corrupt { .. })
        );
        assert_matches!(
            store.list_by_filter(&OwnerScope::All).await,
            Err(StoreError::Corrupt { .. })
        );
    }

    #[tokio::test]
    async fn missing_directory_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConsentStore::new(dir.path().join("not-yet"));
        assert!(store.list_by_filter(&OwnerScope::All).await.unwrap().is_empty());
    }
}
