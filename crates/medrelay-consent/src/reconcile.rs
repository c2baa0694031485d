//! Anchor reconciliation
//!
//! Walks records whose anchor is incomplete and drives each one a single step
//! closer to `Anchored`. Before any write the reconciler re-reads what the
//! ledger already knows (receipt of the last transaction, on-chain signed
//! flag), so rerunning it never produces a second on-chain consent or a
//! second signature for the same record.
//!
//! Ledger-axis updates are conditional on the ledger status the reconciler
//! read. If another reconciler or the coordinator moved it first, the record
//! is skipped and counted as a conflict.
//!
//! A record that is already `Anchored` is never downgraded by a failed read;
//! only a refused or failed write can move it to `AnchorFailed`.

use crate::advisory::{failure_update, receipt_update};
use crate::policy::AnchorPolicy;
use medrelay_core::{
    ConsentId, ConsentRecord, ConsentRecordStore, ConsentStatus, LedgerClient, LedgerConsentId,
    LedgerError, LedgerStatus, LedgerUpdate, MedRelayResult, OwnerScope, PhysicalClock,
    ReceiptStatus, StoreError, TxHash,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconcileAction {
    Anchored,
    StillPending,
    Failed { reason: String },
    /// Another writer changed the anchor first
    Conflict,
    Unchanged,
}

/// Summary of a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub examined: usize,
    pub anchored: usize,
    pub pending: usize,
    pub failed: usize,
    pub conflicts: usize,
    pub unchanged: usize,
    pub records: Vec<(ConsentId, ReconcileAction)>,
}

impl ReconcileReport {
    fn record(&mut self, id: ConsentId, action: ReconcileAction) {
        self.examined += 1;
        match &action {
            ReconcileAction::Anchored => self.anchored += 1,
            ReconcileAction::StillPending => self.pending += 1,
            ReconcileAction::Failed { .. } => self.failed += 1,
            ReconcileAction::Conflict => self.conflicts += 1,
            ReconcileAction::Unchanged => self.unchanged += 1,
        }
        self.records.push((id, action));
    }
}

/// Re-drives incomplete anchors
pub struct AnchorReconciler<S, L, C> {
    store: Arc<S>,
    ledger: Arc<L>,
    clock: Arc<C>,
    policy: AnchorPolicy,
}

impl<S, L, C> AnchorReconciler<S, L, C>
where
    S: ConsentRecordStore,
    L: LedgerClient,
    C: PhysicalClock,
{
    pub fn new(store: Arc<S>, ledger: Arc<L>, clock: Arc<C>) -> Self {
        Self {
            store,
            ledger,
            clock,
            policy: AnchorPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AnchorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether a record needs a reconciliation step
    pub fn needs_reconciliation(&self, record: &ConsentRecord) -> bool {
        match record.ledger_status {
            LedgerStatus::AnchorPending | LedgerStatus::AnchorFailed | LedgerStatus::Unanchored => {
                true
            }
            // a crash between the status write and the anchor write leaves only the creation anchored
            LedgerStatus::Anchored => {
                record.ledger_consent_id.is_some()
                    && !record.decision_anchored
                    && self.policy.anchors_decision(record)
            }
        }
    }

    /// Reconcile every candidate visible in `scope`, oldest work first.
    ///
    /// Only store failures abort the pass.
    pub async fn reconcile_all(&self, scope: &OwnerScope) -> MedRelayResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        if !self.ledger.is_configured() {
            debug!("ledger not configured; nothing to reconcile");
            return Ok(report);
        }

        let mut candidates: Vec<ConsentRecord> = self
            .store
            .list_by_filter(scope)
            .await?
            .into_iter()
            .filter(|record| self.needs_reconciliation(record))
            .collect();
        candidates.reverse();

        for record in candidates {
            let id = record.id;
            let action = self.reconcile_one(record).await?;
            report.record(id, action);
        }

        info!(
            examined = report.examined,
            anchored = report.anchored,
            pending = report.pending,
            failed = report.failed,
            conflicts = report.conflicts,
            "reconciliation pass finished"
        );
        Ok(report)
    }

    /// Reconcile a single record by id
    pub async fn reconcile_record(&self, id: ConsentId) -> MedRelayResult<ReconcileAction> {
        let record = self.store.fetch_by_id(id).await?;
        if !self.ledger.is_configured() || !self.needs_reconciliation(&record) {
            return Ok(ReconcileAction::Unchanged);
        }
        self.reconcile_one(record).await
    }

    async fn reconcile_one(&self, record: ConsentRecord) -> MedRelayResult<ReconcileAction> {
        let mut ledger_id = record.ledger_consent_id;
        let mut created_tx: Option<TxHash> = None;

        // Resolve the last submitted transaction before sending anything new
        let unresolved = record
            .tx_hash
            .clone()
            .filter(|_| record.ledger_status == LedgerStatus::AnchorPending || ledger_id.is_none());
        if let Some(hash) = unresolved {
            match self.ledger.receipt_status(&hash).await {
                Err(error) => return self.fail(&record, &error, ledger_id, None).await,
                Ok(ReceiptStatus::NotFound) => {
                    debug!(consent_id = %record.id, tx_hash = %hash, "transaction not yet mined");
                    return Ok(ReconcileAction::StillPending);
                }
                Ok(ReceiptStatus::Reverted) => {
                    debug!(consent_id = %record.id, tx_hash = %hash, "last transaction reverted");
                }
                Ok(ReceiptStatus::Confirmed { consent_id }) => {
                    if ledger_id.is_some() {
                        // the decision transaction landed
                        let mut landed = LedgerUpdate::status(LedgerStatus::Anchored);
                        if record.status.is_terminal() {
                            landed = landed.covering_decision();
                        }
                        return self.write(&record, landed, None).await;
                    }
                    let Some(learned) = consent_id else {
                        return self
                            .write(
                                &record,
                                LedgerUpdate::status(LedgerStatus::AnchorFailed),
                                Some("creation mined but its consent id is unreadable".into()),
                            )
                            .await;
                    };
                    ledger_id = Some(learned);
                    created_tx = Some(hash);
                }
            }
        }

        // Make sure the consent exists on chain
        let ledger_id = match ledger_id {
            Some(id) => id,
            None => {
                let created = self
                    .ledger
                    .create_on_chain(
                        record.patient.as_str(),
                        &record.procedure_type,
                        &record.description,
                    )
                    .await;
                match created {
                    Err(error) => return self.fail(&record, &error, None, None).await,
                    Ok(receipt) => match (receipt.is_confirmed(), receipt.consent_id) {
                        (true, Some(id)) => {
                            created_tx = Some(receipt.tx_hash);
                            id
                        }
                        _ => {
                            let (update, advisory) = receipt_update(receipt, None);
                            let reason = advisory
                                .filter(|advisory| advisory.is_failure())
                                .map(|advisory| advisory.to_string());
                            return self.write(&record, update, reason).await;
                        }
                    },
                }
            }
        };

        let anchored = LedgerUpdate {
            status: LedgerStatus::Anchored,
            tx_hash: created_tx.clone(),
            ledger_consent_id: Some(ledger_id),
            decision_anchored: false,
        };
        if !self.policy.anchors_decision(&record) {
            return self.write(&record, anchored, None).await;
        }

        // Reflect the decision, checking the contract first
        let signed_on_chain = match self.ledger.consent_status(ledger_id).await {
            Ok(signed) => signed,
            Err(error) if record.ledger_status == LedgerStatus::Anchored => {
                debug!(consent_id = %record.id, %error, "decision check unavailable; anchor kept");
                return Ok(ReconcileAction::Unchanged);
            }
            Err(error) => {
                return self
                    .fail(&record, &error, Some(ledger_id), created_tx)
                    .await
            }
        };

        match record.status {
            ConsentStatus::Signed if signed_on_chain => {
                self.write(&record, anchored.covering_decision(), None).await
            }
            ConsentStatus::Signed => match self.ledger.sign_on_chain(ledger_id).await {
                Ok(receipt) => {
                    let (update, _) = receipt_update(receipt, Some(ledger_id));
                    self.write(&record, update, None).await
                }
                Err(error) => {
                    self.fail(&record, &error, Some(ledger_id), created_tx)
                        .await
                }
            },
            ConsentStatus::Rejected if signed_on_chain => {
                let error = LedgerError::rejected("ledger shows the consent as signed");
                self.fail(&record, &error, Some(ledger_id), created_tx)
                    .await
            }
            ConsentStatus::Rejected => {
                self.write(&record, anchored.covering_decision(), None).await
            }
            ConsentStatus::Pending => self.write(&record, anchored, None).await,
        }
    }

    async fn fail(
        &self,
        record: &ConsentRecord,
        error: &LedgerError,
        ledger_id: Option<LedgerConsentId>,
        tx_hash: Option<TxHash>,
    ) -> MedRelayResult<ReconcileAction> {
        match failure_update(error, ledger_id) {
            None => Ok(ReconcileAction::Unchanged),
            Some((mut update, advisory)) => {
                update.tx_hash = tx_hash;
                self.write(record, update, Some(advisory.to_string())).await
            }
        }
    }

    /// Apply `update` conditionally on the ledger status the record was read at
    async fn write(
        &self,
        record: &ConsentRecord,
        update: LedgerUpdate,
        reason: Option<String>,
    ) -> MedRelayResult<ReconcileAction> {
        let action = match update.status {
            LedgerStatus::Anchored => ReconcileAction::Anchored,
            LedgerStatus::AnchorPending => ReconcileAction::StillPending,
            LedgerStatus::AnchorFailed => ReconcileAction::Failed {
                reason: reason.unwrap_or_else(|| "anchoring failed".to_string()),
            },
            LedgerStatus::Unanchored => ReconcileAction::Unchanged,
        };

        let is_noop = update.status == record.ledger_status
            && update.tx_hash.is_none()
            && (update.ledger_consent_id.is_none()
                || update.ledger_consent_id == record.ledger_consent_id)
            && (!update.decision_anchored || record.decision_anchored);
        if is_noop {
            return Ok(match action {
                ReconcileAction::Anchored => ReconcileAction::Unchanged,
                other => other,
            });
        }

        match self
            .store
            .update_ledger(record.id, record.ledger_status, update, self.clock.now())
            .await
        {
            Ok(updated) => {
                match &action {
                    ReconcileAction::Failed { reason } => {
                        warn!(consent_id = %record.id, %reason, "anchor still failing");
                    }
                    _ => info!(
                        consent_id = %record.id,
                        ledger_status = %updated.ledger_status,
                        tx_hash = ?updated.tx_hash,
                        "anchor reconciled"
                    ),
                }
                Ok(action)
            }
            Err(StoreError::LedgerConflict { actual, .. }) => {
                debug!(consent_id = %record.id, ledger_status = %actual, "anchor moved concurrently; skipping");
                Ok(ReconcileAction::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }
}
