//! Consent lifecycle coordinator
//!
//! The only writer of `ConsentRecord::status`. Every operation follows
//! "durable write, then best-effort anchor":
//!
//! 1. Create calls the ledger once with the pre-allocated record id, then
//!    inserts the record carrying whatever anchor state resulted. The insert
//!    is the commit point.
//! 2. Sign and reject commit the status change through the store's
//!    compare-and-swap first, and only then touch the ledger.
//!
//! Ledger outcomes are written back with a compare-and-swap on the ledger
//! axis and returned as advisories. They never fail the operation.

use crate::advisory::{failure_update, receipt_update, ConsentOutcome, LedgerAdvisory};
use crate::policy::AnchorPolicy;
use crate::request::CreateConsentRequest;
use medrelay_core::{
    ActorProfile, ConsentId, ConsentRecord, ConsentRecordStore, ConsentStatus, LedgerClient,
    LedgerError, LedgerStatus, LedgerUpdate, MedRelayError, MedRelayResult, OwnerScope,
    PhysicalClock, StatusTransition, StoreError,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Orchestrates create, sign and reject across the store and the ledger
pub struct ConsentCoordinator<S, L, C> {
    store: Arc<S>,
    ledger: Arc<L>,
    clock: Arc<C>,
    policy: AnchorPolicy,
}

impl<S, L, C> Clone for ConsentCoordinator<S, L, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ledger: Arc::clone(&self.ledger),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
        }
    }
}

impl<S, L, C> ConsentCoordinator<S, L, C>
where
    S: ConsentRecordStore,
    L: LedgerClient,
    C: PhysicalClock,
{
    /// Create a coordinator with the default policy (rejections not anchored)
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

    pub fn policy(&self) -> AnchorPolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Open a `Pending` consent and anchor its creation best-effort.
    ///
    /// Fails only on invalid input or a store failure.
    pub async fn create_consent(
        &self,
        request: CreateConsentRequest,
        issuer: &ActorProfile,
    ) -> MedRelayResult<ConsentOutcome> {
        let id = ConsentId::new();
        let draft = request.into_draft(id, issuer)?;

        let created = self
            .ledger
            .create_on_chain(draft.patient.as_str(), &draft.procedure_type, &draft.description)
            .await;
        let (anchor, advisory) = match created {
            Ok(receipt) => receipt_update(receipt, None),
            Err(error) => match failure_update(&error, None) {
                Some((update, advisory)) => (update, Some(advisory)),
                None => {
                    debug!(consent_id = %id, "ledger not configured; consent stays unanchored");
                    (LedgerUpdate::default(), None)
                }
            },
        };
        if let Some(advisory) = advisory.as_ref().filter(|advisory| advisory.is_failure()) {
            if anchor.status == LedgerStatus::Anchored {
                warn!(consent_id = %id, %advisory, "creation anchored but its on-chain consent id is unknown");
            } else {
                warn!(consent_id = %id, %advisory, "consent created without a ledger anchor");
            }
        }

        let record = ConsentRecord::pending(draft, self.clock.now(), anchor);
        if let Err(e) = self.store.insert_record(record.clone()).await {
            error!(
                consent_id = %id,
                tx_hash = ?record.tx_hash,
                error = %e,
                "failed to persist consent record"
            );
            return Err(e.into());
        }

        info!(
            consent_id = %id,
            patient = %record.patient,
            issuer = %issuer.id,
            ledger_status = %record.ledger_status,
            "consent created"
        );
        Ok(ConsentOutcome::new(record, advisory))
    }

    /// Sign a `Pending` consent, then anchor the signature best-effort.
    pub async fn sign_consent(
        &self,
        id: ConsentId,
        signer: &ActorProfile,
    ) -> MedRelayResult<ConsentOutcome> {
        self.decide(id, signer, ConsentStatus::Signed).await
    }

    /// Reject a `Pending` consent. Anchored only when the policy says so.
    pub async fn reject_consent(
        &self,
        id: ConsentId,
        signer: &ActorProfile,
    ) -> MedRelayResult<ConsentOutcome> {
        self.decide(id, signer, ConsentStatus::Rejected).await
    }

    pub async fn get_consent(&self, id: ConsentId) -> MedRelayResult<ConsentRecord> {
        Ok(self.store.fetch_by_id(id).await?)
    }

    pub async fn list_consents(&self, scope: &OwnerScope) -> MedRelayResult<Vec<ConsentRecord>> {
        Ok(self.store.list_by_filter(scope).await?)
    }

    async fn decide(
        &self,
        id: ConsentId,
        actor: &ActorProfile,
        to: ConsentStatus,
    ) -> MedRelayResult<ConsentOutcome> {
        if actor.id.is_blank() {
            return Err(MedRelayError::validation(
                "decisions require an authenticated actor",
            ));
        }

        let current = self.store.fetch_by_id(id).await?;
        if current.status != ConsentStatus::Pending {
            return Err(MedRelayError::invalid_transition(id, current.status, to));
        }

        let transition = StatusTransition {
            to,
            at: self.clock.now(),
            by: actor.id.clone(),
        };
        let record = match self
            .store
            .update_status(id, ConsentStatus::Pending, transition)
            .await
        {
            Ok(record) => record,
            Err(StoreError::Conflict { actual, .. }) => {
                info!(consent_id = %id, status = %actual, "decision lost to a concurrent update");
                return Err(MedRelayError::invalid_transition(id, actual, to));
            }
            Err(e) => {
                error!(consent_id = %id, error = %e, "failed to persist consent decision");
                return Err(e.into());
            }
        };

        info!(
            consent_id = %id,
            status = %record.status,
            actor = %actor.id,
            role = %actor.role,
            "consent decided"
        );

        if !self.policy.anchors_decision(&record) {
            return Ok(ConsentOutcome::new(record, None));
        }
        Ok(self.anchor_decision(record).await)
    }

    async fn anchor_decision(&self, record: ConsentRecord) -> ConsentOutcome {
        let Some(ledger_id) = record.ledger_consent_id else {
            return self.anchor_without_ledger_id(record).await;
        };

        let attempt = match record.status {
            ConsentStatus::Signed => self
                .ledger
                .sign_on_chain(ledger_id)
                .await
                .map(|receipt| receipt_update(receipt, Some(ledger_id))),
            ConsentStatus::Rejected => {
                self.ledger
                    .consent_status(ledger_id)
                    .await
                    .and_then(|signed_on_chain| {
                        if signed_on_chain {
                            Err(LedgerError::rejected("ledger shows the consent as signed"))
                        } else {
                            Ok((
                                LedgerUpdate {
                                    status: LedgerStatus::Anchored,
                                    tx_hash: None,
                                    ledger_consent_id: Some(ledger_id),
                                    decision_anchored: true,
                                },
                                None,
                            ))
                        }
                    })
            }
            ConsentStatus::Pending => return ConsentOutcome::new(record, None),
        };

        let (update, advisory) = match attempt {
            Ok(outcome) => outcome,
            Err(error) => match failure_update(&error, Some(ledger_id)) {
                Some((update, advisory)) => (update, Some(advisory)),
                None => {
                    debug!(consent_id = %record.id, "ledger not configured; decision not anchored");
                    return ConsentOutcome::new(record, None);
                }
            },
        };
        self.record_anchor(record, update, advisory).await
    }

    async fn anchor_without_ledger_id(&self, record: ConsentRecord) -> ConsentOutcome {
        if !self.ledger.is_configured() {
            debug!(consent_id = %record.id, "ledger not configured; decision not anchored");
            return ConsentOutcome::new(record, None);
        }
        if record.ledger_status == LedgerStatus::AnchorPending {
            // creation still in flight; reconciliation anchors the decision once it lands
            let advisory = record
                .tx_hash
                .clone()
                .map(|tx_hash| LedgerAdvisory::AwaitingConfirmation { tx_hash });
            return ConsentOutcome::new(record, advisory);
        }
        self.record_anchor(
            record,
            LedgerUpdate::status(LedgerStatus::AnchorFailed),
            Some(LedgerAdvisory::MissingLedgerConsentId),
        )
        .await
    }

    async fn record_anchor(
        &self,
        record: ConsentRecord,
        update: LedgerUpdate,
        advisory: Option<LedgerAdvisory>,
    ) -> ConsentOutcome {
        if let Some(advisory) = advisory.as_ref().filter(|advisory| advisory.is_failure()) {
            warn!(consent_id = %record.id, %advisory, "ledger anchoring failed; decision kept");
        }

        match self
            .store
            .update_ledger(record.id, record.ledger_status, update, self.clock.now())
            .await
        {
            Ok(updated) => {
                info!(
                    consent_id = %updated.id,
                    ledger_status = %updated.ledger_status,
                    tx_hash = ?updated.tx_hash,
                    "anchor state recorded"
                );
                ConsentOutcome::new(updated, advisory)
            }
            Err(StoreError::LedgerConflict { actual, .. }) => {
                debug!(consent_id = %record.id, ledger_status = %actual, "anchor updated concurrently");
                let fresh = self.store.fetch_by_id(record.id).await.unwrap_or(record);
                ConsentOutcome::new(fresh, advisory)
            }
            Err(e) => {
                error!(consent_id = %record.id, error = %e, "failed to record anchor outcome");
                ConsentOutcome::new(
                    record,
                    Some(LedgerAdvisory::OutcomeNotRecorded {
                        reason: e.to_string(),
                    }),
                )
            }
        }
    }
}
