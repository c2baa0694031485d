//! Consent lifecycle across store and ledger failures

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use chrono::Duration as ChronoDuration;
use medrelay_consent::{AnchorPolicy, ConsentCoordinator, CreateConsentRequest, LedgerAdvisory};
use medrelay_core::{
    Confirmation, ConsentRecordStore, ConsentStatus, LedgerConsentId, LedgerReceipt, LedgerStatus,
    MedRelayError,
};
use medrelay_store::MemoryConsentStore;
use medrelay_testkit::{
    clinician, fixed_time, jane_doe, signer, tx_hash, FaultyStore, LedgerMode, ManualClock,
    ScriptedLedger,
};
use proptest::prelude::*;
use std::sync::Arc;

type Coordinator<S> = ConsentCoordinator<S, ScriptedLedger, ManualClock>;

fn coordinator<S: ConsentRecordStore>(store: &Arc<S>, ledger: &Arc<ScriptedLedger>) -> Coordinator<S> {
    ConsentCoordinator::new(
        Arc::clone(store),
        Arc::clone(ledger),
        Arc::new(ManualClock::ticking(fixed_time(0), ChronoDuration::seconds(1))),
    )
}

fn mri_request() -> CreateConsentRequest {
    CreateConsentRequest::new(jane_doe(), "MRI", "contrast study")
}

#[tokio::test]
async fn create_with_reachable_ledger_is_anchored() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger);

    let outcome = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap();

    let record = outcome.record;
    assert_eq!(record.status, ConsentStatus::Pending);
    assert_eq!(record.ledger_status, LedgerStatus::Anchored);
    assert!(record.tx_hash.as_ref().is_some_and(|hash| hash.is_well_formed()));
    assert_eq!(record.ledger_consent_id, Some(LedgerConsentId(1)));
    assert_eq!(outcome.advisory, None);
    assert_eq!(
        ledger.created_args(),
        vec![("Jane Doe".into(), "MRI".into(), "contrast study".into())]
    );
    assert_eq!(store.fetch_by_id(record.id).await.unwrap(), record);
}

#[tokio::test]
async fn create_without_contract_is_unanchored_and_quiet() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::unconfigured());
    let consents = coordinator(&store, &ledger);

    let outcome = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap();

    assert_eq!(outcome.record.ledger_status, LedgerStatus::Unanchored);
    assert_eq!(outcome.record.tx_hash, None);
    assert_eq!(outcome.advisory, None);
}

#[tokio::test]
async fn create_with_unavailable_ledger_persists_anchor_failed() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::unavailable());
    let consents = coordinator(&store, &ledger);

    let outcome = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap();

    assert_eq!(outcome.record.status, ConsentStatus::Pending);
    assert_eq!(outcome.record.ledger_status, LedgerStatus::AnchorFailed);
    assert_matches!(outcome.advisory, Some(LedgerAdvisory::Unavailable { .. }));
    let stored = store.fetch_by_id(outcome.record.id).await.unwrap();
    assert_eq!(stored.ledger_status, LedgerStatus::AnchorFailed);
}

#[tokio::test]
async fn create_with_unmined_write_is_anchor_pending() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::submitting());
    let consents = coordinator(&store, &ledger);

    let outcome = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap();

    assert_eq!(outcome.record.ledger_status, LedgerStatus::AnchorPending);
    assert!(outcome.record.tx_hash.is_some());
    assert_eq!(outcome.record.ledger_consent_id, None);
    assert_matches!(
        outcome.advisory,
        Some(LedgerAdvisory::AwaitingConfirmation { .. })
    );
}

#[tokio::test]
async fn create_fails_only_when_the_store_fails() {
    let store = Arc::new(FaultyStore::new(MemoryConsentStore::new()));
    store.fail_inserts(true);
    let ledger = Arc::new(ScriptedLedger::unavailable());
    let consents = coordinator(&store, &ledger);

    assert_matches!(
        consents.create_consent(mri_request(), &clinician()).await,
        Err(MedRelayError::StoreUnavailable { .. })
    );
    assert!(store.inner().is_empty().await);
}

#[tokio::test]
async fn invalid_request_never_reaches_the_ledger() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger);

    assert_matches!(
        consents
            .create_consent(CreateConsentRequest::new(jane_doe(), "MRI", "  "), &clinician())
            .await,
        Err(MedRelayError::Validation { .. })
    );
    assert_eq!(ledger.calls().create, 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn sign_anchors_the_signature() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger);
    let created = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap()
        .record;

    let outcome = consents.sign_consent(created.id, &signer()).await.unwrap();

    let record = outcome.record;
    assert_eq!(record.status, ConsentStatus::Signed);
    assert_eq!(record.signed_by, Some(signer().id));
    assert!(record.signed_at.unwrap() > record.created_at);
    assert_eq!(record.ledger_status, LedgerStatus::Anchored);
    assert_ne!(record.tx_hash, created.tx_hash);
    assert!(!created.decision_anchored);
    assert!(record.decision_anchored);
    assert!(ledger.is_signed_on_chain(LedgerConsentId(1)));
}

#[tokio::test]
async fn signing_twice_fails_without_touching_ledger_again() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger);
    let id = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap()
        .record
        .id;
    consents.sign_consent(id, &signer()).await.unwrap();
    let before = store.fetch_by_id(id).await.unwrap();

    let err = consents.sign_consent(id, &signer()).await.unwrap_err();

    assert_matches!(
        err,
        MedRelayError::InvalidStateTransition {
            from: ConsentStatus::Signed,
            to: ConsentStatus::Signed,
            ..
        }
    );
    assert_eq!(ledger.calls().sign, 1);
    assert_eq!(store.fetch_by_id(id).await.unwrap(), before);
}

#[tokio::test]
async fn signing_a_rejected_consent_fails() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger);
    let id = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap()
        .record
        .id;
    consents.reject_consent(id, &signer()).await.unwrap();
    let before = store.fetch_by_id(id).await.unwrap();

    assert_matches!(
        consents.sign_consent(id, &signer()).await,
        Err(MedRelayError::InvalidStateTransition {
            from: ConsentStatus::Rejected,
            ..
        })
    );
    assert_eq!(store.fetch_by_id(id).await.unwrap(), before);
    assert_eq!(ledger.calls().sign, 0);
}

#[tokio::test]
async fn ledger_outage_on_sign_keeps_the_signature() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger);
    let id = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap()
        .record
        .id;
    ledger.set_mode(LedgerMode::Unavailable);

    let outcome = consents.sign_consent(id, &signer()).await.unwrap();

    assert_eq!(outcome.record.status, ConsentStatus::Signed);
    assert_eq!(outcome.record.ledger_status, LedgerStatus::AnchorFailed);
    assert_eq!(outcome.record.ledger_consent_id, Some(LedgerConsentId(1)));
    assert_matches!(outcome.advisory, Some(LedgerAdvisory::Unavailable { .. }));
    assert_eq!(store.fetch_by_id(id).await.unwrap(), outcome.record);
}

#[tokio::test]
async fn confirmed_creation_with_unreadable_id_stays_anchored() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    ledger.push_create(Ok(LedgerReceipt {
        tx_hash: tx_hash(5),
        consent_id: None,
        confirmation: Confirmation::Confirmed,
    }));
    let consents = coordinator(&store, &ledger);

    let outcome = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap();

    assert_eq!(outcome.record.ledger_status, LedgerStatus::Anchored);
    assert_eq!(outcome.record.tx_hash, Some(tx_hash(5)));
    assert_eq!(outcome.record.ledger_consent_id, None);
    assert!(!outcome.record.decision_anchored);
    assert_eq!(outcome.advisory, Some(LedgerAdvisory::MissingLedgerConsentId));
}

#[tokio::test]
async fn sign_without_on_chain_id_is_left_for_reconciliation() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::unavailable());
    let consents = coordinator(&store, &ledger);
    let id = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap()
        .record
        .id;
    ledger.set_mode(LedgerMode::Confirming);

    let outcome = consents.sign_consent(id, &signer()).await.unwrap();

    assert_eq!(outcome.record.status, ConsentStatus::Signed);
    assert_eq!(outcome.record.ledger_status, LedgerStatus::AnchorFailed);
    assert_eq!(outcome.advisory, Some(LedgerAdvisory::MissingLedgerConsentId));
    assert_eq!(ledger.calls().sign, 0);
}

#[tokio::test]
async fn store_outage_after_decision_is_reported_not_raised() {
    let store = Arc::new(FaultyStore::new(MemoryConsentStore::new()));
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger);
    let id = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap()
        .record
        .id;
    store.fail_ledger_updates(true);

    let outcome = consents.sign_consent(id, &signer()).await.unwrap();

    assert_eq!(outcome.record.status, ConsentStatus::Signed);
    assert_matches!(
        outcome.advisory,
        Some(LedgerAdvisory::OutcomeNotRecorded { .. })
    );
    let stored = store.inner().fetch_by_id(id).await.unwrap();
    assert_eq!(stored.status, ConsentStatus::Signed);
    assert_eq!(stored.ledger_status, LedgerStatus::Anchored);
}

#[tokio::test]
async fn rejection_skips_the_ledger_by_default() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger);
    let id = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap()
        .record
        .id;
    let calls_before = ledger.calls();

    let outcome = consents.reject_consent(id, &signer()).await.unwrap();

    assert_eq!(outcome.record.status, ConsentStatus::Rejected);
    assert_eq!(outcome.record.rejected_by, Some(signer().id));
    assert_eq!(outcome.record.ledger_status, LedgerStatus::Anchored);
    assert_eq!(ledger.calls(), calls_before);
}

#[tokio::test]
async fn rejection_anchoring_checks_the_contract_when_enabled() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger).with_policy(AnchorPolicy {
        anchor_rejections: true,
    });
    let id = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap()
        .record
        .id;

    let outcome = consents.reject_consent(id, &signer()).await.unwrap();

    assert_eq!(outcome.record.ledger_status, LedgerStatus::Anchored);
    assert_eq!(outcome.advisory, None);
    assert_eq!(ledger.calls().consent_status, 1);
    assert_eq!(ledger.calls().sign, 0);
}

#[tokio::test]
async fn rejection_anchoring_flags_a_signed_contract() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger).with_policy(AnchorPolicy {
        anchor_rejections: true,
    });
    let id = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap()
        .record
        .id;
    ledger.seed_consent(LedgerConsentId(1), true);

    let outcome = consents.reject_consent(id, &signer()).await.unwrap();

    assert_eq!(outcome.record.status, ConsentStatus::Rejected);
    assert_eq!(outcome.record.ledger_status, LedgerStatus::AnchorFailed);
    assert_matches!(outcome.advisory, Some(LedgerAdvisory::Rejected { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sign_and_reject_have_one_winner() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger);

    for _ in 0..20 {
        let id = consents
            .create_consent(mri_request(), &clinician())
            .await
            .unwrap()
            .record
            .id;

        let (sign_actor, reject_actor) = (signer(), signer());
        let (sign, reject) = tokio::join!(
            consents.sign_consent(id, &sign_actor),
            consents.reject_consent(id, &reject_actor)
        );

        let (winner, loser) = match (sign, reject) {
            (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
            other => panic!("expected exactly one winner, got {other:?}"),
        };
        assert_matches!(loser, MedRelayError::InvalidStateTransition { .. });

        let stored = store.fetch_by_id(id).await.unwrap();
        assert_eq!(stored.status, winner.record.status);
        assert!(stored.status.is_terminal());
    }
}

#[tokio::test]
async fn blank_actor_cannot_decide() {
    let store = Arc::new(MemoryConsentStore::new());
    let ledger = Arc::new(ScriptedLedger::confirming());
    let consents = coordinator(&store, &ledger);
    let id = consents
        .create_consent(mri_request(), &clinician())
        .await
        .unwrap()
        .record
        .id;
    let mut anonymous = signer();
    anonymous.id = "".into();

    assert_matches!(
        consents.sign_consent(id, &anonymous).await,
        Err(MedRelayError::Validation { .. })
    );
    assert_eq!(
        store.fetch_by_id(id).await.unwrap().status,
        ConsentStatus::Pending
    );
}

fn scripted_ledger(mode: u8) -> ScriptedLedger {
    match mode {
        0 => ScriptedLedger::confirming(),
        1 => ScriptedLedger::submitting(),
        2 => ScriptedLedger::unavailable(),
        3 => ScriptedLedger::rejecting(),
        _ => ScriptedLedger::unconfigured(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Whatever the ledger does, the first decision is final and later
    /// decisions are refused without changing the stored status.
    #[test]
    fn first_decision_is_final(mode in 0u8..5, decisions in prop::collection::vec(any::<bool>(), 1..6)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let store = Arc::new(MemoryConsentStore::new());
            let ledger = Arc::new(scripted_ledger(mode));
            let consents = coordinator(&store, &ledger);
            let id = consents
                .create_consent(mri_request(), &clinician())
                .await
                .unwrap()
                .record
                .id;

            let expected = if decisions[0] {
                ConsentStatus::Signed
            } else {
                ConsentStatus::Rejected
            };
            for (attempt, sign) in decisions.iter().enumerate() {
                let result = if *sign {
                    consents.sign_consent(id, &signer()).await
                } else {
                    consents.reject_consent(id, &signer()).await
                };
                if attempt == 0 {
                    assert_eq!(result.unwrap().record.status, expected);
                } else {
                    assert_matches!(result, Err(MedRelayError::InvalidStateTransition { .. }));
                }
                assert_eq!(store.fetch_by_id(id).await.unwrap().status, expected);
            }
        });
    }
}
