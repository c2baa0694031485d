//! Scripted ledger client
//!
//! Simulates a consent contract in memory. The default behaviour comes from a
//! `LedgerMode`; individual outcomes can be queued ahead of it with
//! `push_create` / `push_sign`. Every call is counted so tests can assert the
//! ledger was (or was not) contacted.
//!
//! # Blocking Lock Usage
//!
//! Uses `std::sync::Mutex`: locks are never held across an await point.

#![allow(clippy::disallowed_types)]

use async_trait::async_trait;
use medrelay_core::{
    Confirmation, LedgerClient, LedgerConsentId, LedgerError, LedgerReceipt, ReceiptStatus, TxHash,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Default outcome for writes that have nothing queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerMode {
    /// Writes are mined before the call returns
    Confirming,
    /// Writes are accepted but stay unmined until `mine_pending`
    Submitting,
    /// Every call fails with `Unavailable`
    Unavailable,
    /// Every write reverts
    Rejecting,
}

/// Per-operation invocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCalls {
    pub create: usize,
    pub sign: usize,
    pub consent_status: usize,
    pub receipt_status: usize,
    pub verify: usize,
}

impl LedgerCalls {
    /// Number of state-changing calls
    pub fn writes(&self) -> usize {
        self.create + self.sign
    }
}

#[derive(Debug)]
struct LedgerState {
    mode: LedgerMode,
    create_queue: VecDeque<Result<LedgerReceipt, LedgerError>>,
    sign_queue: VecDeque<Result<LedgerReceipt, LedgerError>>,
    /// On-chain consents and their signed flag
    consents: HashMap<LedgerConsentId, bool>,
    /// Mined transactions
    mined: HashMap<TxHash, ReceiptStatus>,
    /// Accepted but unmined transactions
    pending: HashMap<TxHash, Option<LedgerConsentId>>,
    next_consent_id: u64,
    next_tx: u64,
    calls: LedgerCalls,
    created_args: Vec<(String, String, String)>,
}

/// Scripted `LedgerClient` for deterministic testing
#[derive(Debug, Clone)]
pub struct ScriptedLedger {
    configured: bool,
    state: Arc<Mutex<LedgerState>>,
}

impl ScriptedLedger {
    pub fn new(mode: LedgerMode) -> Self {
        Self {
            configured: true,
            state: Arc::new(Mutex::new(LedgerState {
                mode,
                create_queue: VecDeque::new(),
                sign_queue: VecDeque::new(),
                consents: HashMap::new(),
                mined: HashMap::new(),
                pending: HashMap::new(),
                next_consent_id: 1,
                next_tx: 1,
                calls: LedgerCalls::default(),
                created_args: Vec::new(),
            })),
        }
    }

    pub fn confirming() -> Self {
        Self::new(LedgerMode::Confirming)
    }

    pub fn submitting() -> Self {
        Self::new(LedgerMode::Submitting)
    }

    pub fn unavailable() -> Self {
        Self::new(LedgerMode::Unavailable)
    }

    pub fn rejecting() -> Self {
        Self::new(LedgerMode::Rejecting)
    }

    /// No contract address: every contract call returns `Unconfigured`
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::confirming()
        }
    }

    /// Switch the default behaviour (e.g. the node comes back)
    pub fn set_mode(&self, mode: LedgerMode) {
        self.state.lock().unwrap().mode = mode;
    }

    /// Queue the outcome of the next `create_on_chain`
    pub fn push_create(&self, outcome: Result<LedgerReceipt, LedgerError>) {
        self.state.lock().unwrap().create_queue.push_back(outcome);
    }

    /// Queue the outcome of the next `sign_on_chain`
    pub fn push_sign(&self, outcome: Result<LedgerReceipt, LedgerError>) {
        self.state.lock().unwrap().sign_queue.push_back(outcome);
    }

    /// Mine every submitted transaction
    pub fn mine_pending(&self) {
        let mut state = self.state.lock().unwrap();
        let pending: Vec<_> = state.pending.drain().collect();
        for (hash, consent_id) in pending {
            state
                .mined
                .insert(hash, ReceiptStatus::Confirmed { consent_id });
        }
    }

    /// Seed an on-chain consent directly (e.g. created by another process)
    pub fn seed_consent(&self, id: LedgerConsentId, signed: bool) {
        self.state.lock().unwrap().consents.insert(id, signed);
    }

    pub fn is_signed_on_chain(&self, id: LedgerConsentId) -> bool {
        self.state
            .lock()
            .unwrap()
            .consents
            .get(&id)
            .copied()
            .unwrap_or(false)
    }

    pub fn calls(&self) -> LedgerCalls {
        self.state.lock().unwrap().calls
    }

    /// Arguments of every `create_on_chain` call, in order
    pub fn created_args(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().created_args.clone()
    }

    fn next_hash(state: &mut LedgerState) -> TxHash {
        let hash = TxHash::new(format!("0x{:064x}", 0xc0de_0000_u64 + state.next_tx));
        state.next_tx += 1;
        hash
    }

    /// Outcome of a write with nothing queued, per the current mode
    fn default_write(
        state: &mut LedgerState,
        consent_id: Option<LedgerConsentId>,
    ) -> Result<LedgerReceipt, LedgerError> {
        match state.mode {
            LedgerMode::Unavailable => Err(LedgerError::unavailable("connection refused")),
            LedgerMode::Rejecting => Err(LedgerError::rejected("execution reverted")),
            LedgerMode::Confirming => {
                let tx_hash = Self::next_hash(state);
                state
                    .mined
                    .insert(tx_hash.clone(), ReceiptStatus::Confirmed { consent_id });
                Ok(LedgerReceipt {
                    tx_hash,
                    consent_id,
                    confirmation: Confirmation::Confirmed,
                })
            }
            LedgerMode::Submitting => {
                let tx_hash = Self::next_hash(state);
                state.pending.insert(tx_hash.clone(), consent_id);
                Ok(LedgerReceipt {
                    tx_hash,
                    consent_id: None,
                    confirmation: Confirmation::Submitted,
                })
            }
        }
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn create_on_chain(
        &self,
        patient_id: &str,
        procedure_type: &str,
        description: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.calls.create += 1;
        if !self.configured {
            return Err(LedgerError::Unconfigured);
        }
        state.created_args.push((
            patient_id.to_string(),
            procedure_type.to_string(),
            description.to_string(),
        ));
        if let Some(outcome) = state.create_queue.pop_front() {
            return outcome;
        }

        let consent_id = LedgerConsentId(state.next_consent_id);
        let outcome = Self::default_write(&mut state, Some(consent_id));
        if outcome.is_ok() {
            state.next_consent_id += 1;
            state.consents.insert(consent_id, false);
        }
        outcome
    }

    async fn sign_on_chain(
        &self,
        consent_id: LedgerConsentId,
    ) -> Result<LedgerReceipt, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.calls.sign += 1;
        if !self.configured {
            return Err(LedgerError::Unconfigured);
        }
        if let Some(outcome) = state.sign_queue.pop_front() {
            return outcome;
        }
        if state.mode == LedgerMode::Unavailable {
            return Err(LedgerError::unavailable("connection refused"));
        }
        match state.consents.get(&consent_id) {
            None => return Err(LedgerError::rejected("execution reverted: unknown consent")),
            Some(true) => return Err(LedgerError::rejected("execution reverted: already signed")),
            Some(false) => {}
        }

        let outcome = Self::default_write(&mut state, None);
        if outcome.is_ok() {
            state.consents.insert(consent_id, true);
        }
        outcome
    }

    async fn consent_status(&self, consent_id: LedgerConsentId) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.calls.consent_status += 1;
        if !self.configured {
            return Err(LedgerError::Unconfigured);
        }
        if state.mode == LedgerMode::Unavailable {
            return Err(LedgerError::unavailable("connection refused"));
        }
        Ok(state.consents.get(&consent_id).copied().unwrap_or(false))
    }

    async fn receipt_status(&self, tx_hash: &TxHash) -> Result<ReceiptStatus, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.calls.receipt_status += 1;
        if !self.configured {
            return Err(LedgerError::Unconfigured);
        }
        if state.mode == LedgerMode::Unavailable {
            return Err(LedgerError::unavailable("connection refused"));
        }
        Ok(state
            .mined
            .get(tx_hash)
            .cloned()
            .unwrap_or(ReceiptStatus::NotFound))
    }

    async fn verify_transaction(&self, tx_hash: &TxHash) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.calls.verify += 1;
        if state.mode == LedgerMode::Unavailable {
            return Err(LedgerError::unavailable("connection refused"));
        }
        Ok(state.mined.contains_key(tx_hash) || state.pending.contains_key(tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn confirming_ledger_assigns_sequential_ids() {
        let ledger = ScriptedLedger::confirming();
        let first = ledger.create_on_chain("p1", "MRI", "scan").await.unwrap();
        let second = ledger.create_on_chain("p2", "CT", "scan").await.unwrap();

        assert!(first.is_confirmed());
        assert_eq!(first.consent_id, Some(LedgerConsentId(1)));
        assert_eq!(second.consent_id, Some(LedgerConsentId(2)));
        assert!(ledger.verify_transaction(&first.tx_hash).await.unwrap());
    }

    #[tokio::test]
    async fn submitted_writes_confirm_after_mining() {
        let ledger = ScriptedLedger::submitting();
        let receipt = ledger.create_on_chain("p1", "MRI", "scan").await.unwrap();
        assert_eq!(
            ledger.receipt_status(&receipt.tx_hash).await.unwrap(),
            ReceiptStatus::NotFound
        );

        ledger.mine_pending();
        assert_matches!(
            ledger.receipt_status(&receipt.tx_hash).await.unwrap(),
            ReceiptStatus::Confirmed { consent_id: Some(LedgerConsentId(1)) }
        );
    }

    #[tokio::test]
    async fn second_signature_reverts() {
        let ledger = ScriptedLedger::confirming();
        let created = ledger.create_on_chain("p1", "MRI", "scan").await.unwrap();
        let id = created.consent_id.unwrap();

        ledger.sign_on_chain(id).await.unwrap();
        assert_matches!(ledger.sign_on_chain(id).await, Err(LedgerError::Rejected { .. }));
        assert!(ledger.consent_status(id).await.unwrap());
    }

    #[tokio::test]
    async fn unconfigured_ledger_counts_but_refuses() {
        let ledger = ScriptedLedger::unconfigured();
        assert!(!ledger.is_configured());
        assert_matches!(
            ledger.create_on_chain("p1", "MRI", "scan").await,
            Err(LedgerError::Unconfigured)
        );
        assert_eq!(ledger.calls().create, 1);
        assert!(ledger.created_args().is_empty());
    }
}
