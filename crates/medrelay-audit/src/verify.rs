//! Ledger verification of audit proofs
//!
//! Verification raises display confidence only. A failed lookup leaves the
//! proof unverified and the event in place.

use crate::event::AuditEvent;
use medrelay_core::{LedgerClient, LedgerError, TxHash};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Ask the ledger about every distinct transaction hash in `events` and
/// record the answer on each proof. Returns the events in their original order.
pub async fn verify_proofs<L>(mut events: Vec<AuditEvent>, ledger: &L) -> Vec<AuditEvent>
where
    L: LedgerClient + ?Sized,
{
    let mut answers: HashMap<TxHash, Option<bool>> = HashMap::new();
    for event in &mut events {
        let Some(proof) = event.proof.as_mut() else {
            continue;
        };
        let verified = match answers.get(&proof.tx_hash) {
            Some(known) => *known,
            None => {
                let answer = match ledger.verify_transaction(&proof.tx_hash).await {
                    Ok(found) => Some(found),
                    Err(LedgerError::Unconfigured) => {
                        debug!(tx_hash = %proof.tx_hash, "ledger not configured; proof left unverified");
                        None
                    }
                    Err(error) => {
                        warn!(
                            tx_hash = %proof.tx_hash,
                            error = %error,
                            "could not verify audit proof"
                        );
                        None
                    }
                };
                answers.insert(proof.tx_hash.clone(), answer);
                answer
            }
        };
        proof.verified = verified;
    }
    events
}
