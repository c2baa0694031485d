//! Ledger maintenance commands

use super::print_json;
use crate::context::AppContext;
use anyhow::{bail, Result};
use medrelay_core::{ConsentId, LedgerClient, OwnerScope, TxHash};

pub async fn reconcile(ctx: &AppContext, id: Option<ConsentId>) -> Result<()> {
    if !ctx.ledger.is_configured() {
        bail!("ledger.contract_address is not configured; nothing to reconcile");
    }
    let reconciler = ctx.reconciler();
    match id {
        Some(id) => {
            let action = reconciler.reconcile_record(id).await?;
            print_json(&action)
        }
        None => {
            let report = reconciler.reconcile_all(&OwnerScope::All).await?;
            print_json(&report)
        }
    }
}

pub async fn verify_tx(ctx: &AppContext, tx_hash: &str) -> Result<()> {
    let hash = TxHash::new(tx_hash.trim());
    if !hash.is_well_formed() {
        bail!("{tx_hash} is not a 0x-prefixed 32-byte transaction hash");
    }
    let exists = ctx.ledger.verify_transaction(&hash).await?;
    println!("{hash} {}", if exists { "found" } else { "not found" });
    Ok(())
}
