//! Consent contract client
//!
//! Writes are sent with `eth_sendTransaction` from a node-managed account and
//! then followed by a bounded receipt poll. The poll only observes the one
//! transaction that was sent; the write itself is never repeated. A receipt
//! that does not show up in time yields a `Submitted` receipt carrying the
//! hash, which reconciliation picks up later.

use crate::abi::{self, AbiError};
use crate::rpc::{HttpRpcTransport, RpcError, RpcTransport};
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use medrelay_core::config::is_evm_address;
use medrelay_core::{
    Confirmation, LedgerClient, LedgerConfig, LedgerConsentId, LedgerError, LedgerReceipt,
    PhysicalClock, ReceiptStatus, SystemClock, TxHash,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// JSON-RPC error codes that carry contract reverts
const REVERT_CODES: [i64; 2] = [3, -32000];

/// Ledger client for the consent contract
#[derive(Debug, Clone)]
pub struct EthLedgerClient<T, C> {
    transport: Arc<T>,
    clock: Arc<C>,
    /// `None` means the ledger is disabled for this deployment
    contract: Option<String>,
    from: Option<String>,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl EthLedgerClient<HttpRpcTransport, SystemClock> {
    /// Build an HTTP client from deployment configuration
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let transport = HttpRpcTransport::new(&config.rpc_url, config.request_timeout())
            .map_err(|e| LedgerError::unavailable(e.to_string()))?;
        Ok(Self::new(Arc::new(transport), Arc::new(SystemClock), config))
    }
}

impl<T: RpcTransport, C: PhysicalClock> EthLedgerClient<T, C> {
    pub fn new(transport: Arc<T>, clock: Arc<C>, config: &LedgerConfig) -> Self {
        Self {
            transport,
            clock,
            contract: config.contract().map(str::to_ascii_lowercase),
            from: config
                .from_address
                .as_deref()
                .map(str::trim)
                .filter(|from| !from.is_empty())
                .map(str::to_ascii_lowercase),
            confirmation_timeout: config.confirmation_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    fn contract(&self) -> Result<&str, LedgerError> {
        match self.contract.as_deref() {
            Some(contract) => Ok(contract),
            None => {
                debug!("ledger not configured; skipping contract call");
                Err(LedgerError::Unconfigured)
            }
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        self.transport
            .call(method, params)
            .await
            .map_err(map_rpc_error)
    }

    async fn sender(&self) -> Result<String, LedgerError> {
        if let Some(from) = &self.from {
            return Ok(from.clone());
        }
        let accounts = self.rpc("eth_accounts", json!([])).await?;
        accounts
            .as_array()
            .and_then(|accounts| accounts.first())
            .and_then(Value::as_str)
            .filter(|account| is_evm_address(account))
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| LedgerError::unavailable("ledger node exposes no signer account"))
    }

    async fn send(&self, contract: &str, data: Vec<u8>) -> Result<TxHash, LedgerError> {
        let from = self.sender().await?;
        let result = self
            .rpc(
                "eth_sendTransaction",
                json!([{ "from": from, "to": contract, "data": abi::to_hex(&data) }]),
            )
            .await?;
        let hash = result
            .as_str()
            .map(TxHash::new)
            .filter(TxHash::is_well_formed)
            .ok_or_else(|| {
                LedgerError::unavailable(format!("unexpected transaction hash: {result}"))
            })?;
        debug!(tx_hash = %hash, "transaction submitted");
        Ok(hash)
    }

    async fn fetch_receipt(&self, tx_hash: &TxHash) -> Result<Option<Value>, LedgerError> {
        let receipt = self
            .rpc("eth_getTransactionReceipt", json!([tx_hash.as_str()]))
            .await?;
        Ok((!receipt.is_null()).then_some(receipt))
    }

    /// Poll for the receipt until the confirmation timeout elapses.
    ///
    /// Poll failures after submission are not write failures: the transaction
    /// was accepted, so they end the wait and leave it unconfirmed.
    async fn await_receipt(&self, tx_hash: &TxHash) -> Option<Value> {
        let started = self.clock.now();
        let timeout = ChronoDuration::from_std(self.confirmation_timeout)
            .unwrap_or_else(|_| ChronoDuration::zero());

        loop {
            match self.fetch_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Some(receipt),
                Ok(None) => {}
                Err(e) => {
                    debug!(tx_hash = %tx_hash, error = %e, "receipt poll failed");
                    return None;
                }
            }
            if self.clock.now() - started >= timeout {
                debug!(tx_hash = %tx_hash, "receipt not observed before confirmation timeout");
                return None;
            }
            self.clock.sleep(self.poll_interval).await;
        }
    }

    async fn write(
        &self,
        contract: &str,
        data: Vec<u8>,
        expect_consent_id: bool,
    ) -> Result<LedgerReceipt, LedgerError> {
        let tx_hash = self.send(contract, data).await?;

        let Some(receipt) = self.await_receipt(&tx_hash).await else {
            return Ok(LedgerReceipt {
                tx_hash,
                consent_id: None,
                confirmation: Confirmation::Submitted,
            });
        };

        if receipt_reverted(&receipt) {
            return Err(LedgerError::rejected(format!(
                "transaction {tx_hash} reverted"
            )));
        }

        let consent_id = if expect_consent_id {
            consent_id_from_logs(&receipt, contract)
        } else {
            None
        };
        info!(tx_hash = %tx_hash, consent_id = ?consent_id, "ledger write confirmed");
        Ok(LedgerReceipt {
            tx_hash,
            consent_id,
            confirmation: Confirmation::Confirmed,
        })
    }
}

#[async_trait]
impl<T: RpcTransport, C: PhysicalClock> LedgerClient for EthLedgerClient<T, C> {
    fn is_configured(&self) -> bool {
        self.contract.is_some()
    }

    async fn create_on_chain(
        &self,
        patient_id: &str,
        procedure_type: &str,
        description: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        let contract = self.contract()?;
        let data = abi::encode_create_consent(patient_id, procedure_type, description);
        self.write(contract, data, true).await
    }

    async fn sign_on_chain(
        &self,
        consent_id: LedgerConsentId,
    ) -> Result<LedgerReceipt, LedgerError> {
        let contract = self.contract()?;
        let data = abi::encode_sign_consent(consent_id);
        self.write(contract, data, false).await
    }

    async fn consent_status(&self, consent_id: LedgerConsentId) -> Result<bool, LedgerError> {
        let contract = self.contract()?;
        let data = abi::encode_get_consent_status(consent_id);
        let result = self
            .rpc(
                "eth_call",
                json!([{ "to": contract, "data": abi::to_hex(&data) }, "latest"]),
            )
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| LedgerError::unavailable(format!("unexpected call result: {result}")))?;
        abi::from_hex(raw)
            .and_then(|bytes| abi::decode_bool(&bytes))
            .map_err(map_abi_error)
    }

    async fn receipt_status(&self, tx_hash: &TxHash) -> Result<ReceiptStatus, LedgerError> {
        let contract = self.contract()?;
        Ok(match self.fetch_receipt(tx_hash).await? {
            None => ReceiptStatus::NotFound,
            Some(receipt) if receipt_reverted(&receipt) => ReceiptStatus::Reverted,
            Some(receipt) => ReceiptStatus::Confirmed {
                consent_id: consent_id_from_logs(&receipt, contract),
            },
        })
    }

    async fn verify_transaction(&self, tx_hash: &TxHash) -> Result<bool, LedgerError> {
        let tx = self
            .rpc("eth_getTransactionByHash", json!([tx_hash.as_str()]))
            .await?;
        Ok(!tx.is_null())
    }
}

fn map_rpc_error(error: RpcError) -> LedgerError {
    match error {
        RpcError::Rpc { code, message }
            if REVERT_CODES.contains(&code) && message.to_ascii_lowercase().contains("revert") =>
        {
            LedgerError::rejected(message)
        }
        other => LedgerError::unavailable(other.to_string()),
    }
}

fn map_abi_error(error: AbiError) -> LedgerError {
    LedgerError::unavailable(format!("undecodable contract result: {error}"))
}

fn receipt_reverted(receipt: &Value) -> bool {
    matches!(receipt.get("status").and_then(Value::as_str), Some("0x0" | "0x00"))
}

/// On-chain consent id from the first log emitted by the contract
fn consent_id_from_logs(receipt: &Value, contract: &str) -> Option<LedgerConsentId> {
    let log = receipt.get("logs")?.as_array()?.iter().find(|log| {
        log.get("address")
            .and_then(Value::as_str)
            .is_some_and(|address| address.eq_ignore_ascii_case(contract))
    })?;

    let word = log
        .get("topics")
        .and_then(Value::as_array)
        .and_then(|topics| topics.get(1))
        .and_then(Value::as_str)
        .or_else(|| log.get("data").and_then(Value::as_str))?;

    abi::from_hex(word)
        .and_then(|bytes| abi::decode_u64(&bytes))
        .ok()
        .map(LedgerConsentId)
}
