//! MedRelay Ledger - Consent Contract Client
//!
//! `EthLedgerClient` implements the `LedgerClient` effect against an
//! Ethereum-compatible node over JSON-RPC:
//!
//! - writes (`createConsent`, `signConsent`) via `eth_sendTransaction`
//! - reads (`getConsentStatus`) via `eth_call`
//! - confirmation via a bounded `eth_getTransactionReceipt` poll
//!
//! Every operation is a single attempt. Without a contract address the client
//! is inert and answers `LedgerError::Unconfigured` without touching the
//! network.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod abi;
pub mod client;
pub mod rpc;

pub use client::EthLedgerClient;
pub use rpc::{HttpRpcTransport, RpcError, RpcTransport};
