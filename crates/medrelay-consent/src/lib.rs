//! MedRelay Consent - Lifecycle Coordination
//!
//! Coordinates a consent record across two substrates that fail
//! independently: the record store (authoritative) and the ledger
//! (tamper-evident anchor).
//!
//! - `ConsentCoordinator`: create, sign and reject with durable-write-then-anchor
//! - `AnchorReconciler`: re-drives `AnchorPending` / `AnchorFailed` anchors
//! - `AnchorPolicy`: whether rejections are anchored (default off)
//! - `LedgerAdvisory`: non-blocking ledger outcome returned with each record

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod advisory;
pub mod coordinator;
pub mod policy;
pub mod reconcile;
pub mod request;

pub use advisory::{ConsentOutcome, LedgerAdvisory};
pub use coordinator::ConsentCoordinator;
pub use policy::AnchorPolicy;
pub use reconcile::{AnchorReconciler, ReconcileAction, ReconcileReport};
pub use request::CreateConsentRequest;
