//! MedRelay Core - Consent Domain Foundation
//!
//! This crate holds the shared vocabulary of the MedRelay workspace: the
//! consent record and its two state axes, the effect interfaces every
//! substrate is reached through, the unified error type and deployment
//! configuration. It contains no I/O beyond the system clock.
//!
//! # Layers
//!
//! ## Domain Types
//! - `ConsentRecord`: legal `status` axis plus an independent `ledger_status`
//! - `ActorProfile` / `Role`: who acted, as resolved by the identity provider
//! - `OwnerScope`: row-level visibility filter
//!
//! ## Effect Interfaces
//! - `ConsentRecordStore`: compare-and-swap persistence (authoritative)
//! - `LedgerClient`: single-attempt anchoring (best effort)
//! - `IdentityProvider`: sign-in and profile lookup
//! - `PhysicalClock`: timestamps and backoff sleeps
//!
//! ## Contracts
//! - The store is written before the ledger is touched for any transition
//! - `Signed` and `Rejected` are terminal
//! - Ledger failures surface as record state, never as operation errors

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Actors and roles
pub mod actor;

/// Consent record, status axes and compare-and-swap helpers
pub mod consent;

/// Deployment configuration
pub mod config;

/// Effect interfaces (no implementations beyond the system clock)
pub mod effects;

/// Unified error handling
pub mod errors;

/// Consent, patient, actor and ledger identifiers
pub mod identifiers;

/// Row-level visibility scopes
pub mod scope;

pub use actor::{ActorProfile, Role};
pub use config::{
    IdentityConfig, LedgerConfig, LoggingConfig, MedRelayConfig, PolicyConfig, SessionConfig,
    StoreConfig,
};
pub use consent::{
    ConsentDraft, ConsentRecord, ConsentStatus, LedgerStatus, LedgerUpdate, StatusTransition,
};
pub use effects::{
    AuthError, Confirmation, ConsentRecordStore, IdentityProvider, LedgerClient, LedgerError,
    LedgerReceipt, PhysicalClock, ReceiptStatus, SessionToken, SignInGrant, StoreError,
    SystemClock,
};
pub use errors::{MedRelayError, MedRelayResult};
pub use identifiers::{ActorId, ConsentId, LedgerConsentId, PatientId, TxHash};
pub use scope::OwnerScope;
