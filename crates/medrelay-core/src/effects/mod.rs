//! Effect interfaces (no implementations beyond the system clock)
//!
//! Each external substrate gets one trait and one error type:
//!
//! - `ConsentRecordStore` / `StoreError`: authoritative relational state
//! - `LedgerClient` / `LedgerError`: best-effort tamper-evident anchor
//! - `IdentityProvider` / `AuthError`: sign-in and profile lookup
//! - `PhysicalClock`: timestamps and backoff sleeps
//!
//! Production handlers live in `medrelay-store`, `medrelay-ledger` and
//! `medrelay-session`; deterministic doubles live in `medrelay-testkit`.

pub mod identity;
pub mod ledger;
pub mod store;
pub mod time;

pub use identity::{AuthError, IdentityProvider, SessionToken, SignInGrant};
pub use ledger::{Confirmation, LedgerClient, LedgerError, LedgerReceipt, ReceiptStatus};
pub use store::{ConsentRecordStore, StoreError};
pub use time::{PhysicalClock, SystemClock};
