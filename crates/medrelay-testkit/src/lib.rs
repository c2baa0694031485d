//! MedRelay Testing Infrastructure
//!
//! Deterministic doubles for every effect seam plus shared fixtures, so the
//! coordinator, reconciler, audit and session crates can be exercised without
//! a ledger node, an identity backend or wall-clock sleeps.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! Add this to your crate's `Cargo.toml` dev-dependencies:
//! ```toml
//! [dev-dependencies]
//! medrelay-testkit = { workspace = true }
//! ```
//!
//! Then in your tests:
//! ```rust,no_run
//! use medrelay_testkit::*;
//!
//! let ledger = ScriptedLedger::confirming();
//! let clock = ManualClock::at(fixed_time(0));
//! let issuer = clinician();
//! ```

pub mod clock;
pub mod fixtures;
pub mod identity;
pub mod ledger;
pub mod store;

pub use clock::ManualClock;
pub use fixtures::*;
pub use identity::ScriptedIdentity;
pub use ledger::{LedgerCalls, LedgerMode, ScriptedLedger};
pub use store::FaultyStore;
