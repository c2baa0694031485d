//! MedRelay Store - Consent Record Persistence
//!
//! Handlers for the `ConsentRecordStore` effect:
//!
//! - `MemoryConsentStore`: in-process map, used by tests and dry runs
//! - `FileConsentStore`: one JSON document per record under a base directory
//!
//! Both delegate the compare-and-swap decision to
//! `ConsentRecord::apply_transition` / `apply_ledger` under an exclusive lock,
//! so concurrent sign and reject on one record serialize with exactly one
//! winner.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod file;
pub mod memory;

pub use file::FileConsentStore;
pub use memory::MemoryConsentStore;
