//! MedRelay Audit - Derived Audit Trail
//!
//! There is no persisted event log. The audit trail is reduced on demand
//! from a snapshot of consent records, so it can always be rebuilt and never
//! disagrees with the records it describes.
//!
//! # Layers
//!
//! - `AuditEventDeriver`: snapshot + directory -> ordered, lazy `AuditTrail`
//! - `AuditFilter`: case-insensitive search and event-kind selection
//! - `verify_proofs`: optional ledger confirmation of each event's proof
//! - `export`: CSV and JSON-lines writers

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod deriver;
pub mod directory;
pub mod event;
pub mod export;
pub mod filter;
pub mod verify;

pub use deriver::{AuditEventDeriver, AuditTrail, AuditTrailIter, FilteredTrail};
pub use directory::{Directory, StaticDirectory};
pub use event::{AuditActor, AuditEvent, AuditEventKind, LedgerProof};
pub use export::{write_csv, write_json_lines, CSV_HEADER};
pub use filter::AuditFilter;
pub use verify::verify_proofs;
