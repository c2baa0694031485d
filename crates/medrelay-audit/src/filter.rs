//! Audit trail filtering
//!
//! Filters look at one event at a time, so applying a filter before or
//! after ordering yields the same sequence.

use crate::event::{AuditEvent, AuditEventKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Search term plus event-kind selection. The default keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Lowercased search term; empty matches everything
    search: String,
    /// Empty means every kind
    kinds: BTreeSet<AuditEventKind>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive substring over description, actor name and patient name
    pub fn search(mut self, term: impl AsRef<str>) -> Self {
        self.search = term.as_ref().trim().to_lowercase();
        self
    }

    pub fn kind(mut self, kind: AuditEventKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = AuditEventKind>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_empty() && self.kinds.is_empty()
    }

    pub(crate) fn admits_kind(&self, kind: AuditEventKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    pub fn matches(&self, event: &AuditEvent) -> bool {
        if !self.admits_kind(event.kind) {
            return false;
        }
        if self.search.is_empty() {
            return true;
        }
        [&event.description, &event.actor.name, &event.patient_name]
            .iter()
            .any(|field| field.to_lowercase().contains(&self.search))
    }
}
