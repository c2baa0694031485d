//! Anchoring policy

use medrelay_core::{ConsentRecord, ConsentStatus, PolicyConfig};
use serde::{Deserialize, Serialize};

/// Which decisions are anchored on the ledger. Signatures always are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorPolicy {
    pub anchor_rejections: bool,
}

impl AnchorPolicy {
    /// Whether the record's terminal decision should be reflected on chain
    pub fn anchors_decision(&self, record: &ConsentRecord) -> bool {
        match record.status {
            ConsentStatus::Signed => true,
            ConsentStatus::Rejected => self.anchor_rejections,
            ConsentStatus::Pending => false,
        }
    }
}

impl From<&PolicyConfig> for AnchorPolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            anchor_rejections: config.anchor_rejections,
        }
    }
}
