//! Audit trail reduction
//!
//! Records reduce to events the way journal facts reduce to view deltas:
//! a pure function of the snapshot, with no state carried between calls.
//!
//! Deriving only orders lightweight `(record, kind)` slots. Events (names,
//! descriptions, proofs) are materialised while iterating, and a trail can be
//! iterated any number of times with identical results.

use crate::directory::Directory;
use crate::event::{order_key, AuditActor, AuditEvent, AuditEventKind, LedgerProof};
use crate::filter::AuditFilter;
use chrono::{DateTime, Utc};
use medrelay_core::{ActorId, ConsentRecord, ConsentStatus, Role};

const UNKNOWN_CLINICIAN: &str = "Unknown Clinician";
const UNKNOWN_SIGNER: &str = "Unknown Signer";
const UNKNOWN_PATIENT: &str = "Unknown Patient";

/// Reduces consent record snapshots to audit trails
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditEventDeriver;

impl AuditEventDeriver {
    /// Derive the trail for `records`.
    ///
    /// One `Created` event per record, plus `Signed` or `Rejected` for
    /// decided records. Ordered newest first, ties by record id ascending.
    pub fn derive<D: Directory>(records: &[ConsentRecord], directory: D) -> AuditTrail<'_, D> {
        let mut slots: Vec<Slot> = Vec::with_capacity(records.len() * 2);
        for (index, record) in records.iter().enumerate() {
            slots.push(Slot {
                index,
                kind: AuditEventKind::Created,
            });
            match record.status {
                ConsentStatus::Signed => slots.push(Slot {
                    index,
                    kind: AuditEventKind::Signed,
                }),
                ConsentStatus::Rejected => slots.push(Slot {
                    index,
                    kind: AuditEventKind::Rejected,
                }),
                ConsentStatus::Pending => {}
            }
        }

        slots.sort_by(|a, b| {
            let (ra, rb) = (&records[a.index], &records[b.index]);
            order_key(
                event_time(ra, a.kind),
                ra.id,
                a.kind,
                event_time(rb, b.kind),
                rb.id,
                b.kind,
            )
        });
        // the same record appearing twice in a snapshot yields one set of events
        slots.dedup_by(|a, b| records[a.index].id == records[b.index].id && a.kind == b.kind);

        AuditTrail {
            records,
            directory,
            slots,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    index: usize,
    kind: AuditEventKind,
}

/// Ordered, restartable audit trail over a record snapshot
#[derive(Debug)]
pub struct AuditTrail<'a, D> {
    records: &'a [ConsentRecord],
    directory: D,
    slots: Vec<Slot>,
}

impl<'a, D: Directory> AuditTrail<'a, D> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate from the newest event. Each call starts over.
    pub fn iter(&self) -> AuditTrailIter<'_, 'a, D> {
        AuditTrailIter {
            trail: self,
            position: 0,
        }
    }

    /// Iterate the events `filter` keeps, in trail order
    pub fn filtered<'t>(&'t self, filter: &'t AuditFilter) -> FilteredTrail<'t, 'a, D> {
        FilteredTrail {
            inner: self.iter(),
            filter,
        }
    }

    /// Materialise every event
    pub fn to_vec(&self) -> Vec<AuditEvent> {
        self.iter().collect()
    }

    fn materialise(&self, slot: Slot) -> AuditEvent {
        let record = &self.records[slot.index];
        let actor_id = match slot.kind {
            AuditEventKind::Created => Some(record.issuer.clone()),
            AuditEventKind::Signed => record.signed_by.clone(),
            AuditEventKind::Rejected => record.rejected_by.clone(),
        };
        let actor = self.resolve_actor(actor_id, slot.kind);
        let patient_name = self
            .directory
            .patient_name(&record.patient)
            .unwrap_or(UNKNOWN_PATIENT)
            .to_string();
        let proof = record.tx_hash.clone().map(|tx_hash| LedgerProof {
            tx_hash,
            ledger_consent_id: record.ledger_consent_id,
            verified: None,
        });
        let suffix = match slot.kind {
            AuditEventKind::Created => "created",
            AuditEventKind::Signed => "signed",
            AuditEventKind::Rejected => "rejected",
        };

        AuditEvent {
            id: format!("{}_{suffix}", record.id),
            record_id: record.id,
            kind: slot.kind,
            actor,
            patient: record.patient.clone(),
            patient_name,
            title: record.title.clone(),
            description: format!("{} consent form: {}", slot.kind.verb(), record.title),
            timestamp: event_time(record, slot.kind),
            ledger_status: record.ledger_status,
            proof,
        }
    }

    fn resolve_actor(&self, id: Option<ActorId>, kind: AuditEventKind) -> AuditActor {
        let (fallback_name, fallback_role) = match kind {
            AuditEventKind::Created => (UNKNOWN_CLINICIAN, Role::Clinician),
            AuditEventKind::Signed | AuditEventKind::Rejected => {
                (UNKNOWN_SIGNER, Role::ConsentSigner)
            }
        };
        match id.as_ref().and_then(|id| self.directory.actor(id)) {
            Some(profile) => AuditActor {
                id,
                name: profile.name.clone(),
                role: profile.role,
            },
            None => AuditActor {
                id,
                name: fallback_name.to_string(),
                role: fallback_role,
            },
        }
    }
}

impl<'t, 'a, D: Directory> IntoIterator for &'t AuditTrail<'a, D> {
    type Item = AuditEvent;
    type IntoIter = AuditTrailIter<'t, 'a, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over an `AuditTrail`
#[derive(Debug)]
pub struct AuditTrailIter<'t, 'a, D> {
    trail: &'t AuditTrail<'a, D>,
    position: usize,
}

impl<D: Directory> Iterator for AuditTrailIter<'_, '_, D> {
    type Item = AuditEvent;

    fn next(&mut self) -> Option<AuditEvent> {
        let slot = *self.trail.slots.get(self.position)?;
        self.position += 1;
        Some(self.trail.materialise(slot))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.trail.slots.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl<D: Directory> ExactSizeIterator for AuditTrailIter<'_, '_, D> {}

/// Lazy iterator over the events an `AuditFilter` keeps
#[derive(Debug)]
pub struct FilteredTrail<'t, 'a, D> {
    inner: AuditTrailIter<'t, 'a, D>,
    filter: &'t AuditFilter,
}

impl<D: Directory> Iterator for FilteredTrail<'_, '_, D> {
    type Item = AuditEvent;

    fn next(&mut self) -> Option<AuditEvent> {
        loop {
            let slot = *self.inner.trail.slots.get(self.inner.position)?;
            self.inner.position += 1;
            if !self.filter.admits_kind(slot.kind) {
                continue;
            }
            let event = self.inner.trail.materialise(slot);
            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }
}

fn event_time(record: &ConsentRecord, kind: AuditEventKind) -> DateTime<Utc> {
    match kind {
        AuditEventKind::Created => record.created_at,
        AuditEventKind::Signed => record.signed_at.unwrap_or(record.updated_at),
        AuditEventKind::Rejected => record.rejected_at.unwrap_or(record.updated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use medrelay_core::LedgerStatus;
    use medrelay_testkit::{
        clinician, consent_id, jane_doe, signer, tx_hash, RecordBuilder,
    };

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .with_actor(clinician())
            .with_actor(signer())
            .with_patient(jane_doe(), "Jane Doe")
    }

    #[test]
    fn decided_records_yield_two_events() {
        let records = vec![
            RecordBuilder::new(consent_id(1), 0).build(),
            RecordBuilder::new(consent_id(2), 5).signed(&signer(), 20).build(),
            RecordBuilder::new(consent_id(3), 10).rejected(&signer(), 30).build(),
        ];
        let trail = AuditEventDeriver::derive(&records, directory());

        let kinds: Vec<_> = trail.iter().map(|e| (e.record_id, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (consent_id(3), AuditEventKind::Rejected),
                (consent_id(2), AuditEventKind::Signed),
                (consent_id(3), AuditEventKind::Created),
                (consent_id(2), AuditEventKind::Created),
                (consent_id(1), AuditEventKind::Created),
            ]
        );
        assert_eq!(trail.len(), 5);
    }

    #[test]
    fn ties_break_by_record_id() {
        let records = vec![
            RecordBuilder::new(consent_id(9), 0).build(),
            RecordBuilder::new(consent_id(2), 0).build(),
            RecordBuilder::new(consent_id(5), 0).build(),
        ];
        let trail = AuditEventDeriver::derive(&records, directory());
        let ids: Vec<_> = trail.iter().map(|e| e.record_id).collect();
        assert_eq!(ids, vec![consent_id(2), consent_id(5), consent_id(9)]);
    }

    #[test]
    fn unknown_references_fall_back_to_placeholders() {
        let records = vec![RecordBuilder::new(consent_id(1), 0)
            .signed(&signer(), 10)
            .build()];
        let trail = AuditEventDeriver::derive(&records, StaticDirectory::new());
        let events: Vec<_> = trail.iter().collect();

        assert_eq!(events[0].actor.name, "Unknown Signer");
        assert_eq!(events[0].actor.role, Role::ConsentSigner);
        assert_eq!(events[0].actor.id, Some(signer().id));
        assert_eq!(events[1].actor.name, "Unknown Clinician");
        assert_eq!(events[1].patient_name, "Unknown Patient");
    }

    #[test]
    fn events_carry_resolved_names_and_proof() {
        let records = vec![RecordBuilder::new(consent_id(1), 0)
            .anchored_by(tx_hash(4), Some(12))
            .build()];
        let trail = AuditEventDeriver::derive(&records, directory());
        let event = trail.iter().next().unwrap();

        assert_eq!(event.id, format!("{}_created", consent_id(1)));
        assert_eq!(event.actor.name, "Dr. Amara Okafor");
        assert_eq!(event.description, "Created consent form: MRI consent");
        assert_eq!(event.ledger_status, LedgerStatus::Anchored);
        let proof = event.proof.unwrap();
        assert_eq!(proof.tx_hash, tx_hash(4));
        assert_eq!(proof.verified, None);
    }

    #[test]
    fn iteration_restarts_from_the_newest_event() {
        let records = vec![
            RecordBuilder::new(consent_id(1), 0).build(),
            RecordBuilder::new(consent_id(2), 1).build(),
        ];
        let trail = AuditEventDeriver::derive(&records, directory());

        let mut first = trail.iter();
        assert_eq!(first.len(), 2);
        first.next();
        let again: Vec<_> = trail.iter().collect();
        assert_eq!(again.len(), 2);
        assert_eq!(again[0].record_id, consent_id(2));
    }

    #[test]
    fn duplicated_snapshot_rows_collapse() {
        let record = RecordBuilder::new(consent_id(1), 0).build();
        let records = vec![record.clone(), record];
        let trail = AuditEventDeriver::derive(&records, directory());
        assert_eq!(trail.len(), 1);
    }
}
