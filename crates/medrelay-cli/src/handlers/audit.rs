//! Audit trail command

use crate::context::AppContext;
use crate::AuditArgs;
use anyhow::{Context as _, Result};
use medrelay_audit::{
    verify_proofs, write_csv, write_json_lines, AuditEvent, AuditEventDeriver, AuditFilter,
    StaticDirectory,
};
use medrelay_core::{ActorProfile, ConsentRecord, OwnerScope};
use std::fs::File;
use std::io::{self, BufWriter, Write};

pub async fn run(ctx: &AppContext, viewer: Option<ActorProfile>, args: AuditArgs) -> Result<()> {
    let records = ctx.coordinator().list_consents(&OwnerScope::All).await?;
    let directory = directory_for(&records, viewer);

    let mut filter = AuditFilter::new().kinds(args.kinds.iter().copied());
    if let Some(term) = &args.search {
        filter = filter.search(term);
    }
    let trail = AuditEventDeriver::derive(&records, directory);
    let mut events: Vec<AuditEvent> = trail.filtered(&filter).collect();
    if args.verify {
        events = verify_proofs(events, ctx.ledger.as_ref()).await;
    }

    let written = match (&args.csv, args.json) {
        (Some(path), _) if path.as_os_str() == "-" => write_csv(io::stdout().lock(), &events)?,
        (Some(path), _) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_csv(BufWriter::new(file), &events)?
        }
        (None, true) => write_json_lines(io::stdout().lock(), &events)?,
        (None, false) => write_text(io::stdout().lock(), &events)?,
    };
    eprintln!("{written} event(s)");
    Ok(())
}

/// Patient references double as display names; the viewer is the only
/// profile known without an identity lookup per actor.
fn directory_for(records: &[ConsentRecord], viewer: Option<ActorProfile>) -> StaticDirectory {
    let mut directory = StaticDirectory::new();
    for record in records {
        directory.insert_patient(record.patient.clone(), record.patient.as_str());
    }
    if let Some(viewer) = viewer {
        directory.insert_actor(viewer);
    }
    directory
}

fn write_text<W: Write>(mut out: W, events: &[AuditEvent]) -> io::Result<usize> {
    for event in events {
        let proof = match &event.proof {
            Some(proof) => match proof.verified {
                Some(true) => format!("{} (verified)", proof.tx_hash),
                Some(false) => format!("{} (not found)", proof.tx_hash),
                None => proof.tx_hash.to_string(),
            },
            None => "-".to_string(),
        };
        writeln!(
            out,
            "{}  {:<16}  {} ({})  {}  [{}] {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.kind.as_str(),
            event.actor.name,
            event.actor.role,
            event.description,
            event.ledger_status,
            proof
        )?;
    }
    out.flush()?;
    Ok(events.len())
}
