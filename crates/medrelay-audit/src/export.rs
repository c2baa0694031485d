//! Audit trail export (CSV and JSON lines)

use crate::event::AuditEvent;
use std::io::{self, Write};

pub const CSV_HEADER: &str =
    "Timestamp,Event Type,User,Role,Patient,Description,Ledger Status,Transaction Hash";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write `events` as CSV with a header row. Returns the number of rows written.
pub fn write_csv<'e, W, I>(mut writer: W, events: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'e AuditEvent>,
{
    writeln!(writer, "{CSV_HEADER}")?;
    let mut rows = 0;
    for event in events {
        let timestamp = event.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let tx_hash = event
            .proof
            .as_ref()
            .map(|proof| proof.tx_hash.as_str())
            .unwrap_or_default();
        let fields = [
            timestamp.as_str(),
            event.kind.as_str(),
            event.actor.name.as_str(),
            event.actor.role.as_str(),
            event.patient_name.as_str(),
            event.description.as_str(),
            event.ledger_status.as_str(),
            tx_hash,
        ];
        let line = fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",");
        writeln!(writer, "{line}")?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

/// Write one JSON object per event per line
pub fn write_json_lines<'e, W, I>(mut writer: W, events: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'e AuditEvent>,
{
    let mut rows = 0;
    for event in events {
        serde_json::to_writer(&mut writer, event)?;
        writer.write_all(b"\n")?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

/// Quote a field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
