//! Consent lifecycle commands

use super::print_json;
use crate::context::AppContext;
use anyhow::Result;
use medrelay_consent::{ConsentOutcome, CreateConsentRequest};
use medrelay_core::{ActorId, ActorProfile, ConsentId, ConsentRecord, OwnerScope, PatientId};

pub async fn create(
    ctx: &AppContext,
    issuer: &ActorProfile,
    patient: String,
    procedure: String,
    description: String,
    title: Option<String>,
) -> Result<()> {
    let mut request = CreateConsentRequest::new(PatientId::new(patient), procedure, description);
    if let Some(title) = title {
        request = request.with_title(title);
    }
    let outcome = ctx.coordinator().create_consent(request, issuer).await?;
    report(&outcome)
}

pub async fn sign(ctx: &AppContext, signer: &ActorProfile, id: ConsentId) -> Result<()> {
    let outcome = ctx.coordinator().sign_consent(id, signer).await?;
    report(&outcome)
}

pub async fn reject(ctx: &AppContext, signer: &ActorProfile, id: ConsentId) -> Result<()> {
    let outcome = ctx.coordinator().reject_consent(id, signer).await?;
    report(&outcome)
}

pub async fn show(ctx: &AppContext, id: ConsentId) -> Result<()> {
    let record = ctx.coordinator().get_consent(id).await?;
    print_json(&record)
}

pub async fn list(ctx: &AppContext, issuer: Option<String>, patient: Option<String>) -> Result<()> {
    let scope = match (issuer, patient) {
        (Some(issuer), _) => OwnerScope::Issuer(ActorId::new(issuer)),
        (None, Some(patient)) => OwnerScope::Patient(PatientId::new(patient)),
        (None, None) => OwnerScope::All,
    };
    let records = ctx.coordinator().list_consents(&scope).await?;
    for record in &records {
        println!("{}", list_line(record));
    }
    eprintln!("{} record(s)", records.len());
    Ok(())
}

fn report(outcome: &ConsentOutcome) -> Result<()> {
    if let Some(advisory) = &outcome.advisory {
        eprintln!("ledger: {advisory}");
    }
    print_json(&outcome.record)
}

fn list_line(record: &ConsentRecord) -> String {
    format!(
        "{}  {:<8}  {:<14}  {:<20}  {}",
        record.id,
        record.status.as_str(),
        record.ledger_status.as_str(),
        record.patient.as_str(),
        record.title
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrelay_core::{ConsentDraft, LedgerUpdate};

    #[test]
    fn list_lines_align_status_columns() {
        let record = ConsentRecord::pending(
            ConsentDraft {
                id: ConsentId::new(),
                title: "MRI consent".into(),
                description: "contrast study".into(),
                procedure_type: "MRI".into(),
                patient: PatientId::new("Jane Doe"),
                issuer: ActorId::new("dr-okafor"),
            },
            chrono::DateTime::<chrono::Utc>::default(),
            LedgerUpdate::default(),
        );
        let line = list_line(&record);
        assert!(line.starts_with(&record.id.to_string()));
        assert!(line.contains("pending   unanchored"));
        assert!(line.ends_with("MRI consent"));
    }
}
