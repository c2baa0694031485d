//! Consent creation input

use medrelay_core::{ActorProfile, ConsentDraft, ConsentId, MedRelayError, MedRelayResult, PatientId};
use serde::{Deserialize, Serialize};

/// Request to open a consent for a procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConsentRequest {
    pub patient: PatientId,
    pub procedure_type: String,
    pub description: String,
    /// Defaults to "<procedure> consent"
    #[serde(default)]
    pub title: Option<String>,
}

impl CreateConsentRequest {
    pub fn new(
        patient: impl Into<PatientId>,
        procedure_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            patient: patient.into(),
            procedure_type: procedure_type.into(),
            description: description.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Reject blank fields before anything is written
    pub fn validate(&self) -> MedRelayResult<()> {
        if self.patient.is_blank() {
            return Err(MedRelayError::validation("patient reference is required"));
        }
        if self.procedure_type.trim().is_empty() {
            return Err(MedRelayError::validation("procedure type is required"));
        }
        if self.description.trim().is_empty() {
            return Err(MedRelayError::validation("description is required"));
        }
        if self.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
            return Err(MedRelayError::validation("title must not be blank"));
        }
        Ok(())
    }

    /// Validated draft keyed by a pre-allocated record id
    pub(crate) fn into_draft(self, id: ConsentId, issuer: &ActorProfile) -> MedRelayResult<ConsentDraft> {
        self.validate()?;
        if issuer.id.is_blank() {
            return Err(MedRelayError::validation("issuer must be an authenticated actor"));
        }
        let procedure_type = self.procedure_type.trim().to_string();
        let title = self
            .title
            .map(|title| title.trim().to_string())
            .unwrap_or_else(|| format!("{procedure_type} consent"));
        Ok(ConsentDraft {
            id,
            title,
            description: self.description.trim().to_string(),
            procedure_type,
            patient: self.patient,
            issuer: issuer.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use medrelay_testkit::clinician;

    #[test]
    fn blank_fields_fail_fast() {
        assert_matches!(
            CreateConsentRequest::new(" ", "MRI", "scan").validate(),
            Err(MedRelayError::Validation { .. })
        );
        assert_matches!(
            CreateConsentRequest::new("Jane Doe", "MRI", "").validate(),
            Err(MedRelayError::Validation { .. })
        );
        assert_matches!(
            CreateConsentRequest::new("Jane Doe", "MRI", "scan")
                .with_title("  ")
                .validate(),
            Err(MedRelayError::Validation { .. })
        );
    }

    #[test]
    fn draft_gets_default_title() {
        let draft = CreateConsentRequest::new("Jane Doe", " MRI ", "contrast study")
            .into_draft(ConsentId::new(), &clinician())
            .unwrap();
        assert_eq!(draft.title, "MRI consent");
        assert_eq!(draft.procedure_type, "MRI");
        assert_eq!(draft.issuer, clinician().id);
    }
}
