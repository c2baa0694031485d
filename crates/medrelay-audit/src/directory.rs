//! Display-name resolution for actors and patients

use medrelay_core::{ActorId, ActorProfile, PatientId};
use std::collections::HashMap;

/// Resolves references on records to display identities
pub trait Directory {
    fn actor(&self, id: &ActorId) -> Option<&ActorProfile>;

    fn patient_name(&self, id: &PatientId) -> Option<&str>;
}

/// In-memory directory built from profiles known to the caller
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    actors: HashMap<ActorId, ActorProfile>,
    patients: HashMap<PatientId, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, profile: ActorProfile) -> Self {
        self.insert_actor(profile);
        self
    }

    pub fn with_patient(mut self, id: PatientId, name: impl Into<String>) -> Self {
        self.insert_patient(id, name);
        self
    }

    pub fn insert_actor(&mut self, profile: ActorProfile) {
        self.actors.insert(profile.id.clone(), profile);
    }

    pub fn insert_patient(&mut self, id: PatientId, name: impl Into<String>) {
        self.patients.insert(id, name.into());
    }
}

impl FromIterator<ActorProfile> for StaticDirectory {
    fn from_iter<I: IntoIterator<Item = ActorProfile>>(iter: I) -> Self {
        let mut directory = Self::new();
        for profile in iter {
            directory.insert_actor(profile);
        }
        directory
    }
}

impl Directory for StaticDirectory {
    fn actor(&self, id: &ActorId) -> Option<&ActorProfile> {
        self.actors.get(id)
    }

    fn patient_name(&self, id: &PatientId) -> Option<&str> {
        self.patients.get(id).map(String::as_str)
    }
}

impl<D: Directory + ?Sized> Directory for &D {
    fn actor(&self, id: &ActorId) -> Option<&ActorProfile> {
        (**self).actor(id)
    }

    fn patient_name(&self, id: &PatientId) -> Option<&str> {
        (**self).patient_name(id)
    }
}
