//! Offline actor specification (`id:role:name`)

use medrelay_core::{ActorProfile, Role};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorSpec(ActorProfile);

impl ActorSpec {
    pub fn into_profile(self) -> ActorProfile {
        self.0
    }
}

impl FromStr for ActorSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(id), Some(role), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("expected ID:ROLE:NAME, got {s:?}"));
        };
        let (id, name) = (id.trim(), name.trim());
        if id.is_empty() || name.is_empty() {
            return Err("actor id and name must not be empty".to_string());
        }
        let role: Role = role.parse()?;
        Ok(Self(ActorProfile::new(id, name, role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_id_role_and_name_with_colons() {
        let spec: ActorSpec = "dr-okafor:doctor:Dr. Okafor: Radiology".parse().unwrap();
        let profile = spec.into_profile();
        assert_eq!(profile.id.as_str(), "dr-okafor");
        assert_eq!(profile.role, Role::Clinician);
        assert_eq!(profile.name, "Dr. Okafor: Radiology");
    }

    #[test]
    fn rejects_incomplete_specs() {
        assert!("dr-okafor:doctor".parse::<ActorSpec>().is_err());
        assert!(":poa:Morgan".parse::<ActorSpec>().is_err());
        assert!("x:janitor:Sam".parse::<ActorSpec>().is_err());
    }
}
