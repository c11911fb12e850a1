use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Clinic, Patient, Regulator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Clinic,
    Regulator,
}

impl Role {
    pub const ALL: &'static [Role] = &[Role::Patient, Role::Clinic, Role::Regulator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Clinic => "clinic",
            Role::Regulator => "regulator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "clinic" => Ok(Role::Clinic),
            "regulator" => Ok(Role::Regulator),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub username: Option<String>,
    pub role: String,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
}

/// Authenticated principal attached to every protected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: i64,
    pub username: Option<String>,
    pub role: Role,
}

/// Role-specific profile resolved once per request by the auth middleware.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", content = "profile", rename_all = "snake_case")]
pub enum Profile {
    Patient(Patient),
    Clinic(Clinic),
    Regulator(Regulator),
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::Patient(_) => Role::Patient,
            Profile::Clinic(_) => Role::Clinic,
            Profile::Regulator(_) => Role::Regulator,
        }
    }

    pub fn as_patient(&self) -> Option<&Patient> {
        match self {
            Profile::Patient(patient) => Some(patient),
            _ => None,
        }
    }

    pub fn as_clinic(&self) -> Option<&Clinic> {
        match self {
            Profile::Clinic(clinic) => Some(clinic),
            _ => None,
        }
    }

    pub fn as_regulator(&self) -> Option<&Regulator> {
        match self {
            Profile::Regulator(regulator) => Some(regulator),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in [Role::Patient, Role::Clinic, Role::Regulator] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn profile_reports_its_role() {
        let profile = Profile::Clinic(Clinic::default());
        assert_eq!(profile.role(), Role::Clinic);
        assert!(profile.as_patient().is_none());
        assert!(profile.as_clinic().is_some());
    }
}
