//! Caller roles and record-access actions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// The role claim carried by a caller's credential.
///
/// A closed enumeration: authorization logic matches over these variants
/// exhaustively instead of comparing claim strings at each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The most-privileged built-in role. Also the documented fallback for
    /// credentials that carry no role claim at all.
    Admin,
    /// The subject of a patient record.
    Patient,
    /// A clinician requesting access to patient records.
    Practitioner,
}

impl Role {
    /// The claim string as it appears in credential metadata.
    pub fn claim(&self) -> &'static str {
        match self {
            Role::Admin => "ROLE_ADMIN",
            Role::Patient => "ROLE_PATIENT",
            Role::Practitioner => "ROLE_PRACTITIONER",
        }
    }

    /// Parse a role claim string.
    pub fn from_claim(claim: &str) -> Result<Self, CoreError> {
        match claim {
            "ROLE_ADMIN" => Ok(Role::Admin),
            "ROLE_PATIENT" => Ok(Role::Patient),
            "ROLE_PRACTITIONER" => Ok(Role::Practitioner),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.claim())
    }
}

/// What a record-touching operation did, recorded in the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create,
    View,
    Edit,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "CREATE",
            Action::View => "VIEW",
            Action::Edit => "EDIT",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "CREATE" => Ok(Action::Create),
            "VIEW" => Ok(Action::View),
            "EDIT" => Ok(Action::Edit),
            other => Err(CoreError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
