//! The authorization policy: a static total function from (role, operation)
//! to allow/deny.
//!
//! This table is the single source of truth for authorization. Every
//! exposed operation consults it before touching state, and no operation
//! bypasses it to perform a privileged action. Operations are a closed
//! enum, so an unknown operation name cannot even be expressed - the table
//! is fail-closed by construction.

use std::fmt;

use healthgate_core::Role;

use crate::error::{EngineError, Result};

/// Every operation exposed by the service, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAccessRequest,
    ReviewAccessRequest,
    GetAccessRequest,
    GetAccessRequestForUser,
    AccessRequestExists,
    GetAvailableAccessRequests,
    GetAccessRequestsByReviewed,
    GetAccessRequestsByStatus,
    GetRecentAccessRequests,
    GetAccessRequestHistory,
    CreatePatientRecord,
    GetPatientRecord,
    UpdatePatientRecord,
    GetMyPatientRecord,
    UpdateMyPatientRecord,
    PreviewPatientRecord,
    UserExists,
    GetPatientIdentifiers,
    UpdatePatientIdentifiers,
    AddAccessLog,
    GetAccessLogsForUser,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateAccessRequest => "CreateAccessRequest",
            Operation::ReviewAccessRequest => "ReviewAccessRequest",
            Operation::GetAccessRequest => "GetAccessRequest",
            Operation::GetAccessRequestForUser => "GetAccessRequestForUser",
            Operation::AccessRequestExists => "AccessRequestExists",
            Operation::GetAvailableAccessRequests => "GetAvailableAccessRequests",
            Operation::GetAccessRequestsByReviewed => "GetAccessRequestsByReviewed",
            Operation::GetAccessRequestsByStatus => "GetAccessRequestsByStatus",
            Operation::GetRecentAccessRequests => "GetRecentAccessRequests",
            Operation::GetAccessRequestHistory => "GetAccessRequestHistory",
            Operation::CreatePatientRecord => "CreatePatientRecord",
            Operation::GetPatientRecord => "GetPatientRecord",
            Operation::UpdatePatientRecord => "UpdatePatientRecord",
            Operation::GetMyPatientRecord => "GetMyPatientRecord",
            Operation::UpdateMyPatientRecord => "UpdateMyPatientRecord",
            Operation::PreviewPatientRecord => "PreviewPatientRecord",
            Operation::UserExists => "UserExists",
            Operation::GetPatientIdentifiers => "GetPatientIdentifiers",
            Operation::UpdatePatientIdentifiers => "UpdatePatientIdentifiers",
            Operation::AddAccessLog => "AddAccessLog",
            Operation::GetAccessLogsForUser => "GetAccessLogsForUser",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `role` may invoke `operation`.
///
/// ADMIN passes every check: it is the most-privileged built-in role and
/// the documented fallback identity for claimless credentials.
pub fn allowed(role: Role, operation: Operation) -> bool {
    if role == Role::Admin {
        return true;
    }

    use Operation::*;
    match operation {
        CreateAccessRequest => role == Role::Practitioner,
        ReviewAccessRequest => role == Role::Patient,
        GetAccessRequest
        | GetAccessRequestForUser
        | AccessRequestExists
        | GetAccessRequestsByReviewed
        | GetAccessRequestsByStatus
        | GetRecentAccessRequests
        | GetAccessRequestHistory
        | AddAccessLog => matches!(role, Role::Patient | Role::Practitioner),
        GetAvailableAccessRequests => role == Role::Practitioner,
        CreatePatientRecord => role == Role::Patient,
        GetPatientRecord | UpdatePatientRecord | PreviewPatientRecord => {
            role == Role::Practitioner
        }
        GetMyPatientRecord | UpdateMyPatientRecord | GetAccessLogsForUser => {
            role == Role::Patient
        }
        // Registration support: reserved to the administrative identity.
        UserExists => false,
        GetPatientIdentifiers | UpdatePatientIdentifiers => role == Role::Patient,
    }
}

/// Enforce the table, failing with `Unauthorized` naming the operation.
pub fn require(role: Role, operation: Operation) -> Result<()> {
    if allowed(role, operation) {
        Ok(())
    } else {
        Err(EngineError::Unauthorized(operation.name().to_string()))
    }
}
