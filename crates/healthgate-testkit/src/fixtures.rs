//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: static credentials in the
//! shape identity resolution expects, and a pre-wired set of parties.

use healthgate_core::Role;
use healthgate_engine::CredentialContext;
use healthgate_ledger::MemoryLedger;

/// A fixed credential for tests: an identity string with a `CN=` component
/// plus an optional role claim blob.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    pub identity: String,
    pub claim: Option<String>,
}

impl StaticCredential {
    /// A credential for `pseudonym` carrying `role`.
    pub fn with_role(pseudonym: &str, role: Role) -> Self {
        Self {
            identity: format!("x509::CN={pseudonym},OU=client::CN=ca.healthgate"),
            claim: Some(format!("{{\"role\":\"{}\"}}", role.claim())),
        }
    }

    /// A patient credential.
    pub fn patient(pseudonym: &str) -> Self {
        Self::with_role(pseudonym, Role::Patient)
    }

    /// A practitioner credential.
    pub fn practitioner(pseudonym: &str) -> Self {
        Self::with_role(pseudonym, Role::Practitioner)
    }

    /// An admin credential.
    pub fn admin(pseudonym: &str) -> Self {
        Self::with_role(pseudonym, Role::Admin)
    }

    /// A credential with no role claim at all (resolves to the
    /// administrative fallback).
    pub fn claimless(pseudonym: &str) -> Self {
        Self {
            identity: format!("x509::CN={pseudonym},OU=client::CN=ca.healthgate"),
            claim: None,
        }
    }

    /// A credential whose role claim will not parse.
    pub fn broken_claim(pseudonym: &str) -> Self {
        Self {
            identity: format!("x509::CN={pseudonym},OU=client::CN=ca.healthgate"),
            claim: Some("{\"role\":\"ROLE_JANITOR\"}".to_string()),
        }
    }
}

impl CredentialContext for StaticCredential {
    fn identity_string(&self) -> String {
        self.identity.clone()
    }

    fn role_claim(&self) -> Option<String> {
        self.claim.clone()
    }
}

/// The standard cast for lifecycle tests: one patient, one practitioner,
/// one admin, plus a fresh in-memory ledger.
pub struct TestParties {
    pub patient: StaticCredential,
    pub practitioner: StaticCredential,
    pub admin: StaticCredential,
}

impl TestParties {
    pub fn new() -> Self {
        Self {
            patient: StaticCredential::patient("patient-1"),
            practitioner: StaticCredential::practitioner("practitioner-1"),
            admin: StaticCredential::admin("admin-1"),
        }
    }
}

impl Default for TestParties {
    fn default() -> Self {
        Self::new()
    }
}

/// A fresh in-memory ledger.
pub fn memory_ledger() -> MemoryLedger {
    MemoryLedger::new()
}
