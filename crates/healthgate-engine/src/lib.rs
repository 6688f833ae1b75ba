//! # Healthgate Engine
//!
//! The consent core: identity resolution, the authorization policy table,
//! the clinical-record and identifier registries, the association index,
//! the access-request lifecycle state machine, and the audit recorder.
//!
//! ## Execution model
//!
//! Each invocation runs to completion against a consistent snapshot of the
//! ledger. Every `query-then-conditionally-insert` here is an optimistic
//! check, not a lock: under concurrent creation attempts, the store's
//! commit-time validation lets at most one commit and the invoking client
//! retries the rest. The engine holds no locks, no timeouts, and no
//! in-memory state across invocations.
//!
//! ## Key Types
//!
//! - [`AccessRequestEngine`] - create/resend/review and availability
//! - [`RecordRegistry`] / [`IdentifierRegistry`] - the patient documents
//! - [`AssociationIndex`] - pseudonym → record, rediscovered by query
//! - [`AccessLogRecorder`] - append-only audit trail
//! - [`OpContext`] - caller + transaction id + time for one invocation
//! - [`policy`] - the (role, operation) allow table

pub mod association;
pub mod audit;
pub mod context;
pub mod error;
pub mod identifiers;
pub mod policy;
pub mod registry;
pub mod request;
mod scan;

pub use association::AssociationIndex;
pub use audit::AccessLogRecorder;
pub use context::{resolve_caller, CallerIdentity, CredentialContext, OpContext};
pub use error::{EngineError, Result};
pub use identifiers::IdentifierRegistry;
pub use policy::{allowed, require, Operation};
pub use registry::RecordRegistry;
pub use request::{AccessRequestEngine, RequestRevision};
