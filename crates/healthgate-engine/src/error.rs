//! The engine error taxonomy.
//!
//! Authorization and validation failures surface immediately with no retry.
//! `IntegrityViolation` is fatal: it means a uniqueness invariant the engine
//! itself should have guaranteed was found broken, and is never silently
//! resolved by picking one of the offending documents. Commit-time
//! optimistic-concurrency conflicts are a property of the external store and
//! never appear here.

use thiserror::Error;

use healthgate_core::{CoreError, DocKind};
use healthgate_ledger::LedgerError;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Role check or self-access check failed. Always raised before any
    /// state mutation.
    #[error("unauthorized access: {0}")]
    Unauthorized(String),

    /// A referenced entity is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness check on create found an existing document.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A malformed enum value or otherwise invalid input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// More than one document where at most one was expected.
    #[error("integrity violation: found {matches} documents of kind {kind} ({context})")]
    IntegrityViolation {
        kind: DocKind,
        matches: usize,
        context: String,
    },

    /// Identity resolution failed.
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// Document encode/decode failure.
    #[error("codec error: {0}")]
    Codec(#[from] CoreError),

    /// Underlying ledger failure.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
