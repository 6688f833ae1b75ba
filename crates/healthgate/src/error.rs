//! Error types for the service facade.

use thiserror::Error;

use healthgate_engine::EngineError;
use healthgate_ledger::LedgerError;

/// Errors surfaced by service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Domain failure from the consent engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Ledger failure outside engine logic (transaction setup).
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl ServiceError {
    /// Whether this failure is an authorization denial.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ServiceError::Engine(EngineError::Unauthorized(_)))
    }

    /// Whether this failure is an absent-entity lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Engine(EngineError::NotFound(_)))
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
