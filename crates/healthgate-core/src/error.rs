//! Error types for Healthgate core primitives.

use thiserror::Error;

/// Errors from pure document and enum handling.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown role claim: {0}")]
    UnknownRole(String),

    #[error("unknown decision value: {0}")]
    UnknownDecision(String),

    #[error("unknown action value: {0}")]
    UnknownAction(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}
