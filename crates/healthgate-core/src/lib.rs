//! # Healthgate Core
//!
//! Pure primitives for the Healthgate consent engine: document shapes,
//! closed role/decision enumerations, and deterministic identity hashing.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over domain data structures.
//!
//! ## Key Types
//!
//! - [`AccessRequest`] - The consent state machine's document, with its
//!   availability predicate
//! - [`PatientRecord`] / [`PatientIdentifiers`] / [`Association`] /
//!   [`AccessLogEntry`] - The remaining persisted document kinds
//! - [`Role`] / [`Decision`] / [`Action`] - Closed enumerations matched
//!   exhaustively instead of compared as strings
//! - [`IdentityDigest`] - Blake3 pseudonymization of identifying input
//!
//! ## Determinism
//!
//! Everything here may be committed to consensus-ordered state, so hashing
//! and id derivation never read a clock or generate local randomness.

pub mod decision;
pub mod document;
pub mod error;
pub mod hashing;
pub mod role;
pub mod types;

pub use decision::{Decision, ItemAccess};
pub use document::{
    from_bytes, to_bytes, AccessLogEntry, AccessRequest, Association, DocKind,
    PatientIdentifiers, PatientRecord,
};
pub use error::CoreError;
pub use hashing::{derive_document_id, hash_identifier, IdentityDigest};
pub use role::{Action, Role};
pub use types::{DocumentId, Pseudonym, TransactionId};
