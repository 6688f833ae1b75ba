//! # Healthgate
//!
//! The unified API for the Healthgate system - consent-gated access to
//! pseudonymous health records over a key-addressed ledger.
//!
//! ## Overview
//!
//! A practitioner requests time-bounded or unlimited access to a patient's
//! record; the patient reviews and grants or denies; every read and write
//! of clinical data is gated by the outcome and logged. This crate exposes
//! one authorization-checked entry point per operation, backed by the
//! engine and a pluggable ledger.
//!
//! ## Key Concepts
//!
//! - **Pseudonym**: stored documents reference principals only through the
//!   identifier embedded in their credential subject, never real identity.
//! - **Access request**: one per (patient, practitioner) pair, moving
//!   between `UNDEFINED` and the reviewed decisions; a *resend* resets a
//!   denial or lapsed window while preserving identity.
//! - **Query as index**: record lookup re-runs a predicate query each time
//!   instead of following a stored reference.
//! - **Explicit time**: "now" is threaded in from the invocation, so any
//!   replica re-executing a transaction reaches the same outcome.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use healthgate::{HealthgateService, ServiceConfig};
//! use healthgate::ledger::SqliteLedger;
//!
//! async fn example() {
//!     let ledger = SqliteLedger::open("healthgate.db").unwrap();
//!     let service = HealthgateService::new(ledger, ServiceConfig::default());
//!
//!     // let record = service
//!     //     .get_my_patient_record(&credential, now)
//!     //     .await
//!     //     .unwrap();
//!     let _ = service;
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `healthgate::core` - Domain documents and enums
//! - `healthgate::ledger` - The ledger abstraction and backends
//! - `healthgate::engine` - The consent engine components

pub mod config;
pub mod error;
pub mod service;

// Re-export component crates
pub use healthgate_core as core;
pub use healthgate_engine as engine;
pub use healthgate_ledger as ledger;

// Re-export main types for convenience
pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use service::HealthgateService;

// Re-export commonly used component types
pub use healthgate_core::{
    AccessLogEntry, AccessRequest, Action, Association, Decision, DocumentId, ItemAccess,
    PatientIdentifiers, PatientRecord, Pseudonym, Role,
};
pub use healthgate_engine::{CredentialContext, EngineError, Operation, RequestRevision};
pub use healthgate_ledger::{LedgerStore, MemoryLedger, Page, SqliteLedger};
