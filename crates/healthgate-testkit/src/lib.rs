//! # Healthgate Testkit
//!
//! Testing utilities for the Healthgate workspace: static credentials,
//! party fixtures, and proptest generators over domain values.

pub mod fixtures;
pub mod generators;

pub use fixtures::{memory_ledger, StaticCredential, TestParties};
