//! The document shapes persisted to the ledger.
//!
//! Every entity is a JSON object tagged with a `docType` discriminator so a
//! predicate query can select all documents of one kind. The ledger owns the
//! durable bytes; everything here is a transient decoded copy living for one
//! invocation.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

use crate::decision::{Decision, ItemAccess};
use crate::error::CoreError;
use crate::hashing::IdentityDigest;
use crate::role::{Action, Role};
use crate::types::{DocumentId, Pseudonym, TransactionId};

/// Document kind discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocKind {
    #[serde(rename = "PATIENT_RECORD")]
    PatientRecord,
    #[serde(rename = "PATIENT_IDENTIFIERS")]
    PatientIdentifiers,
    #[serde(rename = "ASSOCIATION")]
    Association,
    #[serde(rename = "ACCESS_REQUEST")]
    AccessRequest,
    #[serde(rename = "ACCESS_LOG")]
    AccessLog,
}

impl DocKind {
    /// The tag stored in the `docType` field and used as the key prefix.
    pub fn tag(&self) -> &'static str {
        match self {
            DocKind::PatientRecord => "PATIENT_RECORD",
            DocKind::PatientIdentifiers => "PATIENT_IDENTIFIERS",
            DocKind::Association => "ASSOCIATION",
            DocKind::AccessRequest => "ACCESS_REQUEST",
            DocKind::AccessLog => "ACCESS_LOG",
        }
    }
}

impl fmt::Display for DocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Serialize a document to its persisted JSON bytes.
pub fn to_bytes<T: Serialize>(document: &T) -> Result<Bytes, CoreError> {
    let buf = serde_json::to_vec(document).map_err(|e| CoreError::Encoding(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decode a document from its persisted JSON bytes.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CoreError> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::Decoding(e.to_string()))
}

/// The clinical record document.
///
/// Invariant: at most one per distinct `hashedIdentifier`. Created once,
/// mutated only by a full replace of the offline-data fields, never deleted
/// in normal flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub doc_type: DocKind,
    pub record_id: DocumentId,
    pub hashed_identifier: IdentityDigest,
    pub offline_data_url: String,
    pub hashed_data: String,
    pub salt: String,
    pub last_updated: i64,
    pub last_updated_tx_id: TransactionId,
}

impl PatientRecord {
    pub fn new(
        record_id: DocumentId,
        hashed_identifier: IdentityDigest,
        offline_data_url: impl Into<String>,
        hashed_data: impl Into<String>,
        salt: impl Into<String>,
        time: i64,
        tx_id: TransactionId,
    ) -> Self {
        Self {
            doc_type: DocKind::PatientRecord,
            record_id,
            hashed_identifier,
            offline_data_url: offline_data_url.into(),
            hashed_data: hashed_data.into(),
            salt: salt.into(),
            last_updated: time,
            last_updated_tx_id: tx_id,
        }
    }
}

/// The identifying-material document, decoupled from the clinical record so
/// that identity references and clinical-data references are stored apart.
///
/// One per patient, keyed by the same hashed identifier as the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentifiers {
    pub doc_type: DocKind,
    pub identifiers_id: DocumentId,
    pub hashed_identifier: IdentityDigest,
    pub offline_identifier_url: String,
    pub hashed_identifiers: String,
    pub salt: String,
    pub last_updated: i64,
    pub last_updated_tx_id: TransactionId,
}

impl PatientIdentifiers {
    pub fn new(
        identifiers_id: DocumentId,
        hashed_identifier: IdentityDigest,
        offline_identifier_url: impl Into<String>,
        hashed_identifiers: impl Into<String>,
        salt: impl Into<String>,
        time: i64,
        tx_id: TransactionId,
    ) -> Self {
        Self {
            doc_type: DocKind::PatientIdentifiers,
            identifiers_id,
            hashed_identifier,
            offline_identifier_url: offline_identifier_url.into(),
            hashed_identifiers: hashed_identifiers.into(),
            salt: salt.into(),
            last_updated: time,
            last_updated_tx_id: tx_id,
        }
    }
}

/// The link from a principal's pseudonym to the record it owns.
///
/// Invariant: at most one per `userId`. Never followed by direct reference,
/// only rediscovered by predicate query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub doc_type: DocKind,
    pub association_id: DocumentId,
    pub user_id: Pseudonym,
    pub record_id: DocumentId,
    pub date_added: i64,
    pub created_by: Pseudonym,
}

impl Association {
    pub fn new(
        association_id: DocumentId,
        user_id: Pseudonym,
        record_id: DocumentId,
        time: i64,
        created_by: Pseudonym,
    ) -> Self {
        Self {
            doc_type: DocKind::Association,
            association_id,
            user_id,
            record_id,
            date_added: time,
            created_by,
        }
    }
}

/// A practitioner's request for access to a patient's record.
///
/// Invariant: at most one per ordered (patientId, practitionerId) pair; the
/// practitioner is always the requester. Only the named patient ever mutates
/// the decision fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub doc_type: DocKind,
    pub request_id: DocumentId,
    pub patient_id: Pseudonym,
    pub practitioner_id: Pseudonym,
    pub decision: Decision,
    pub available_from: Option<i64>,
    pub available_until: Option<i64>,
    pub items_access: Vec<ItemAccess>,
    pub reviewed: bool,
    pub last_updated: i64,
    pub last_updated_tx_id: TransactionId,
}

impl AccessRequest {
    /// A freshly created, unreviewed request.
    pub fn new(
        request_id: DocumentId,
        patient_id: Pseudonym,
        practitioner_id: Pseudonym,
        time: i64,
        tx_id: TransactionId,
    ) -> Self {
        Self {
            doc_type: DocKind::AccessRequest,
            request_id,
            patient_id,
            practitioner_id,
            decision: Decision::Undefined,
            available_from: None,
            available_until: None,
            items_access: Vec::new(),
            reviewed: false,
            last_updated: time,
            last_updated_tx_id: tx_id,
        }
    }

    /// Whether this request currently grants access.
    ///
    /// `now` is threaded in from the invocation context; evaluating against
    /// a locally sampled clock would make replicas disagree about the same
    /// transaction.
    pub fn is_available(&self, now: i64) -> bool {
        match self.decision {
            Decision::Undefined => false,
            Decision::Unlimited => true,
            Decision::NoAccess => false,
            Decision::OneTime => match (self.available_from, self.available_until) {
                (Some(from), Some(until)) => from <= now && now <= until,
                _ => false,
            },
            // Item-level grants need per-item evaluation, which is not part
            // of the whole-record availability predicate.
            Decision::Custom => false,
        }
    }
}

/// One immutable audit entry per record-touching operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub doc_type: DocKind,
    pub id: DocumentId,
    pub record_id: DocumentId,
    pub accessor_id: Pseudonym,
    pub accessor_name: String,
    pub accessor_role: Role,
    pub accessor_org: String,
    pub action: Action,
    pub timestamp: i64,
    pub tx_id: TransactionId,
}

impl AccessLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: DocumentId,
        record_id: DocumentId,
        accessor_id: Pseudonym,
        accessor_name: impl Into<String>,
        accessor_role: Role,
        accessor_org: impl Into<String>,
        action: Action,
        timestamp: i64,
        tx_id: TransactionId,
    ) -> Self {
        Self {
            doc_type: DocKind::AccessLog,
            id,
            record_id,
            accessor_id,
            accessor_name: accessor_name.into(),
            accessor_role,
            accessor_org: accessor_org.into(),
            action,
            timestamp,
            tx_id,
        }
    }
}
