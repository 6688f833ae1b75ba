//! The record registry: create/read/update of the clinical record document.

use std::sync::Arc;

use tracing::info;

use healthgate_core::{
    derive_document_id, from_bytes, to_bytes, DocKind, DocumentId, IdentityDigest, PatientRecord,
};
use healthgate_ledger::{LedgerStore, Query};

use crate::context::OpContext;
use crate::error::{EngineError, Result};
use crate::scan;

pub struct RecordRegistry<L> {
    ledger: Arc<L>,
}

impl<L: LedgerStore> RecordRegistry<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Create the clinical record for a hashed identifier.
    ///
    /// The uniqueness check is an optimistic query-then-insert, not a lock:
    /// under concurrent creation for the same identifier the store's
    /// commit-time validation lets at most one commit, and the losers'
    /// conflicts are retried by the invoking client, not here.
    pub async fn create(
        &self,
        ctx: &OpContext,
        hashed_identifier: IdentityDigest,
        offline_data_url: &str,
        hashed_data: &str,
        salt: &str,
    ) -> Result<PatientRecord> {
        if self.find_by_identifier(&hashed_identifier).await?.is_some() {
            return Err(EngineError::AlreadyExists(format!(
                "patient record for identifier {hashed_identifier}"
            )));
        }

        let record_id = derive_document_id(DocKind::PatientRecord, &ctx.tx_id);
        let record = PatientRecord::new(
            record_id.clone(),
            hashed_identifier,
            offline_data_url,
            hashed_data,
            salt,
            ctx.now,
            ctx.tx_id.clone(),
        );
        self.ledger
            .put(&record_id, to_bytes(&record)?, &ctx.stamp())
            .await?;
        info!(record = %record_id, "patient record created");
        Ok(record)
    }

    /// Find the record carrying a hashed identifier, if any.
    pub async fn find_by_identifier(
        &self,
        hashed_identifier: &IdentityDigest,
    ) -> Result<Option<PatientRecord>> {
        let query =
            Query::kind(DocKind::PatientRecord).eq("hashedIdentifier", hashed_identifier.to_hex());
        scan::at_most_one(
            self.ledger.as_ref(),
            query,
            &format!("hashedIdentifier={hashed_identifier}"),
        )
        .await
    }

    /// Point read by record id.
    pub async fn get(&self, record_id: &DocumentId) -> Result<PatientRecord> {
        let bytes = self
            .ledger
            .get(record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("patient record {record_id}")))?;
        Ok(from_bytes(&bytes)?)
    }

    /// Replace the mutable fields of an existing record.
    pub async fn update(
        &self,
        ctx: &OpContext,
        record_id: &DocumentId,
        offline_data_url: &str,
        hashed_data: &str,
        salt: &str,
    ) -> Result<PatientRecord> {
        let mut record = self.get(record_id).await?;

        record.offline_data_url = offline_data_url.to_string();
        record.hashed_data = hashed_data.to_string();
        record.salt = salt.to_string();
        record.last_updated = ctx.now;
        record.last_updated_tx_id = ctx.tx_id.clone();

        self.ledger
            .put(record_id, to_bytes(&record)?, &ctx.stamp())
            .await?;
        info!(record = %record_id, "patient record updated");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthgate_core::{hash_identifier, Pseudonym, Role, TransactionId};
    use healthgate_ledger::MemoryLedger;

    use crate::context::CallerIdentity;

    fn ctx(n: u64) -> OpContext {
        OpContext::new(
            CallerIdentity {
                principal: Pseudonym::from("patient-1"),
                name: "x509::CN=patient-1".to_string(),
                role: Role::Patient,
            },
            TransactionId::new(format!("tx-{n}")),
            n as i64 * 100,
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = RecordRegistry::new(Arc::new(MemoryLedger::new()));
        let digest = hash_identifier("1990-01-01/id-1");

        let record = registry
            .create(&ctx(1), digest, "ipfs://rec", "deadbeef", "salt-1")
            .await
            .unwrap();

        let fetched = registry.get(&record.record_id).await.unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn test_second_create_for_same_identifier_fails() {
        let registry = RecordRegistry::new(Arc::new(MemoryLedger::new()));
        let digest = hash_identifier("1990-01-01/id-1");

        registry
            .create(&ctx(1), digest, "ipfs://rec", "deadbeef", "salt-1")
            .await
            .unwrap();

        let err = registry
            .create(&ctx(2), digest, "ipfs://other", "cafebabe", "salt-2")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_get_missing_record() {
        let registry = RecordRegistry::new(Arc::new(MemoryLedger::new()));
        let err = registry
            .get(&DocumentId::new("PATIENT_RECORD:ffff"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_replaces_mutable_fields() {
        let registry = RecordRegistry::new(Arc::new(MemoryLedger::new()));
        let digest = hash_identifier("1990-01-01/id-1");

        let record = registry
            .create(&ctx(1), digest, "ipfs://rec", "deadbeef", "salt-1")
            .await
            .unwrap();

        let updated = registry
            .update(&ctx(2), &record.record_id, "ipfs://rec-v2", "cafebabe", "salt-2")
            .await
            .unwrap();

        assert_eq!(updated.offline_data_url, "ipfs://rec-v2");
        assert_eq!(updated.hashed_data, "cafebabe");
        assert_eq!(updated.last_updated, 200);
        assert_eq!(updated.last_updated_tx_id, TransactionId::new("tx-2"));
        // Identity fields survive the replace.
        assert_eq!(updated.hashed_identifier, digest);
        assert_eq!(updated.record_id, record.record_id);
    }
}
