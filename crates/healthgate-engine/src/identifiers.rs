//! The identifier registry: the patient's identifying-material document,
//! stored apart from the clinical record so identity references and
//! clinical-data references never sit in one document.

use std::sync::Arc;

use tracing::info;

use healthgate_core::{
    derive_document_id, to_bytes, DocKind, IdentityDigest, PatientIdentifiers,
};
use healthgate_ledger::{LedgerStore, Query};

use crate::context::OpContext;
use crate::error::{EngineError, Result};
use crate::scan;

pub struct IdentifierRegistry<L> {
    ledger: Arc<L>,
}

impl<L: LedgerStore> IdentifierRegistry<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Create the identifiers document for a patient.
    pub async fn create(
        &self,
        ctx: &OpContext,
        hashed_identifier: IdentityDigest,
        offline_identifier_url: &str,
        hashed_identifiers: &str,
        salt: &str,
    ) -> Result<PatientIdentifiers> {
        let identifiers_id = derive_document_id(DocKind::PatientIdentifiers, &ctx.tx_id);
        let identifiers = PatientIdentifiers::new(
            identifiers_id.clone(),
            hashed_identifier,
            offline_identifier_url,
            hashed_identifiers,
            salt,
            ctx.now,
            ctx.tx_id.clone(),
        );
        self.ledger
            .put(&identifiers_id, to_bytes(&identifiers)?, &ctx.stamp())
            .await?;
        info!(identifiers = %identifiers_id, "patient identifiers created");
        Ok(identifiers)
    }

    /// Find the identifiers document for a digest, if any.
    pub async fn find_by_digest(
        &self,
        hashed_identifier: &IdentityDigest,
    ) -> Result<Option<PatientIdentifiers>> {
        let query = Query::kind(DocKind::PatientIdentifiers)
            .eq("hashedIdentifier", hashed_identifier.to_hex());
        scan::at_most_one(
            self.ledger.as_ref(),
            query,
            &format!("hashedIdentifier={hashed_identifier}"),
        )
        .await
    }

    /// As [`Self::find_by_digest`], but absence is an error.
    pub async fn get_by_digest(
        &self,
        hashed_identifier: &IdentityDigest,
    ) -> Result<PatientIdentifiers> {
        self.find_by_digest(hashed_identifier).await?.ok_or_else(|| {
            EngineError::NotFound(format!("patient identifiers {hashed_identifier}"))
        })
    }

    /// Replace the mutable fields of an existing identifiers document.
    pub async fn update(
        &self,
        ctx: &OpContext,
        hashed_identifier: &IdentityDigest,
        offline_identifier_url: &str,
        hashed_identifiers: &str,
        salt: &str,
    ) -> Result<PatientIdentifiers> {
        let mut identifiers = self.get_by_digest(hashed_identifier).await?;

        identifiers.offline_identifier_url = offline_identifier_url.to_string();
        identifiers.hashed_identifiers = hashed_identifiers.to_string();
        identifiers.salt = salt.to_string();
        identifiers.last_updated = ctx.now;
        identifiers.last_updated_tx_id = ctx.tx_id.clone();

        let key = identifiers.identifiers_id.clone();
        self.ledger
            .put(&key, to_bytes(&identifiers)?, &ctx.stamp())
            .await?;
        info!(identifiers = %key, "patient identifiers updated");
        Ok(identifiers)
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
    async fn test_create_find_update() {
        let registry = IdentifierRegistry::new(Arc::new(MemoryLedger::new()));
        let digest = hash_identifier("1985-03-03/id-9");

        registry
            .create(&ctx(1), digest, "ipfs://ids", "aa11", "salt-1")
            .await
            .unwrap();

        let found = registry.find_by_digest(&digest).await.unwrap().unwrap();
        assert_eq!(found.hashed_identifiers, "aa11");

        let updated = registry
            .update(&ctx(2), &digest, "ipfs://ids-v2", "bb22", "salt-2")
            .await
            .unwrap();
        assert_eq!(updated.hashed_identifiers, "bb22");
        assert_eq!(updated.identifiers_id, found.identifiers_id);
        assert_eq!(updated.last_updated, 200);
    }

    #[tokio::test]
    async fn test_absent_digest() {
        let registry = IdentifierRegistry::new(Arc::new(MemoryLedger::new()));
        let digest = hash_identifier("never-registered");

        assert!(registry.find_by_digest(&digest).await.unwrap().is_none());
        assert!(matches!(
            registry.get_by_digest(&digest).await,
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            registry.update(&ctx(1), &digest, "u", "h", "s").await,
            Err(EngineError::NotFound(_))
        ));
    }
}
