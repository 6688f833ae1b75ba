//! The association index: from a principal's pseudonym to the record it
//! owns.
//!
//! This is the only path from caller identity to a record. It is never
//! followed by direct reference - lookup re-runs a predicate query each
//! time.

use std::sync::Arc;

use tracing::info;

use healthgate_core::{
    derive_document_id, to_bytes, Association, DocKind, DocumentId, Pseudonym,
};
use healthgate_ledger::{LedgerStore, Query};

use crate::context::OpContext;
use crate::error::Result;
use crate::scan;

pub struct AssociationIndex<L> {
    ledger: Arc<L>,
}

impl<L: LedgerStore> AssociationIndex<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Insert an association unconditionally.
    ///
    /// The record-creation flow is responsible for calling this at most
    /// once per user; under concurrent creation the store's commit-time
    /// validation leaves at most one standing.
    pub async fn create(
        &self,
        ctx: &OpContext,
        user_id: Pseudonym,
        record_id: DocumentId,
    ) -> Result<Association> {
        let association_id = derive_document_id(DocKind::Association, &ctx.tx_id);
        let association = Association::new(
            association_id.clone(),
            user_id,
            record_id,
            ctx.now,
            ctx.caller.principal.clone(),
        );
        self.ledger
            .put(&association_id, to_bytes(&association)?, &ctx.stamp())
            .await?;
        info!(user = %association.user_id, record = %association.record_id, "association created");
        Ok(association)
    }

    /// Find the association for a pseudonym, if any.
    pub async fn lookup(&self, user_id: &Pseudonym) -> Result<Option<Association>> {
        let query = Query::kind(DocKind::Association).eq("userId", user_id.as_str());
        scan::at_most_one(self.ledger.as_ref(), query, &format!("userId={user_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthgate_core::{Role, TransactionId};
    use healthgate_ledger::MemoryLedger;

    use crate::context::CallerIdentity;
    use crate::error::EngineError;

    fn ctx(principal: &str, n: u64) -> OpContext {
        OpContext::new(
            CallerIdentity {
                principal: Pseudonym::from(principal),
                name: format!("x509::CN={principal}"),
                role: Role::Patient,
            },
            TransactionId::new(format!("tx-{n}")),
            n as i64 * 100,
        )
    }

    #[tokio::test]
    async fn test_create_then_lookup() {
        let ledger = Arc::new(MemoryLedger::new());
        let index = AssociationIndex::new(ledger);

        let record_id = DocumentId::new("PATIENT_RECORD:01");
        index
            .create(&ctx("patient-1", 1), Pseudonym::from("patient-1"), record_id.clone())
            .await
            .unwrap();

        let found = index
            .lookup(&Pseudonym::from("patient-1"))
            .await
            .unwrap()
            .expect("association exists");
        assert_eq!(found.record_id, record_id);
        assert_eq!(found.created_by, Pseudonym::from("patient-1"));
    }

    #[tokio::test]
    async fn test_lookup_absent_is_none() {
        let ledger = Arc::new(MemoryLedger::new());
        let index = AssociationIndex::new(ledger);
        assert!(index
            .lookup(&Pseudonym::from("nobody"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_associations_are_fatal() {
        let ledger = Arc::new(MemoryLedger::new());
        let index = AssociationIndex::new(ledger);

        let user = Pseudonym::from("patient-1");
        index
            .create(&ctx("patient-1", 1), user.clone(), DocumentId::new("PATIENT_RECORD:01"))
            .await
            .unwrap();
        index
            .create(&ctx("patient-1", 2), user.clone(), DocumentId::new("PATIENT_RECORD:02"))
            .await
            .unwrap();

        assert!(matches!(
            index.lookup(&user).await,
            Err(EngineError::IntegrityViolation { matches: 2, .. })
        ));
    }
}
