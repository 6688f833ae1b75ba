//! The access log: one immutable audit entry per record-touching operation.

use std::sync::Arc;

use tracing::info;

use healthgate_core::{
    derive_document_id, Action, AccessLogEntry, DocKind, DocumentId, to_bytes,
};
use healthgate_ledger::{LedgerStore, Query};

use crate::context::OpContext;
use crate::error::Result;
use crate::scan;

pub struct AccessLogRecorder<L> {
    ledger: Arc<L>,
    /// Organization name stamped into every entry.
    organization: String,
}

impl<L: LedgerStore> AccessLogRecorder<L> {
    pub fn new(ledger: Arc<L>, organization: impl Into<String>) -> Self {
        Self {
            ledger,
            organization: organization.into(),
        }
    }

    /// Append an audit entry for an operation on `record_id`.
    ///
    /// Accessor fields come from the resolved caller identity. Succeeds
    /// whenever the underlying write succeeds; nothing here re-queries the
    /// log, so the primary operation never fails on log-query correctness.
    pub async fn append(
        &self,
        ctx: &OpContext,
        record_id: &DocumentId,
        action: Action,
    ) -> Result<AccessLogEntry> {
        let id = derive_document_id(DocKind::AccessLog, &ctx.tx_id);
        let entry = AccessLogEntry::new(
            id.clone(),
            record_id.clone(),
            ctx.caller.principal.clone(),
            ctx.caller.name.clone(),
            ctx.caller.role,
            self.organization.clone(),
            action,
            ctx.now,
            ctx.tx_id.clone(),
        );
        self.ledger.put(&id, to_bytes(&entry)?, &ctx.stamp()).await?;
        info!(record = %record_id, action = %action, accessor = %entry.accessor_id,
              "access log entry appended");
        Ok(entry)
    }

    /// All audit entries for a record, `None` when there are none.
    pub async fn list_for_record(
        &self,
        record_id: &DocumentId,
    ) -> Result<Option<Vec<AccessLogEntry>>> {
        let query = Query::kind(DocKind::AccessLog).eq("recordId", record_id.as_str());
        let entries: Vec<AccessLogEntry> = scan::collect(self.ledger.as_ref(), query).await?;
        Ok((!entries.is_empty()).then_some(entries))
    }
}
