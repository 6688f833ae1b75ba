//! The access-request lifecycle state machine.
//!
//! A request's `decision` starts `UNDEFINED`, moves to a reviewed state
//! when the patient decides, and moves back to `UNDEFINED` via *resend*
//! when a denial or a lapsed one-time window is re-requested. Resend is a
//! state transition, not a new entity: the request id is preserved, so the
//! one-request-per-(patient, practitioner) invariant holds across the whole
//! lifecycle.

use std::sync::Arc;

use tracing::{debug, info};

use healthgate_core::{
    derive_document_id, from_bytes, to_bytes, AccessRequest, Decision, DocKind, DocumentId,
    ItemAccess, Pseudonym, Role, TransactionId,
};
use healthgate_ledger::{LedgerStore, Page, Query};

use crate::context::{CallerIdentity, OpContext};
use crate::error::{EngineError, Result};
use crate::scan;

/// One version of a request from the ledger's per-key history.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRevision {
    pub tx_id: TransactionId,
    pub timestamp: i64,
    /// The request at that version, `None` for a deletion marker.
    pub value: Option<AccessRequest>,
}

pub struct AccessRequestEngine<L> {
    ledger: Arc<L>,
}

impl<L: LedgerStore> AccessRequestEngine<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create (or re-trigger) the request from the calling practitioner to
    /// `patient_id`.
    ///
    /// If a request for the ordered pair already exists, the outcome
    /// depends on its decision:
    /// - `UNLIMITED`: already fully granted, returned as-is
    /// - `NO_ACCESS`: resent
    /// - `ONE_TIME`: returned as-is while the window has not opened or is
    ///   still open; resent once the window has closed
    /// - anything else: returned as-is
    pub async fn create(&self, ctx: &OpContext, patient_id: &Pseudonym) -> Result<AccessRequest> {
        let practitioner_id = ctx.caller.principal.clone();

        if let Some(existing) = self.search(patient_id, &practitioner_id).await? {
            debug!(request = %existing.request_id, decision = %existing.decision,
                   "request for pair already exists");
            return match existing.decision {
                Decision::Unlimited => Ok(existing),
                Decision::NoAccess => self.resend(ctx, existing).await,
                Decision::OneTime => {
                    let opens_later = existing
                        .available_from
                        .is_some_and(|from| ctx.now < from);
                    // A one-time grant with no window bound behaves as
                    // lapsed, matching a cleared window after resend.
                    let lapsed = existing
                        .available_until
                        .map_or(true, |until| until < ctx.now);
                    if opens_later {
                        Ok(existing)
                    } else if lapsed {
                        self.resend(ctx, existing).await
                    } else {
                        Ok(existing)
                    }
                }
                Decision::Undefined | Decision::Custom => Ok(existing),
            };
        }

        let request_id = derive_document_id(DocKind::AccessRequest, &ctx.tx_id);
        let request = AccessRequest::new(
            request_id.clone(),
            patient_id.clone(),
            practitioner_id,
            ctx.now,
            ctx.tx_id.clone(),
        );
        self.ledger
            .put(&request_id, to_bytes(&request)?, &ctx.stamp())
            .await?;
        info!(request = %request_id, patient = %patient_id, "access request created");
        Ok(request)
    }

    /// Reset a request to `UNDEFINED`, clearing its window, preserving its
    /// identity.
    async fn resend(&self, ctx: &OpContext, mut request: AccessRequest) -> Result<AccessRequest> {
        request.decision = Decision::Undefined;
        request.available_from = None;
        request.available_until = None;
        request.reviewed = false;
        request.last_updated = ctx.now;
        request.last_updated_tx_id = ctx.tx_id.clone();

        let key = request.request_id.clone();
        self.ledger
            .put(&key, to_bytes(&request)?, &ctx.stamp())
            .await?;
        info!(request = %key, "access request resent");
        Ok(request)
    }

    /// Record the patient's decision on a request.
    ///
    /// The decision arrives as its wire string and is validated against the
    /// closed enum; only the named patient may review their own request.
    pub async fn review(
        &self,
        ctx: &OpContext,
        request_id: &DocumentId,
        decision: &str,
        available_from: Option<i64>,
        available_until: Option<i64>,
        items_access: Vec<ItemAccess>,
    ) -> Result<AccessRequest> {
        let decision = Decision::parse(decision)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;

        let mut request = self.get(request_id).await?;

        if ctx.caller.principal != request.patient_id {
            return Err(EngineError::Unauthorized(
                "only the named patient may review an access request".to_string(),
            ));
        }

        request.decision = decision;
        request.available_from = available_from;
        request.available_until = available_until;
        request.items_access = items_access;
        request.reviewed = true;
        request.last_updated = ctx.now;
        request.last_updated_tx_id = ctx.tx_id.clone();

        self.ledger
            .put(request_id, to_bytes(&request)?, &ctx.stamp())
            .await?;
        info!(request = %request_id, decision = %decision, "access request reviewed");
        Ok(request)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────

    /// Point read by request id.
    pub async fn get(&self, request_id: &DocumentId) -> Result<AccessRequest> {
        let bytes = self
            .ledger
            .get(request_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("access request {request_id}")))?;
        Ok(from_bytes(&bytes)?)
    }

    /// The request for an ordered (patient, practitioner) pair, if any.
    pub async fn search(
        &self,
        patient_id: &Pseudonym,
        practitioner_id: &Pseudonym,
    ) -> Result<Option<AccessRequest>> {
        let query = Query::kind(DocKind::AccessRequest)
            .eq("patientId", patient_id.as_str())
            .eq("practitionerId", practitioner_id.as_str());
        scan::at_most_one(
            self.ledger.as_ref(),
            query,
            &format!("pair=({patient_id}, {practitioner_id})"),
        )
        .await
    }

    /// Whether a request exists for the ordered pair.
    pub async fn exists(
        &self,
        patient_id: &Pseudonym,
        practitioner_id: &Pseudonym,
    ) -> Result<bool> {
        Ok(self.search(patient_id, practitioner_id).await?.is_some())
    }

    /// All requests addressed to a practitioner, available or not.
    pub async fn list_for_practitioner(
        &self,
        practitioner_id: &Pseudonym,
        page: Option<Page>,
    ) -> Result<Vec<AccessRequest>> {
        let mut query =
            Query::kind(DocKind::AccessRequest).eq("practitionerId", practitioner_id.as_str());
        if let Some(page) = page {
            query = query.page(page);
        }
        scan::collect(self.ledger.as_ref(), query).await
    }

    /// The caller's requests filtered by reviewed flag.
    pub async fn list_by_reviewed(
        &self,
        caller: &CallerIdentity,
        reviewed: bool,
        page: Option<Page>,
    ) -> Result<Vec<AccessRequest>> {
        let mut query = Query::kind(DocKind::AccessRequest)
            .eq(scope_field(caller)?, caller.principal.as_str())
            .eq("reviewed", reviewed);
        if let Some(page) = page {
            query = query.page(page);
        }
        scan::collect(self.ledger.as_ref(), query).await
    }

    /// The caller's requests filtered by decision.
    pub async fn list_by_decision(
        &self,
        caller: &CallerIdentity,
        decision: Decision,
        page: Option<Page>,
    ) -> Result<Vec<AccessRequest>> {
        let mut query = Query::kind(DocKind::AccessRequest)
            .eq(scope_field(caller)?, caller.principal.as_str())
            .eq("decision", decision.as_str());
        if let Some(page) = page {
            query = query.page(page);
        }
        scan::collect(self.ledger.as_ref(), query).await
    }

    /// The caller's requests, most recently updated first.
    pub async fn list_recent(
        &self,
        caller: &CallerIdentity,
        page: Option<Page>,
    ) -> Result<Vec<AccessRequest>> {
        let mut query = Query::kind(DocKind::AccessRequest)
            .eq(scope_field(caller)?, caller.principal.as_str())
            .gte("lastUpdated", 0)
            .sort_desc("lastUpdated");
        if let Some(page) = page {
            query = query.page(page);
        }
        scan::collect(self.ledger.as_ref(), query).await
    }

    /// The full version history of a request, oldest first.
    pub async fn history(&self, request_id: &DocumentId) -> Result<Vec<RequestRevision>> {
        let versions = self.ledger.history(request_id).await?;
        versions
            .into_iter()
            .map(|entry| {
                let value = match entry.value {
                    Some(bytes) => Some(from_bytes(&bytes)?),
                    None => None,
                };
                Ok(RequestRevision {
                    tx_id: entry.tx_id,
                    timestamp: entry.timestamp,
                    value,
                })
            })
            .collect()
    }
}

/// Which side of a request the caller's pseudonym scopes.
fn scope_field(caller: &CallerIdentity) -> Result<&'static str> {
    match caller.role {
        Role::Patient => Ok("patientId"),
        Role::Practitioner => Ok("practitionerId"),
        Role::Admin => Err(EngineError::Unauthorized(
            "access requests are scoped to patients and practitioners".to_string(),
        )),
    }
}
