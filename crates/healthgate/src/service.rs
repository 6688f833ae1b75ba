//! The service facade: one authorization-checked entry point per exposed
//! operation.
//!
//! Every operation follows the same control flow: resolve the caller from
//! the invocation credential, consult the policy table, begin a ledger
//! transaction (for mutating flows), run the domain logic, and append an
//! audit entry for record-touching operations. Time is always an explicit
//! argument; nothing below this layer reads a clock.

use std::sync::Arc;

use tracing::debug;

use healthgate_core::{
    hash_identifier, AccessLogEntry, AccessRequest, Action, Decision, DocumentId, ItemAccess,
    PatientIdentifiers, PatientRecord, Pseudonym, Role,
};
use healthgate_engine::{
    policy, resolve_caller, AccessLogRecorder, AccessRequestEngine, AssociationIndex,
    CallerIdentity, CredentialContext, EngineError, IdentifierRegistry, OpContext, Operation,
    RecordRegistry, RequestRevision,
};
use healthgate_ledger::{LedgerStore, Page};

use crate::config::ServiceConfig;
use crate::error::Result;

/// The Healthgate service over a ledger backend.
pub struct HealthgateService<L: LedgerStore> {
    ledger: Arc<L>,
    requests: AccessRequestEngine<L>,
    records: RecordRegistry<L>,
    identifiers: IdentifierRegistry<L>,
    associations: AssociationIndex<L>,
    audit: AccessLogRecorder<L>,
}

impl<L: LedgerStore> HealthgateService<L> {
    /// Create a service instance over a ledger backend.
    pub fn new(ledger: L, config: ServiceConfig) -> Self {
        let ledger = Arc::new(ledger);
        Self {
            requests: AccessRequestEngine::new(ledger.clone()),
            records: RecordRegistry::new(ledger.clone()),
            identifiers: IdentifierRegistry::new(ledger.clone()),
            associations: AssociationIndex::new(ledger.clone()),
            audit: AccessLogRecorder::new(ledger.clone(), config.organization),
            ledger,
        }
    }

    /// Resolve and authorize the caller for a read-only operation.
    async fn authorize(
        &self,
        credential: &dyn CredentialContext,
        operation: Operation,
    ) -> Result<CallerIdentity> {
        let caller = resolve_caller(credential)?;
        policy::require(caller.role, operation)?;
        debug!(op = %operation, caller = %caller.principal, role = %caller.role, "authorized");
        Ok(caller)
    }

    /// Resolve, authorize, and open the invocation context for a mutating
    /// operation. The transaction id is allocated only after the policy
    /// check passes.
    async fn begin(
        &self,
        credential: &dyn CredentialContext,
        operation: Operation,
        now: i64,
    ) -> Result<OpContext> {
        let caller = self.authorize(credential, operation).await?;
        let tx_id = self.ledger.begin_transaction().await?;
        Ok(OpContext::new(caller, tx_id, now))
    }

    /// A practitioner may touch a patient's record only through a currently
    /// available access grant. The administrative identity bypasses this,
    /// as it bypasses the rest of the policy table.
    async fn require_available_grant(&self, ctx: &OpContext, patient_id: &Pseudonym) -> Result<()> {
        if ctx.caller.role != Role::Practitioner {
            return Ok(());
        }
        let available = self
            .requests
            .search(patient_id, &ctx.caller.principal)
            .await?
            .map(|request| request.is_available(ctx.now))
            .unwrap_or(false);
        if available {
            Ok(())
        } else {
            Err(EngineError::Unauthorized(format!(
                "no available access grant for patient {patient_id}"
            ))
            .into())
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Patient identifiers
    // ─────────────────────────────────────────────────────────────────────

    /// Whether a patient with this plaintext identifier is registered,
    /// returning the identifiers document when one exists.
    pub async fn user_exists(
        &self,
        credential: &dyn CredentialContext,
        identifier: &str,
    ) -> Result<Option<PatientIdentifiers>> {
        self.authorize(credential, Operation::UserExists).await?;
        let digest = hash_identifier(identifier);
        Ok(self.identifiers.find_by_digest(&digest).await?)
    }

    /// The identifiers document for a plaintext identifier.
    pub async fn get_patient_identifiers(
        &self,
        credential: &dyn CredentialContext,
        identifier: &str,
    ) -> Result<PatientIdentifiers> {
        self.authorize(credential, Operation::GetPatientIdentifiers)
            .await?;
        let digest = hash_identifier(identifier);
        Ok(self.identifiers.get_by_digest(&digest).await?)
    }

    /// Replace the identifying material stored for a patient.
    pub async fn update_patient_identifiers(
        &self,
        credential: &dyn CredentialContext,
        identifier: &str,
        offline_identifier_url: &str,
        hashed_identifiers: &str,
        salt: &str,
        time: i64,
    ) -> Result<PatientIdentifiers> {
        let ctx = self
            .begin(credential, Operation::UpdatePatientIdentifiers, time)
            .await?;
        let digest = hash_identifier(identifier);
        Ok(self
            .identifiers
            .update(&ctx, &digest, offline_identifier_url, hashed_identifiers, salt)
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Patient record
    // ─────────────────────────────────────────────────────────────────────

    /// Register a patient: clinical record, association, and identifiers in
    /// one flow, plus the CREATE audit entry.
    ///
    /// The caller must be the patient themselves: their credential pseudonym
    /// has to match `hashed_user_id`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_patient_record(
        &self,
        credential: &dyn CredentialContext,
        identifier: &str,
        hashed_user_id: &str,
        offline_data_url: &str,
        hashed_data: &str,
        salt: &str,
        offline_identifiers_url: &str,
        identifiers_hashed_data: &str,
        identifiers_salt: &str,
        time: i64,
    ) -> Result<PatientRecord> {
        let ctx = self
            .begin(credential, Operation::CreatePatientRecord, time)
            .await?;

        if ctx.caller.principal.as_str() != hashed_user_id {
            return Err(EngineError::Unauthorized(
                "a patient record can only be created for the calling patient".to_string(),
            )
            .into());
        }
        if identifier.is_empty() {
            return Err(EngineError::InvalidArgument("identifier not specified".to_string()).into());
        }

        let digest = hash_identifier(identifier);
        let record = self
            .records
            .create(&ctx, digest, offline_data_url, hashed_data, salt)
            .await?;
        self.associations
            .create(&ctx, ctx.caller.principal.clone(), record.record_id.clone())
            .await?;
        self.identifiers
            .create(
                &ctx,
                digest,
                offline_identifiers_url,
                identifiers_hashed_data,
                identifiers_salt,
            )
            .await?;
        self.audit
            .append(&ctx, &record.record_id, Action::Create)
            .await?;
        Ok(record)
    }

    /// A practitioner reads a patient's record through an available grant.
    pub async fn get_patient_record(
        &self,
        credential: &dyn CredentialContext,
        patient_id: &str,
        time: i64,
    ) -> Result<PatientRecord> {
        let ctx = self
            .begin(credential, Operation::GetPatientRecord, time)
            .await?;
        let patient = Pseudonym::from(patient_id);

        let association = self
            .associations
            .lookup(&patient)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("association for patient {patient}")))?;

        self.require_available_grant(&ctx, &patient).await?;

        let record = self.records.get(&association.record_id).await?;
        self.audit
            .append(&ctx, &association.record_id, Action::View)
            .await?;
        Ok(record)
    }

    /// A practitioner replaces a patient's record data through an available
    /// grant.
    pub async fn update_patient_record(
        &self,
        credential: &dyn CredentialContext,
        patient_id: &str,
        offline_data_url: &str,
        hashed_data: &str,
        salt: &str,
        time: i64,
    ) -> Result<PatientRecord> {
        let ctx = self
            .begin(credential, Operation::UpdatePatientRecord, time)
            .await?;
        let patient = Pseudonym::from(patient_id);

        let association = self
            .associations
            .lookup(&patient)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("association for patient {patient}")))?;

        self.require_available_grant(&ctx, &patient).await?;

        let record = self
            .records
            .update(&ctx, &association.record_id, offline_data_url, hashed_data, salt)
            .await?;
        self.audit
            .append(&ctx, &association.record_id, Action::Edit)
            .await?;
        Ok(record)
    }

    /// A patient reads their own record.
    pub async fn get_my_patient_record(
        &self,
        credential: &dyn CredentialContext,
        time: i64,
    ) -> Result<PatientRecord> {
        let ctx = self
            .begin(credential, Operation::GetMyPatientRecord, time)
            .await?;

        let association = self
            .associations
            .lookup(&ctx.caller.principal)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("association for patient {}", ctx.caller.principal))
            })?;

        let record = self.records.get(&association.record_id).await?;
        self.audit
            .append(&ctx, &association.record_id, Action::View)
            .await?;
        Ok(record)
    }

    /// A patient replaces their own record data.
    pub async fn update_my_patient_record(
        &self,
        credential: &dyn CredentialContext,
        offline_data_url: &str,
        hashed_data: &str,
        salt: &str,
        time: i64,
    ) -> Result<PatientRecord> {
        let ctx = self
            .begin(credential, Operation::UpdateMyPatientRecord, time)
            .await?;

        let association = self
            .associations
            .lookup(&ctx.caller.principal)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("association for patient {}", ctx.caller.principal))
            })?;

        let record = self
            .records
            .update(&ctx, &association.record_id, offline_data_url, hashed_data, salt)
            .await?;
        self.audit
            .append(&ctx, &association.record_id, Action::Edit)
            .await?;
        Ok(record)
    }

    /// Whether the caller's role may preview patient records at all.
    pub async fn preview_patient_record(
        &self,
        credential: &dyn CredentialContext,
    ) -> Result<bool> {
        let caller = resolve_caller(credential)?;
        Ok(policy::allowed(caller.role, Operation::PreviewPatientRecord))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Access requests
    // ─────────────────────────────────────────────────────────────────────

    /// A practitioner requests access to a patient's record.
    pub async fn create_access_request(
        &self,
        credential: &dyn CredentialContext,
        patient_id: &str,
        time: i64,
    ) -> Result<AccessRequest> {
        let ctx = self
            .begin(credential, Operation::CreateAccessRequest, time)
            .await?;
        Ok(self
            .requests
            .create(&ctx, &Pseudonym::from(patient_id))
            .await?)
    }

    /// The patient records their decision on a request.
    #[allow(clippy::too_many_arguments)]
    pub async fn review_access_request(
        &self,
        credential: &dyn CredentialContext,
        request_id: &str,
        decision: &str,
        available_from: Option<i64>,
        available_until: Option<i64>,
        items_access: Vec<ItemAccess>,
        time: i64,
    ) -> Result<AccessRequest> {
        let ctx = self
            .begin(credential, Operation::ReviewAccessRequest, time)
            .await?;
        Ok(self
            .requests
            .review(
                &ctx,
                &DocumentId::new(request_id),
                decision,
                available_from,
                available_until,
                items_access,
            )
            .await?)
    }

    /// Point read of a request by id.
    pub async fn get_access_request(
        &self,
        credential: &dyn CredentialContext,
        request_id: &str,
    ) -> Result<AccessRequest> {
        self.authorize(credential, Operation::GetAccessRequest)
            .await?;
        Ok(self.requests.get(&DocumentId::new(request_id)).await?)
    }

    /// The request between the caller and `user_id`, oriented by the
    /// caller's role: a patient looks up the request a practitioner sent
    /// them, a practitioner looks up the request they sent a patient.
    pub async fn get_access_request_for_user(
        &self,
        credential: &dyn CredentialContext,
        user_id: &str,
    ) -> Result<Option<AccessRequest>> {
        let caller = self
            .authorize(credential, Operation::GetAccessRequestForUser)
            .await?;
        let other = Pseudonym::from(user_id);

        let result = match caller.role {
            Role::Patient => self.requests.search(&caller.principal, &other).await?,
            Role::Practitioner => self.requests.search(&other, &caller.principal).await?,
            Role::Admin => {
                return Err(EngineError::Unauthorized(
                    "access requests are scoped to patients and practitioners".to_string(),
                )
                .into())
            }
        };
        Ok(result)
    }

    /// Whether a request exists for the ordered pair.
    pub async fn access_request_exists(
        &self,
        credential: &dyn CredentialContext,
        patient_id: &str,
        practitioner_id: &str,
    ) -> Result<bool> {
        self.authorize(credential, Operation::AccessRequestExists)
            .await?;
        Ok(self
            .requests
            .exists(&Pseudonym::from(patient_id), &Pseudonym::from(practitioner_id))
            .await?)
    }

    /// The calling practitioner's requests that currently grant access.
    pub async fn get_available_access_requests(
        &self,
        credential: &dyn CredentialContext,
        time: i64,
    ) -> Result<Vec<AccessRequest>> {
        let caller = self
            .authorize(credential, Operation::GetAvailableAccessRequests)
            .await?;
        let all = self
            .requests
            .list_for_practitioner(&caller.principal, None)
            .await?;
        Ok(all
            .into_iter()
            .filter(|request| request.is_available(time))
            .collect())
    }

    /// The caller's requests filtered by reviewed flag.
    pub async fn get_access_requests_by_reviewed(
        &self,
        credential: &dyn CredentialContext,
        reviewed: bool,
        page: Option<Page>,
    ) -> Result<Vec<AccessRequest>> {
        let caller = self
            .authorize(credential, Operation::GetAccessRequestsByReviewed)
            .await?;
        Ok(self.requests.list_by_reviewed(&caller, reviewed, page).await?)
    }

    /// The caller's requests filtered by decision, given as its wire string.
    pub async fn get_access_requests_by_status(
        &self,
        credential: &dyn CredentialContext,
        status: &str,
        page: Option<Page>,
    ) -> Result<Vec<AccessRequest>> {
        let caller = self
            .authorize(credential, Operation::GetAccessRequestsByStatus)
            .await?;
        let decision = Decision::parse(status)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
        Ok(self.requests.list_by_decision(&caller, decision, page).await?)
    }

    /// The caller's requests, most recently updated first.
    pub async fn get_recent_access_requests(
        &self,
        credential: &dyn CredentialContext,
        page: Option<Page>,
    ) -> Result<Vec<AccessRequest>> {
        let caller = self
            .authorize(credential, Operation::GetRecentAccessRequests)
            .await?;
        Ok(self.requests.list_recent(&caller, page).await?)
    }

    /// The full version history of a request.
    pub async fn get_access_request_history(
        &self,
        credential: &dyn CredentialContext,
        request_id: &str,
    ) -> Result<Vec<RequestRevision>> {
        self.authorize(credential, Operation::GetAccessRequestHistory)
            .await?;
        Ok(self.requests.history(&DocumentId::new(request_id)).await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Access log
    // ─────────────────────────────────────────────────────────────────────

    /// Append an audit entry for a record, action given as its wire string.
    pub async fn add_access_log(
        &self,
        credential: &dyn CredentialContext,
        record_id: &str,
        action: &str,
        time: i64,
    ) -> Result<AccessLogEntry> {
        let ctx = self.begin(credential, Operation::AddAccessLog, time).await?;
        let action =
            Action::parse(action).map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
        Ok(self
            .audit
            .append(&ctx, &DocumentId::new(record_id), action)
            .await?)
    }

    /// The audit trail of the calling patient's own record. `None` when the
    /// record has never been touched.
    pub async fn get_access_log(
        &self,
        credential: &dyn CredentialContext,
    ) -> Result<Option<Vec<AccessLogEntry>>> {
        let caller = self
            .authorize(credential, Operation::GetAccessLogsForUser)
            .await?;

        let association = self
            .associations
            .lookup(&caller.principal)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("association for patient {}", caller.principal))
            })?;

        Ok(self.audit.list_for_record(&association.record_id).await?)
    }
}
