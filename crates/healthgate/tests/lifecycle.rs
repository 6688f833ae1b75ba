//! End-to-end lifecycle tests over the service facade.
//!
//! These exercise the full consent flow the way a client would: register a
//! patient, request access, review, and read the record through the grant,
//! against both ledger backends.

use healthgate::{
    Decision, HealthgateService, LedgerStore, MemoryLedger, ServiceConfig, SqliteLedger,
};
use healthgate_testkit::{StaticCredential, TestParties};

fn service() -> HealthgateService<MemoryLedger> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    HealthgateService::new(MemoryLedger::new(), ServiceConfig::default())
}

/// Register patient-1 with a default record.
async fn register_patient<L: LedgerStore>(
    service: &HealthgateService<L>,
    parties: &TestParties,
    time: i64,
) -> healthgate::PatientRecord {
    service
        .create_patient_record(
            &parties.patient,
            "1987-05-12/national-id-123",
            "patient-1",
            "ipfs://record-v1",
            "deadbeef",
            "salt-r1",
            "ipfs://identifiers-v1",
            "cafebabe",
            "salt-i1",
            time,
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn patient_registration_creates_record_association_identifiers_and_log() {
    let service = service();
    let parties = TestParties::new();

    let record = register_patient(&service, &parties, 100).await;
    assert_eq!(record.offline_data_url, "ipfs://record-v1");

    // The patient can read their own record back through the association.
    let mine = service
        .get_my_patient_record(&parties.patient, 110)
        .await
        .unwrap();
    assert_eq!(mine.record_id, record.record_id);

    // Identifiers are registered under the same plaintext identifier.
    let exists = service
        .user_exists(&parties.admin, "1987-05-12/national-id-123")
        .await
        .unwrap();
    assert!(exists.is_some());

    // CREATE plus the VIEW from get_my_patient_record.
    let log = service
        .get_access_log(&parties.patient)
        .await
        .unwrap()
        .expect("log entries exist");
    assert_eq!(log.len(), 2);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let service = service();
    let parties = TestParties::new();

    register_patient(&service, &parties, 100).await;

    let err = service
        .create_patient_record(
            &parties.patient,
            "1987-05-12/national-id-123",
            "patient-1",
            "ipfs://other",
            "00",
            "s",
            "ipfs://other-ids",
            "11",
            "s",
            200,
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn registration_requires_matching_pseudonym_and_identifier() {
    let service = service();
    let parties = TestParties::new();

    // Pseudonym mismatch: patient-1 cannot register a record for patient-2.
    let err = service
        .create_patient_record(
            &parties.patient,
            "some-identifier",
            "patient-2",
            "u",
            "h",
            "s",
            "u2",
            "h2",
            "s2",
            100,
        )
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());

    // Empty identifier is rejected before anything is written.
    let err = service
        .create_patient_record(
            &parties.patient,
            "",
            "patient-1",
            "u",
            "h",
            "s",
            "u2",
            "h2",
            "s2",
            100,
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid argument"));
}

#[tokio::test]
async fn one_time_grant_lifecycle() {
    let service = service();
    let parties = TestParties::new();
    register_patient(&service, &parties, 50).await;

    // Practitioner X creates a request for patient Y at t=100.
    let request = service
        .create_access_request(&parties.practitioner, "patient-1", 100)
        .await
        .unwrap();
    assert_eq!(request.decision, Decision::Undefined);
    assert!(!request.reviewed);

    // Without a grant the record stays closed.
    let err = service
        .get_patient_record(&parties.practitioner, "patient-1", 150)
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());

    // Patient Y reviews: one-time window 200..=300.
    let reviewed = service
        .review_access_request(
            &parties.patient,
            request.request_id.as_str(),
            "ONE_TIME",
            Some(200),
            Some(300),
            vec![],
            160,
        )
        .await
        .unwrap();
    assert!(reviewed.reviewed);

    // Before the window opens: still closed.
    let err = service
        .get_patient_record(&parties.practitioner, "patient-1", 170)
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());

    // Inside the window: the record opens and the view is logged.
    let record = service
        .get_patient_record(&parties.practitioner, "patient-1", 250)
        .await
        .unwrap();
    assert_eq!(record.offline_data_url, "ipfs://record-v1");

    // And the practitioner may edit through the same grant.
    let updated = service
        .update_patient_record(
            &parties.practitioner,
            "patient-1",
            "ipfs://record-v2",
            "feedface",
            "salt-r2",
            260,
        )
        .await
        .unwrap();
    assert_eq!(updated.offline_data_url, "ipfs://record-v2");

    // After the window closes, re-requesting resends under the same id.
    let resent = service
        .create_access_request(&parties.practitioner, "patient-1", 400)
        .await
        .unwrap();
    assert_eq!(resent.request_id, request.request_id);
    assert_eq!(resent.decision, Decision::Undefined);
    assert!(!resent.reviewed);
    assert_eq!(resent.available_from, None);
    assert_eq!(resent.available_until, None);

    // The patient sees the full trail: CREATE, VIEW, EDIT.
    let log = service
        .get_access_log(&parties.patient)
        .await
        .unwrap()
        .expect("log entries exist");
    assert_eq!(log.len(), 3);
}

#[tokio::test]
async fn unlimited_and_no_access_round_trip() {
    let service = service();
    let parties = TestParties::new();
    register_patient(&service, &parties, 50).await;

    let request = service
        .create_access_request(&parties.practitioner, "patient-1", 100)
        .await
        .unwrap();

    // UNLIMITED: available at any time, and create stays idempotent.
    service
        .review_access_request(
            &parties.patient,
            request.request_id.as_str(),
            "UNLIMITED",
            None,
            None,
            vec![],
            150,
        )
        .await
        .unwrap();
    service
        .get_patient_record(&parties.practitioner, "patient-1", 10_000_000)
        .await
        .unwrap();
    let again = service
        .create_access_request(&parties.practitioner, "patient-1", 10_000_001)
        .await
        .unwrap();
    assert_eq!(again.decision, Decision::Unlimited);
    assert_eq!(again.request_id, request.request_id);

    // NO_ACCESS: closed again, and the next create resends.
    service
        .review_access_request(
            &parties.patient,
            request.request_id.as_str(),
            "NO_ACCESS",
            None,
            None,
            vec![],
            10_000_002,
        )
        .await
        .unwrap();
    let err = service
        .get_patient_record(&parties.practitioner, "patient-1", 10_000_003)
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());

    let resent = service
        .create_access_request(&parties.practitioner, "patient-1", 10_000_004)
        .await
        .unwrap();
    assert_eq!(resent.request_id, request.request_id);
    assert_eq!(resent.decision, Decision::Undefined);
}

#[tokio::test]
async fn unauthorized_roles_cannot_create_or_review() {
    let service = service();
    let parties = TestParties::new();
    register_patient(&service, &parties, 50).await;

    // A patient cannot create an access request, and nothing is written.
    let err = service
        .create_access_request(&parties.patient, "patient-2", 100)
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    let exists = service
        .access_request_exists(&parties.practitioner, "patient-2", "patient-1")
        .await
        .unwrap();
    assert!(!exists);

    // A practitioner cannot review.
    let request = service
        .create_access_request(&parties.practitioner, "patient-1", 110)
        .await
        .unwrap();
    let err = service
        .review_access_request(
            &parties.practitioner,
            request.request_id.as_str(),
            "UNLIMITED",
            None,
            None,
            vec![],
            120,
        )
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());

    // A different patient cannot review someone else's request.
    let other_patient = StaticCredential::patient("patient-2");
    let err = service
        .review_access_request(
            &other_patient,
            request.request_id.as_str(),
            "UNLIMITED",
            None,
            None,
            vec![],
            130,
        )
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn missing_request_is_not_found() {
    let service = service();
    let parties = TestParties::new();

    let err = service
        .get_access_request(&parties.practitioner, "ACCESS_REQUEST:doesnotexist")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn request_lookup_is_oriented_by_role() {
    let service = service();
    let parties = TestParties::new();

    let request = service
        .create_access_request(&parties.practitioner, "patient-1", 100)
        .await
        .unwrap();

    // The practitioner names the patient...
    let from_practitioner = service
        .get_access_request_for_user(&parties.practitioner, "patient-1")
        .await
        .unwrap()
        .expect("request found");
    assert_eq!(from_practitioner.request_id, request.request_id);

    // ...and the patient names the practitioner.
    let from_patient = service
        .get_access_request_for_user(&parties.patient, "practitioner-1")
        .await
        .unwrap()
        .expect("request found");
    assert_eq!(from_patient.request_id, request.request_id);

    // Absent pairs are None, not an error.
    let none = service
        .get_access_request_for_user(&parties.patient, "practitioner-9")
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn listings_and_availability_filter() {
    let service = service();
    let parties = TestParties::new();

    for patient in ["patient-1", "patient-2", "patient-3"] {
        service
            .create_access_request(&parties.practitioner, patient, 100)
            .await
            .unwrap();
    }

    // Grant exactly one of them.
    let request = service
        .get_access_request_for_user(&parties.practitioner, "patient-2")
        .await
        .unwrap()
        .unwrap();
    let patient_2 = StaticCredential::patient("patient-2");
    service
        .review_access_request(
            &patient_2,
            request.request_id.as_str(),
            "UNLIMITED",
            None,
            None,
            vec![],
            200,
        )
        .await
        .unwrap();

    let available = service
        .get_available_access_requests(&parties.practitioner, 300)
        .await
        .unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].patient_id.as_str(), "patient-2");

    let unreviewed = service
        .get_access_requests_by_reviewed(&parties.practitioner, false, None)
        .await
        .unwrap();
    assert_eq!(unreviewed.len(), 2);

    let granted = service
        .get_access_requests_by_status(&parties.practitioner, "UNLIMITED", None)
        .await
        .unwrap();
    assert_eq!(granted.len(), 1);

    let err = service
        .get_access_requests_by_status(&parties.practitioner, "GRANTED", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid argument"));

    let recent = service
        .get_recent_access_requests(&parties.practitioner, None)
        .await
        .unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].patient_id.as_str(), "patient-2");
}

#[tokio::test]
async fn request_history_tracks_the_state_machine() {
    let service = service();
    let parties = TestParties::new();

    let request = service
        .create_access_request(&parties.practitioner, "patient-1", 100)
        .await
        .unwrap();
    service
        .review_access_request(
            &parties.patient,
            request.request_id.as_str(),
            "NO_ACCESS",
            None,
            None,
            vec![],
            200,
        )
        .await
        .unwrap();
    service
        .create_access_request(&parties.practitioner, "patient-1", 300)
        .await
        .unwrap();

    let history = service
        .get_access_request_history(&parties.practitioner, request.request_id.as_str())
        .await
        .unwrap();
    let decisions: Vec<Decision> = history
        .iter()
        .map(|rev| rev.value.as_ref().unwrap().decision)
        .collect();
    assert_eq!(
        decisions,
        vec![Decision::Undefined, Decision::NoAccess, Decision::Undefined]
    );
}

#[tokio::test]
async fn preview_is_role_gated_without_an_error_path() {
    let service = service();
    let parties = TestParties::new();

    assert!(service
        .preview_patient_record(&parties.practitioner)
        .await
        .unwrap());
    assert!(!service
        .preview_patient_record(&parties.patient)
        .await
        .unwrap());
}

#[tokio::test]
async fn claimless_credential_acts_as_admin() {
    let service = service();
    let ops = StaticCredential::claimless("ops-1");

    // UserExists is admin-only; the claimless fallback passes it.
    let result = service.user_exists(&ops, "unregistered-person").await.unwrap();
    assert!(result.is_none());

    // A broken claim is rejected outright.
    let broken = StaticCredential::broken_claim("who-1");
    let err = service.user_exists(&broken, "x").await.unwrap_err();
    assert!(err.to_string().contains("malformed credential"));
}

#[tokio::test]
async fn full_flow_over_sqlite_backend() {
    let service = HealthgateService::new(SqliteLedger::open_memory().unwrap(), ServiceConfig::default());
    let parties = TestParties::new();
    register_patient(&service, &parties, 50).await;

    let request = service
        .create_access_request(&parties.practitioner, "patient-1", 100)
        .await
        .unwrap();
    service
        .review_access_request(
            &parties.patient,
            request.request_id.as_str(),
            "ONE_TIME",
            Some(200),
            Some(300),
            vec![],
            150,
        )
        .await
        .unwrap();

    assert!(service
        .get_patient_record(&parties.practitioner, "patient-1", 150)
        .await
        .is_err());
    assert!(service
        .get_patient_record(&parties.practitioner, "patient-1", 250)
        .await
        .is_ok());

    let resent = service
        .create_access_request(&parties.practitioner, "patient-1", 400)
        .await
        .unwrap();
    assert_eq!(resent.request_id, request.request_id);
    assert_eq!(resent.decision, Decision::Undefined);
}
