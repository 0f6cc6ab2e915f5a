mod common;

use common::Harness;
use medtrip_core::events::AuditRecord;
use medtrip_core::types::{OrganizationType, Role};
use medtrip_core::{CoreConfig, CoreError, TransportService};
use std::fs;
use std::sync::Arc;

fn open(dir: &tempfile::TempDir) -> TransportService {
    let cfg = CoreConfig::new(
        Some(dir.path().join("medtrip.json")),
        Some(dir.path().join("audit.jsonl")),
        10,
    )
    .expect("config");
    TransportService::open(Arc::new(cfg)).expect("open service")
}

#[test]
fn active_trip_survives_restart_and_still_blocks_the_vehicle() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let h = Harness::with_service(open(&dir));
    h.service
        .ensure_active_partnership(&h.root, h.fleet, h.hospital)
        .expect("partner");
    let nurse = h.member(h.hospital, Role::Staff);
    let trip = h.onboard(&nurse, h.patient, h.vehicle).expect("onboard");
    let second_patient = h.patient("Charles Babbage");
    drop(h.service);

    let reopened = open(&dir);
    let restored = reopened.get_trip(&h.root, trip.id).expect("trip reloaded");
    assert_eq!(restored, trip);

    let err = reopened
        .onboard(
            &nurse,
            medtrip_core::repositories::trips::OnboardRequest {
                patient_id: second_patient,
                vehicle_id: h.vehicle,
                destination_organization_id: None,
                pickup: None,
                destination: None,
            },
        )
        .expect_err("vehicle still on its trip");
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[test]
fn audit_log_records_committed_writes_only() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let h = Harness::with_service(open(&dir));
    let nurse = h.member(h.hospital, Role::Staff);

    h.onboard(&nurse, h.patient, h.vehicle)
        .expect_err("no partnership, nothing committed");

    let raw = fs::read_to_string(dir.path().join("audit.jsonl")).expect("audit log");
    let records: Vec<AuditRecord> = raw
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect();

    assert!(records.iter().any(|r| r.action == "vehicle.approve"));
    assert!(records.iter().all(|r| r.action != "trip.onboard"));
}

#[test]
fn second_service_on_the_same_data_file_is_refused() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let root = medtrip_core::Principal::superadmin(medtrip_core::ids::UserId::new());

    let server = open(&dir);
    server
        .create_organization(&root, common::text("Server Hospital"), OrganizationType::Hospital)
        .expect("server write");

    let cfg = CoreConfig::new(Some(dir.path().join("medtrip.json")), None, 10).expect("config");
    let err = TransportService::open(Arc::new(cfg))
        .err()
        .expect("data file is already held");
    assert!(matches!(err, CoreError::Conflict(_)));

    server
        .create_organization(&root, common::text("Late Fleet"), OrganizationType::Fleet)
        .expect("holder keeps writing");
    drop(server);

    let reopened = open(&dir);
    let mut names: Vec<String> = reopened
        .list_organizations()
        .expect("list")
        .into_iter()
        .map(|org| org.name.to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Late Fleet".to_string(), "Server Hospital".to_string()]);
}
