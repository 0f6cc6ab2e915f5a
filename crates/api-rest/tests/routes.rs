use api_rest::auth::{
    API_KEY_HEADER, ORGANIZATION_ID_HEADER, ORGANIZATION_TYPE_HEADER, USER_ID_HEADER,
    USER_ROLE_HEADER,
};
use api_rest::{router, AppState, HeaderIdentityResolver};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use medtrip_core::ids::{OrganizationId, PatientId, UserId, VehicleId};
use medtrip_core::types::{NonEmptyText, OrganizationType, Role};
use medtrip_core::{CoreConfig, MemoryStore, Principal, TransportService};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const KEY: &str = "test-key";

fn text(value: &str) -> NonEmptyText {
    NonEmptyText::new(value).expect("valid text")
}

struct Fixture {
    app: Router,
    service: TransportService,
    root: Principal,
    hospital: OrganizationId,
    stranger: OrganizationId,
    fleet: OrganizationId,
    vehicle: VehicleId,
    patient: PatientId,
}

impl Fixture {
    fn new() -> Self {
        let service = TransportService::new(
            Arc::new(CoreConfig::in_memory()),
            Arc::new(MemoryStore::new()),
        );
        let root = Principal::superadmin(UserId::new());
        let org = |name: &str, kind| {
            service
                .create_organization(&root, text(name), kind)
                .expect("organization")
                .id
        };
        let hospital = org("St Mary's", OrganizationType::Hospital);
        let stranger = org("Royal Infirmary", OrganizationType::Hospital);
        let fleet = org("Rapid Response", OrganizationType::Fleet);
        let vehicle = service
            .register_vehicle(&root, fleet, text("RR-01"))
            .expect("vehicle")
            .id;
        service.approve_vehicle(&root, vehicle).expect("approve");
        let patient = service
            .register_patient(&root, text("Ada Lovelace"), None)
            .expect("patient")
            .id;
        service
            .ensure_active_partnership(&root, fleet, hospital)
            .expect("partnership");

        let state = AppState::new(service.clone(), Arc::new(HeaderIdentityResolver::new(KEY)));
        Self {
            app: router(state),
            service,
            root,
            hospital,
            stranger,
            fleet,
            vehicle,
            patient,
        }
    }

    fn member(&self, org: OrganizationId, kind: OrganizationType, role: Role) -> Principal {
        let user = self
            .service
            .register_user(&self.root, org, role, text("Staff Member"))
            .expect("user");
        Principal::new(user.id, role, org, kind)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        principal: Option<&Principal>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(p) = principal {
            builder = builder
                .header(API_KEY_HEADER, KEY)
                .header(USER_ID_HEADER, p.user_id.to_string())
                .header(USER_ROLE_HEADER, p.role.as_str());
            if let (Some(id), Some(kind)) = (p.organization_id, p.organization_type) {
                builder = builder
                    .header(ORGANIZATION_ID_HEADER, id.to_string())
                    .header(ORGANIZATION_TYPE_HEADER, kind.as_str());
            }
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

#[tokio::test]
async fn health_needs_no_identity() {
    let fx = Fixture::new();
    let (status, body) = fx.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn missing_or_wrong_key_is_unauthorised() {
    let fx = Fixture::new();
    let (status, body) = fx.call(Method::GET, "/trips", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("unauthenticated"));

    let request = Request::builder()
        .uri("/trips")
        .header(API_KEY_HEADER, "nope")
        .header(USER_ID_HEADER, UserId::new().to_string())
        .header(USER_ROLE_HEADER, "admin")
        .body(Body::empty())
        .expect("request");
    let response = fx.app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn trip_lifecycle_over_http() {
    let fx = Fixture::new();
    let doctor = fx.member(fx.hospital, OrganizationType::Hospital, Role::Doctor);
    let outsider = fx.member(fx.stranger, OrganizationType::Hospital, Role::Admin);

    let onboard = json!({
        "patient_id": fx.patient.to_string(),
        "vehicle_id": fx.vehicle.to_string(),
        "pickup": { "address": "1 High Street" },
    });
    let (status, trip) = fx
        .call(Method::POST, "/trips", Some(&doctor), Some(onboard.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(trip["status"], json!("onboarded"));
    let trip_id = trip["id"].as_str().expect("trip id").to_string();

    let (status, body) = fx
        .call(Method::POST, "/trips", Some(&doctor), Some(onboard))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("conflict"));

    let (status, _) = fx
        .call(Method::GET, &format!("/trips/{trip_id}"), Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, access) = fx
        .call(
            Method::GET,
            &format!("/trips/{trip_id}/access"),
            Some(&outsider),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(access["allowed"], json!(false));

    let (status, trip) = fx
        .call(
            Method::POST,
            &format!("/trips/{trip_id}/transit"),
            Some(&doctor),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trip["status"], json!("in_transit"));

    let (status, _) = fx
        .call(
            Method::POST,
            &format!("/trips/{trip_id}/entries"),
            Some(&doctor),
            Some(json!({ "kind": "vitals", "payload": { "pulse": 88 } })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, trip) = fx
        .call(
            Method::POST,
            &format!("/trips/{trip_id}/offboard"),
            Some(&doctor),
            Some(json!({ "notes": "handed over in resus" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trip["status"], json!("offboarded"));
    assert_eq!(trip["snapshot"]["data_entries"].as_array().map(Vec::len), Some(1));

    let (status, _) = fx
        .call(
            Method::POST,
            &format!("/trips/{trip_id}/cancel"),
            Some(&doctor),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, vehicles) = fx.call(Method::GET, "/vehicles", Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vehicles[0]["status"], json!("available"));
}

#[tokio::test]
async fn onboarding_without_partnership_is_forbidden() {
    let fx = Fixture::new();
    let outsider = fx.member(fx.stranger, OrganizationType::Hospital, Role::Paramedic);
    let (status, body) = fx
        .call(
            Method::POST,
            "/trips",
            Some(&outsider),
            Some(json!({
                "patient_id": fx.patient.to_string(),
                "vehicle_id": fx.vehicle.to_string(),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!("forbidden"));
}

#[tokio::test]
async fn blank_call_sign_is_bad_request() {
    let fx = Fixture::new();
    let (status, _) = fx
        .call(
            Method::POST,
            "/vehicles",
            Some(&fx.root),
            Some(json!({ "organization_id": fx.fleet.to_string(), "call_sign": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn crew_assignment_and_unassignment() {
    let fx = Fixture::new();
    let admin = fx.member(fx.hospital, OrganizationType::Hospital, Role::Admin);
    let medic = fx.member(fx.hospital, OrganizationType::Hospital, Role::Paramedic);
    let vehicle = fx.vehicle.to_string();

    let (status, assignment) = fx
        .call(
            Method::POST,
            &format!("/vehicles/{vehicle}/assignments"),
            Some(&admin),
            Some(json!({ "user_id": medic.user_id.to_string(), "role_label": "lead" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(assignment["is_active"], json!(true));

    let (status, listed) = fx
        .call(
            Method::GET,
            &format!("/vehicles/{vehicle}/assignments"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, removed) = fx
        .call(
            Method::DELETE,
            &format!("/vehicles/{vehicle}/assignments/{}", medic.user_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["path"], json!("assigning_organization"));

    let (status, _) = fx
        .call(
            Method::DELETE,
            &format!("/vehicles/{vehicle}/assignments/{}", medic.user_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_path_id_is_rejected_as_json() {
    let fx = Fixture::new();
    let (status, body) = fx
        .call(Method::GET, "/trips/not-an-id", Some(&fx.root), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid_input"));
}

#[tokio::test]
async fn unparseable_json_body_is_rejected_as_json() {
    let fx = Fixture::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/patients")
        .header(API_KEY_HEADER, KEY)
        .header(USER_ID_HEADER, fx.root.user_id.to_string())
        .header(USER_ROLE_HEADER, "superadmin")
        .header("content-type", "application/json")
        .body(Body::from("{ \"name\": "))
        .expect("request");
    let response = fx.app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json error body");
    assert_eq!(body["error"], json!("invalid_input"));
}

#[tokio::test]
async fn mistyped_offboard_notes_leave_the_trip_open() {
    let fx = Fixture::new();
    let doctor = fx.member(fx.hospital, OrganizationType::Hospital, Role::Doctor);
    let (status, trip) = fx
        .call(
            Method::POST,
            "/trips",
            Some(&doctor),
            Some(json!({
                "patient_id": fx.patient.to_string(),
                "vehicle_id": fx.vehicle.to_string(),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let trip_id = trip["id"].as_str().expect("trip id").to_string();

    let (status, body) = fx
        .call(
            Method::POST,
            &format!("/trips/{trip_id}/offboard"),
            Some(&doctor),
            Some(json!({ "notes": ["x"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid_input"));

    let (status, body) = fx
        .call(
            Method::POST,
            &format!("/trips/{trip_id}/cancel"),
            Some(&doctor),
            Some(json!({ "reason": 42 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid_input"));

    let (status, trip) = fx
        .call(Method::GET, &format!("/trips/{trip_id}"), Some(&doctor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trip["status"], json!("onboarded"));

    let (status, trip) = fx
        .call(
            Method::POST,
            &format!("/trips/{trip_id}/offboard"),
            Some(&doctor),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trip["status"], json!("offboarded"));
    assert_eq!(trip["snapshot"]["notes"], Value::Null);
}
