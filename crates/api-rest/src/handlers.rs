//! HTTP handlers.
//!
//! Each handler resolves the caller, converts the body into engine types and calls exactly one
//! [`medtrip_core::TransportService`] operation.

use crate::dto::*;
use crate::error::{ApiResult, ErrorBody};
use crate::extract::{ApiJson, ApiPath, ApiQuery, OptionalJson};
use crate::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use medtrip_core::ids::{CollaborationRequestId, OrganizationId, PatientId, TripId, UserId, VehicleId};
use medtrip_core::repositories::assignments::Assignment;
use medtrip_core::repositories::organizations::Organization;
use medtrip_core::repositories::partnerships::{Acceptance, CollaborationRequest, Partnership};
use medtrip_core::repositories::patients::Patient;
use medtrip_core::repositories::trips::{DataEntry, OnboardRequest, Trip, TripFilter};
use medtrip_core::repositories::users::{Suspension, User};
use medtrip_core::repositories::vehicles::Vehicle;
use medtrip_core::types::NonEmptyText;
use medtrip_core::Principal;

fn caller(state: &AppState, headers: &HeaderMap) -> ApiResult<Principal> {
    state.identity.resolve(headers)
}

fn text(value: String) -> ApiResult<NonEmptyText> {
    Ok(NonEmptyText::new(value)?)
}

fn optional_text(value: Option<String>) -> ApiResult<Option<NonEmptyText>> {
    value.map(text).transpose()
}

// ============================================================================
// HEALTH
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is alive", body = HealthRes))
)]
pub async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "MedTrip REST API is alive".into(),
    })
}

// ============================================================================
// ORGANIZATIONS
// ============================================================================

#[utoipa::path(
    get,
    path = "/organizations",
    responses((status = 200, description = "All organizations"))
)]
pub async fn list_organizations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Organization>>> {
    caller(&state, &headers)?;
    Ok(Json(state.service.list_organizations()?))
}

#[utoipa::path(
    post,
    path = "/organizations",
    request_body = CreateOrganizationReq,
    responses(
        (status = 201, description = "Organization created"),
        (status = 403, description = "Caller is not a superadmin", body = ErrorBody)
    )
)]
pub async fn create_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateOrganizationReq>,
) -> ApiResult<(StatusCode, Json<Organization>)> {
    let principal = caller(&state, &headers)?;
    let org = state
        .service
        .create_organization(&principal, text(req.name)?, req.organization_type)?;
    Ok((StatusCode::CREATED, Json(org)))
}

#[utoipa::path(
    put,
    path = "/organizations/{id}/status",
    params(("id" = String, Path, description = "Organization id")),
    request_body = SetOrganizationStatusReq,
    responses((status = 200, description = "Status changed"))
)]
pub async fn set_organization_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<OrganizationId>,
    ApiJson(req): ApiJson<SetOrganizationStatusReq>,
) -> ApiResult<Json<Organization>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(
        state
            .service
            .set_organization_status(&principal, id, req.status)?,
    ))
}

// ============================================================================
// USERS
// ============================================================================

#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterUserReq,
    responses((status = 201, description = "User registered"))
)]
pub async fn register_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<RegisterUserReq>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let principal = caller(&state, &headers)?;
    let user =
        state
            .service
            .register_user(&principal, req.organization_id, req.role, text(req.name)?)?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/users/{id}/suspend",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User suspended and unassigned from every vehicle"),
        (status = 409, description = "Already suspended", body = ErrorBody)
    )
)]
pub async fn suspend_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<UserId>,
) -> ApiResult<Json<Suspension>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.suspend_user(&principal, id)?))
}

#[utoipa::path(
    post,
    path = "/users/{id}/reinstate",
    params(("id" = String, Path, description = "User id")),
    responses((status = 200, description = "User reinstated"))
)]
pub async fn reinstate_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<UserId>,
) -> ApiResult<Json<User>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.reinstate_user(&principal, id)?))
}

// ============================================================================
// VEHICLES
// ============================================================================

#[utoipa::path(
    get,
    path = "/vehicles",
    responses((status = 200, description = "Vehicles visible to the caller"))
)]
pub async fn list_vehicles(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Vehicle>>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.list_vehicles(&principal)?))
}

#[utoipa::path(
    post,
    path = "/vehicles",
    request_body = RegisterVehicleReq,
    responses((status = 201, description = "Vehicle registered, pending approval"))
)]
pub async fn register_vehicle(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<RegisterVehicleReq>,
) -> ApiResult<(StatusCode, Json<Vehicle>)> {
    let principal = caller(&state, &headers)?;
    let vehicle =
        state
            .service
            .register_vehicle(&principal, req.organization_id, text(req.call_sign)?)?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

#[utoipa::path(
    post,
    path = "/vehicles/{id}/approve",
    params(("id" = String, Path, description = "Vehicle id")),
    responses(
        (status = 200, description = "Vehicle approved"),
        (status = 422, description = "Vehicle is not pending approval", body = ErrorBody)
    )
)]
pub async fn approve_vehicle(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<VehicleId>,
) -> ApiResult<Json<Vehicle>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.approve_vehicle(&principal, id)?))
}

#[utoipa::path(
    put,
    path = "/vehicles/{id}/status",
    params(("id" = String, Path, description = "Vehicle id")),
    request_body = SetVehicleStatusReq,
    responses((status = 200, description = "Status changed"))
)]
pub async fn set_vehicle_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<VehicleId>,
    ApiJson(req): ApiJson<SetVehicleStatusReq>,
) -> ApiResult<Json<Vehicle>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(
        state
            .service
            .set_vehicle_status(&principal, id, req.status)?,
    ))
}

#[utoipa::path(
    get,
    path = "/vehicles/{id}/assignments",
    params(("id" = String, Path, description = "Vehicle id")),
    responses((status = 200, description = "Active assignments visible to the caller"))
)]
pub async fn list_assignments(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<VehicleId>,
) -> ApiResult<Json<Vec<Assignment>>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.list_assignments(&principal, id)?))
}

#[utoipa::path(
    post,
    path = "/vehicles/{id}/assignments",
    params(("id" = String, Path, description = "Vehicle id")),
    request_body = AssignCrewReq,
    responses((status = 201, description = "Crew member assigned"))
)]
pub async fn assign_crew(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<VehicleId>,
    ApiJson(req): ApiJson<AssignCrewReq>,
) -> ApiResult<(StatusCode, Json<Assignment>)> {
    let principal = caller(&state, &headers)?;
    let assignment = state.service.assign_crew(
        &principal,
        id,
        req.user_id,
        optional_text(req.role_label)?,
    )?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    delete,
    path = "/vehicles/{id}/assignments/{user_id}",
    params(
        ("id" = String, Path, description = "Vehicle id"),
        ("user_id" = String, Path, description = "Crew member's user id"),
        UnassignQuery
    ),
    responses(
        (status = 200, description = "Assignment removed", body = UnassignRes),
        (status = 404, description = "No active assignment", body = ErrorBody)
    )
)]
pub async fn unassign_crew(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath((id, user_id)): ApiPath<(VehicleId, UserId)>,
    ApiQuery(query): ApiQuery<UnassignQuery>,
) -> ApiResult<Json<UnassignRes>> {
    let principal = caller(&state, &headers)?;
    let removed = state
        .service
        .unassign_crew(&principal, id, user_id, query.assigning_org)?;
    Ok(Json(UnassignRes {
        assignment_id: removed.assignment.id,
        path: removed.path,
    }))
}

// ============================================================================
// COLLABORATION AND PARTNERSHIPS
// ============================================================================

#[utoipa::path(
    get,
    path = "/collaboration-requests",
    responses((status = 200, description = "Requests involving the caller's organization"))
)]
pub async fn list_collaboration_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<CollaborationRequest>>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.list_collaboration_requests(&principal)?))
}

#[utoipa::path(
    post,
    path = "/collaboration-requests",
    request_body = CollaborationReq,
    responses(
        (status = 201, description = "Request created"),
        (status = 409, description = "Already pending or partnered", body = ErrorBody)
    )
)]
pub async fn request_collaboration(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CollaborationReq>,
) -> ApiResult<(StatusCode, Json<CollaborationRequest>)> {
    let principal = caller(&state, &headers)?;
    let request = state.service.request_collaboration(
        &principal,
        req.hospital_id,
        req.fleet_id,
        optional_text(req.message)?,
    )?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    post,
    path = "/collaboration-requests/{id}/accept",
    params(("id" = String, Path, description = "Request id")),
    responses((status = 200, description = "Accepted; partnership ensured"))
)]
pub async fn accept_collaboration(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<CollaborationRequestId>,
) -> ApiResult<Json<Acceptance>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.accept_collaboration(&principal, id)?))
}

#[utoipa::path(
    post,
    path = "/collaboration-requests/{id}/reject",
    params(("id" = String, Path, description = "Request id")),
    responses((status = 200, description = "Rejected"))
)]
pub async fn reject_collaboration(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<CollaborationRequestId>,
) -> ApiResult<Json<CollaborationRequest>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.reject_collaboration(&principal, id)?))
}

#[utoipa::path(
    post,
    path = "/collaboration-requests/{id}/cancel",
    params(("id" = String, Path, description = "Request id")),
    responses((status = 200, description = "Cancelled"))
)]
pub async fn cancel_collaboration(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<CollaborationRequestId>,
) -> ApiResult<Json<CollaborationRequest>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.cancel_collaboration(&principal, id)?))
}

#[utoipa::path(
    post,
    path = "/partnerships/deactivate",
    request_body = PartnershipPairReq,
    responses((status = 200, description = "Partnership ended"))
)]
pub async fn deactivate_partnership(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<PartnershipPairReq>,
) -> ApiResult<Json<Partnership>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.deactivate_partnership(
        &principal,
        req.fleet_id,
        req.hospital_id,
    )?))
}

// ============================================================================
// PATIENTS
// ============================================================================

#[utoipa::path(
    get,
    path = "/patients",
    responses((status = 200, description = "Patients visible to the caller"))
)]
pub async fn list_patients(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Patient>>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.list_patients(&principal)?))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = RegisterPatientReq,
    responses((status = 201, description = "Patient registered"))
)]
pub async fn register_patient(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<RegisterPatientReq>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    let principal = caller(&state, &headers)?;
    let patient = state.service.register_patient(
        &principal,
        text(req.name)?,
        optional_text(req.national_id)?,
    )?;
    Ok((StatusCode::CREATED, Json(patient)))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient"),
        (status = 403, description = "Not visible to the caller", body = ErrorBody)
    )
)]
pub async fn get_patient(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<PatientId>,
) -> ApiResult<Json<Patient>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.get_patient(&principal, id)?))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/deactivate",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient deactivated"),
        (status = 409, description = "Patient is on an active trip", body = ErrorBody)
    )
)]
pub async fn deactivate_patient(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<PatientId>,
) -> ApiResult<Json<Patient>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.deactivate_patient(&principal, id)?))
}

// ============================================================================
// TRIPS
// ============================================================================

#[utoipa::path(
    get,
    path = "/trips",
    params(TripQuery),
    responses((status = 200, description = "Trips visible to the caller"))
)]
pub async fn list_trips(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<TripQuery>,
) -> ApiResult<Json<Vec<Trip>>> {
    let principal = caller(&state, &headers)?;
    let filter = TripFilter {
        status: query.status,
        vehicle_id: query.vehicle_id,
    };
    Ok(Json(state.service.list_trips(&principal, &filter)?))
}

#[utoipa::path(
    post,
    path = "/trips",
    request_body = OnboardReq,
    responses(
        (status = 201, description = "Patient onboarded"),
        (status = 403, description = "No ownership or partnership", body = ErrorBody),
        (status = 409, description = "Vehicle or patient already on a trip", body = ErrorBody),
        (status = 422, description = "Vehicle not available", body = ErrorBody)
    )
)]
pub async fn onboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<OnboardReq>,
) -> ApiResult<(StatusCode, Json<Trip>)> {
    let principal = caller(&state, &headers)?;
    let trip = state.service.onboard(
        &principal,
        OnboardRequest {
            patient_id: req.patient_id,
            vehicle_id: req.vehicle_id,
            destination_organization_id: req.destination_organization_id,
            pickup: req.pickup,
            destination: req.destination,
        },
    )?;
    Ok((StatusCode::CREATED, Json(trip)))
}

#[utoipa::path(
    get,
    path = "/trips/{id}",
    params(("id" = String, Path, description = "Trip id")),
    responses(
        (status = 200, description = "Trip"),
        (status = 403, description = "No access path", body = ErrorBody)
    )
)]
pub async fn get_trip(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<TripId>,
) -> ApiResult<Json<Trip>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.get_trip(&principal, id)?))
}

#[utoipa::path(
    get,
    path = "/trips/{id}/access",
    params(("id" = String, Path, description = "Trip id")),
    responses((status = 200, description = "Access decision for the caller", body = TripAccessRes))
)]
pub async fn check_trip_access(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<TripId>,
) -> ApiResult<Json<TripAccessRes>> {
    let principal = caller(&state, &headers)?;
    let path = state.service.check_trip_access(&principal, id)?;
    Ok(Json(TripAccessRes {
        allowed: path.is_some(),
        path,
    }))
}

#[utoipa::path(
    post,
    path = "/trips/{id}/transit",
    params(("id" = String, Path, description = "Trip id")),
    responses((status = 200, description = "Trip in transit"))
)]
pub async fn start_transit(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<TripId>,
) -> ApiResult<Json<Trip>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.start_transit(&principal, id)?))
}

#[utoipa::path(
    post,
    path = "/trips/{id}/entries",
    params(("id" = String, Path, description = "Trip id")),
    request_body = TripEntryReq,
    responses((status = 201, description = "Entry recorded"))
)]
pub async fn add_trip_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<TripId>,
    ApiJson(req): ApiJson<TripEntryReq>,
) -> ApiResult<(StatusCode, Json<DataEntry>)> {
    let principal = caller(&state, &headers)?;
    let entry = state
        .service
        .add_trip_entry(&principal, id, text(req.kind)?, req.payload)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    post,
    path = "/trips/{id}/destination",
    params(("id" = String, Path, description = "Trip id")),
    request_body = SetDestinationReq,
    responses((status = 200, description = "Destination changed"))
)]
pub async fn set_trip_destination(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<TripId>,
    ApiJson(req): ApiJson<SetDestinationReq>,
) -> ApiResult<Json<Trip>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.set_trip_destination(
        &principal,
        id,
        req.hospital_id,
    )?))
}

#[utoipa::path(
    post,
    path = "/trips/{id}/offboard",
    params(("id" = String, Path, description = "Trip id")),
    request_body = OffboardReq,
    responses(
        (status = 200, description = "Trip offboarded with snapshot"),
        (status = 409, description = "Trip already finished", body = ErrorBody)
    )
)]
pub async fn offboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<TripId>,
    OptionalJson(req): OptionalJson<OffboardReq>,
) -> ApiResult<Json<Trip>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.offboard(
        &principal,
        id,
        optional_text(req.notes)?,
    )?))
}

#[utoipa::path(
    post,
    path = "/trips/{id}/cancel",
    params(("id" = String, Path, description = "Trip id")),
    request_body = CancelReq,
    responses(
        (status = 200, description = "Trip cancelled"),
        (status = 409, description = "Trip already finished", body = ErrorBody)
    )
)]
pub async fn cancel_trip(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<TripId>,
    OptionalJson(req): OptionalJson<CancelReq>,
) -> ApiResult<Json<Trip>> {
    let principal = caller(&state, &headers)?;
    Ok(Json(state.service.cancel_trip(
        &principal,
        id,
        optional_text(req.reason)?,
    )?))
}
