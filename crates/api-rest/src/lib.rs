//! # API REST
//!
//! HTTP surface of the transport engine.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - caller identity from request headers
//! - OpenAPI/Swagger documentation
//! - mapping engine errors and extractor rejections to JSON error bodies

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;

use auth::IdentityResolver;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use medtrip_core::TransportService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use auth::HeaderIdentityResolver;
pub use error::{ApiError, ApiResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: TransportService,
    pub identity: Arc<dyn IdentityResolver>,
}

impl AppState {
    pub fn new(service: TransportService, identity: Arc<dyn IdentityResolver>) -> Self {
        Self { service, identity }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_organizations,
        handlers::create_organization,
        handlers::set_organization_status,
        handlers::register_user,
        handlers::suspend_user,
        handlers::reinstate_user,
        handlers::list_vehicles,
        handlers::register_vehicle,
        handlers::approve_vehicle,
        handlers::set_vehicle_status,
        handlers::list_assignments,
        handlers::assign_crew,
        handlers::unassign_crew,
        handlers::list_collaboration_requests,
        handlers::request_collaboration,
        handlers::accept_collaboration,
        handlers::reject_collaboration,
        handlers::cancel_collaboration,
        handlers::deactivate_partnership,
        handlers::list_patients,
        handlers::register_patient,
        handlers::get_patient,
        handlers::deactivate_patient,
        handlers::list_trips,
        handlers::onboard,
        handlers::get_trip,
        handlers::check_trip_access,
        handlers::start_transit,
        handlers::add_trip_entry,
        handlers::set_trip_destination,
        handlers::offboard,
        handlers::cancel_trip,
    ),
    components(schemas(
        error::ErrorBody,
        dto::HealthRes,
        dto::CreateOrganizationReq,
        dto::SetOrganizationStatusReq,
        dto::RegisterUserReq,
        dto::RegisterVehicleReq,
        dto::SetVehicleStatusReq,
        dto::AssignCrewReq,
        dto::UnassignRes,
        dto::CollaborationReq,
        dto::PartnershipPairReq,
        dto::RegisterPatientReq,
        dto::OnboardReq,
        dto::TripEntryReq,
        dto::SetDestinationReq,
        dto::OffboardReq,
        dto::CancelReq,
        dto::TripAccessRes,
    ))
)]
pub struct ApiDoc;

/// Build the full application router, Swagger UI included.
pub fn router(state: AppState) -> Router {
    use handlers::*;

    Router::new()
        .route("/health", get(health))
        .route(
            "/organizations",
            get(list_organizations).post(create_organization),
        )
        .route("/organizations/:id/status", put(set_organization_status))
        .route("/users", post(register_user))
        .route("/users/:id/suspend", post(suspend_user))
        .route("/users/:id/reinstate", post(reinstate_user))
        .route("/vehicles", get(list_vehicles).post(register_vehicle))
        .route("/vehicles/:id/approve", post(approve_vehicle))
        .route("/vehicles/:id/status", put(set_vehicle_status))
        .route(
            "/vehicles/:id/assignments",
            get(list_assignments).post(assign_crew),
        )
        .route("/vehicles/:id/assignments/:user_id", delete(unassign_crew))
        .route(
            "/collaboration-requests",
            get(list_collaboration_requests).post(request_collaboration),
        )
        .route(
            "/collaboration-requests/:id/accept",
            post(accept_collaboration),
        )
        .route(
            "/collaboration-requests/:id/reject",
            post(reject_collaboration),
        )
        .route(
            "/collaboration-requests/:id/cancel",
            post(cancel_collaboration),
        )
        .route("/partnerships/deactivate", post(deactivate_partnership))
        .route("/patients", get(list_patients).post(register_patient))
        .route("/patients/:id", get(get_patient))
        .route("/patients/:id/deactivate", post(deactivate_patient))
        .route("/trips", get(list_trips).post(onboard))
        .route("/trips/:id", get(get_trip))
        .route("/trips/:id/access", get(check_trip_access))
        .route("/trips/:id/transit", post(start_transit))
        .route("/trips/:id/entries", post(add_trip_entry))
        .route("/trips/:id/destination", post(set_trip_destination))
        .route("/trips/:id/offboard", post(offboard))
        .route("/trips/:id/cancel", post(cancel_trip))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
