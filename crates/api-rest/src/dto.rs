//! Request and response bodies.
//!
//! Identifiers travel as canonical 32-hex strings; enum values use their snake_case names.

use medtrip_core::access::{TripAccessPath, UnassignPath};
use medtrip_core::ids::{OrganizationId, PatientId, UserId, VehicleId};
use medtrip_core::repositories::organizations::OrganizationStatus;
use medtrip_core::repositories::trips::TripStatus;
use medtrip_core::repositories::vehicles::VehicleStatus;
use medtrip_core::types::{OrganizationType, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrganizationReq {
    pub name: String,
    #[schema(value_type = String, example = "hospital")]
    pub organization_type: OrganizationType,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetOrganizationStatusReq {
    #[schema(value_type = String, example = "suspended")]
    pub status: OrganizationStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterUserReq {
    #[schema(value_type = String)]
    pub organization_id: OrganizationId,
    #[schema(value_type = String, example = "paramedic")]
    pub role: Role,
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterVehicleReq {
    #[schema(value_type = String)]
    pub organization_id: OrganizationId,
    pub call_sign: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetVehicleStatusReq {
    #[schema(value_type = String, example = "maintenance")]
    pub status: VehicleStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignCrewReq {
    #[schema(value_type = String)]
    pub user_id: UserId,
    pub role_label: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UnassignQuery {
    /// Organization whose assignment row should be removed.
    #[param(value_type = Option<String>)]
    pub assigning_org: Option<OrganizationId>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnassignRes {
    #[schema(value_type = String)]
    pub assignment_id: medtrip_core::ids::AssignmentId,
    #[schema(value_type = String, example = "fleet_owner_override")]
    pub path: UnassignPath,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CollaborationReq {
    #[schema(value_type = String)]
    pub hospital_id: OrganizationId,
    #[schema(value_type = String)]
    pub fleet_id: OrganizationId,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PartnershipPairReq {
    #[schema(value_type = String)]
    pub fleet_id: OrganizationId,
    #[schema(value_type = String)]
    pub hospital_id: OrganizationId,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterPatientReq {
    pub name: String,
    pub national_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OnboardReq {
    #[schema(value_type = String)]
    pub patient_id: PatientId,
    #[schema(value_type = String)]
    pub vehicle_id: VehicleId,
    #[schema(value_type = Option<String>)]
    pub destination_organization_id: Option<OrganizationId>,
    #[schema(value_type = Option<Object>)]
    pub pickup: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub destination: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TripEntryReq {
    pub kind: String,
    #[schema(value_type = Object)]
    pub payload: Value,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetDestinationReq {
    #[schema(value_type = String)]
    pub hospital_id: OrganizationId,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OffboardReq {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelReq {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TripQuery {
    #[param(value_type = Option<String>, example = "in_transit")]
    pub status: Option<TripStatus>,
    #[param(value_type = Option<String>)]
    pub vehicle_id: Option<VehicleId>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TripAccessRes {
    pub allowed: bool,
    #[schema(value_type = Option<String>, example = "assigned_crew")]
    pub path: Option<TripAccessPath>,
}
