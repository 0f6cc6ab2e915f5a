//! Access Resolver.
//!
//! Pure decision functions answering "may this principal act on this trip / vehicle /
//! assignment / patient". Each decision is an ordered table of [`Rule`]s evaluated by
//! [`first_match`]; the first predicate that holds grants access and names the path that
//! granted it. No rule consults the store: callers gather the relevant facts first and pass
//! them in, which keeps every predicate independently testable.
//!
//! A partnership between two organizations is never, on its own, a reason to see a trip. It
//! lets a hospital onboard onto a partner's vehicle; visibility afterwards flows from owning
//! the trip, being its destination, crewing its vehicle or owning that vehicle as a fleet.

use crate::principal::Principal;
use medtrip_ids::{OrganizationId, TripId, UserId};
use medtrip_types::OrganizationType;
use serde::Serialize;
use std::collections::BTreeSet;

// ============================================================================
// GENERIC EVALUATOR
// ============================================================================

/// One named predicate in an ordered rule table.
pub struct Rule<P, F> {
    pub path: P,
    pub check: fn(&Principal, &F) -> bool,
}

/// Evaluate `rules` in order and return the path of the first predicate that holds.
pub fn first_match<P: Copy, F>(rules: &[Rule<P, F>], principal: &Principal, facts: &F) -> Option<P> {
    rules
        .iter()
        .find(|rule| (rule.check)(principal, facts))
        .map(|rule| rule.path)
}

// ============================================================================
// TRIP ACCESS
// ============================================================================

/// Everything the trip rules need to know about one trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TripFacts {
    pub trip_id: TripId,
    pub owner_organization_id: OrganizationId,
    pub destination_organization_id: Option<OrganizationId>,
    pub vehicle_owner_organization_id: OrganizationId,
    pub vehicle_owner_type: OrganizationType,
    /// Users holding an active assignment on the trip's vehicle, from any assigning org.
    pub active_crew: BTreeSet<UserId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripAccessPath {
    Superadmin,
    OwningOrganization,
    DestinationOrganization,
    AssignedCrew,
    VehicleFleetOwner,
}

fn is_superadmin<F>(principal: &Principal, _facts: &F) -> bool {
    principal.is_superadmin()
}

fn owns_trip(principal: &Principal, facts: &TripFacts) -> bool {
    principal.belongs_to(facts.owner_organization_id)
}

fn is_trip_destination(principal: &Principal, facts: &TripFacts) -> bool {
    facts
        .destination_organization_id
        .is_some_and(|dest| principal.belongs_to(dest))
}

fn crews_trip_vehicle(principal: &Principal, facts: &TripFacts) -> bool {
    facts.active_crew.contains(&principal.user_id)
}

fn owns_trip_vehicle_as_fleet(principal: &Principal, facts: &TripFacts) -> bool {
    facts.vehicle_owner_type == OrganizationType::Fleet
        && principal.is_fleet()
        && principal.belongs_to(facts.vehicle_owner_organization_id)
}

pub const TRIP_ACCESS_RULES: &[Rule<TripAccessPath, TripFacts>] = &[
    Rule {
        path: TripAccessPath::Superadmin,
        check: is_superadmin,
    },
    Rule {
        path: TripAccessPath::OwningOrganization,
        check: owns_trip,
    },
    Rule {
        path: TripAccessPath::DestinationOrganization,
        check: is_trip_destination,
    },
    Rule {
        path: TripAccessPath::AssignedCrew,
        check: crews_trip_vehicle,
    },
    Rule {
        path: TripAccessPath::VehicleFleetOwner,
        check: owns_trip_vehicle_as_fleet,
    },
];

/// Which rule, if any, lets `principal` act on the trip.
pub fn resolve_trip_access(principal: &Principal, facts: &TripFacts) -> Option<TripAccessPath> {
    let path = first_match(TRIP_ACCESS_RULES, principal, facts);
    tracing::debug!(
        trip = %facts.trip_id,
        user = %principal.user_id,
        granted = ?path,
        "trip access decision"
    );
    path
}

pub fn can_access(principal: &Principal, facts: &TripFacts) -> bool {
    resolve_trip_access(principal, facts).is_some()
}

// ============================================================================
// ONBOARDING
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnboardFacts {
    pub vehicle_owner_organization_id: OrganizationId,
    /// Whether an active partnership links the requester's org and the vehicle's owner.
    pub partnership_active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardPath {
    FleetOwnsVehicle,
    HospitalOwnsVehicle,
    HospitalPartnership,
}

fn fleet_owns_vehicle(principal: &Principal, facts: &OnboardFacts) -> bool {
    principal.is_fleet() && principal.belongs_to(facts.vehicle_owner_organization_id)
}

fn hospital_owns_vehicle(principal: &Principal, facts: &OnboardFacts) -> bool {
    principal.is_hospital() && principal.belongs_to(facts.vehicle_owner_organization_id)
}

fn hospital_partners_vehicle_owner(principal: &Principal, facts: &OnboardFacts) -> bool {
    principal.is_hospital() && facts.partnership_active
}

pub const ONBOARD_RULES: &[Rule<OnboardPath, OnboardFacts>] = &[
    Rule {
        path: OnboardPath::FleetOwnsVehicle,
        check: fleet_owns_vehicle,
    },
    Rule {
        path: OnboardPath::HospitalOwnsVehicle,
        check: hospital_owns_vehicle,
    },
    Rule {
        path: OnboardPath::HospitalPartnership,
        check: hospital_partners_vehicle_owner,
    },
];

pub fn resolve_onboard(principal: &Principal, facts: &OnboardFacts) -> Option<OnboardPath> {
    first_match(ONBOARD_RULES, principal, facts)
}

// ============================================================================
// CREW ASSIGNMENTS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignmentFacts {
    pub assigning_organization_id: OrganizationId,
    pub vehicle_owner_organization_id: OrganizationId,
    pub vehicle_owner_type: OrganizationType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignPath {
    AssigningOrganization,
    Superadmin,
    FleetOwnerOverride,
}

fn created_assignment(principal: &Principal, facts: &AssignmentFacts) -> bool {
    principal.belongs_to(facts.assigning_organization_id)
}

fn fleet_owns_assigned_vehicle(principal: &Principal, facts: &AssignmentFacts) -> bool {
    facts.vehicle_owner_type == OrganizationType::Fleet
        && principal.belongs_to(facts.vehicle_owner_organization_id)
}

pub const UNASSIGN_RULES: &[Rule<UnassignPath, AssignmentFacts>] = &[
    Rule {
        path: UnassignPath::AssigningOrganization,
        check: created_assignment,
    },
    Rule {
        path: UnassignPath::Superadmin,
        check: is_superadmin,
    },
    Rule {
        path: UnassignPath::FleetOwnerOverride,
        check: fleet_owns_assigned_vehicle,
    },
];

pub fn resolve_unassign(principal: &Principal, facts: &AssignmentFacts) -> Option<UnassignPath> {
    first_match(UNASSIGN_RULES, principal, facts)
}

/// Which assignments on a vehicle a principal may list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignmentVisibility {
    All,
    CreatedBy(OrganizationId),
    Nothing,
}

pub fn assignment_visibility(
    principal: &Principal,
    vehicle_owner_organization_id: OrganizationId,
) -> AssignmentVisibility {
    if principal.is_superadmin() {
        return AssignmentVisibility::All;
    }
    match (principal.organization_id, principal.organization_type) {
        (Some(org), Some(OrganizationType::Hospital)) => AssignmentVisibility::CreatedBy(org),
        (Some(org), Some(OrganizationType::Fleet)) if org == vehicle_owner_organization_id => {
            AssignmentVisibility::All
        }
        (Some(_), Some(OrganizationType::Fleet))
        | (Some(_), Some(OrganizationType::System))
        | (None, _)
        | (_, None) => AssignmentVisibility::Nothing,
    }
}

// ============================================================================
// VEHICLE VISIBILITY
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VehicleFacts {
    pub owner_organization_id: OrganizationId,
    pub partnership_active: bool,
    pub principal_is_crew: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleAccessPath {
    Superadmin,
    Owner,
    PartneredHospital,
    AssignedCrew,
}

fn owns_vehicle(principal: &Principal, facts: &VehicleFacts) -> bool {
    principal.belongs_to(facts.owner_organization_id)
}

fn partnered_hospital(principal: &Principal, facts: &VehicleFacts) -> bool {
    principal.is_hospital() && facts.partnership_active
}

fn crews_vehicle(_principal: &Principal, facts: &VehicleFacts) -> bool {
    facts.principal_is_crew
}

pub const VEHICLE_ACCESS_RULES: &[Rule<VehicleAccessPath, VehicleFacts>] = &[
    Rule {
        path: VehicleAccessPath::Superadmin,
        check: is_superadmin,
    },
    Rule {
        path: VehicleAccessPath::Owner,
        check: owns_vehicle,
    },
    Rule {
        path: VehicleAccessPath::PartneredHospital,
        check: partnered_hospital,
    },
    Rule {
        path: VehicleAccessPath::AssignedCrew,
        check: crews_vehicle,
    },
];

pub fn resolve_vehicle_access(
    principal: &Principal,
    facts: &VehicleFacts,
) -> Option<VehicleAccessPath> {
    first_match(VEHICLE_ACCESS_RULES, principal, facts)
}

// ============================================================================
// PATIENT VISIBILITY
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientFacts {
    pub owner_organization_id: Option<OrganizationId>,
    /// Whether the principal passes the trip rules for the patient's current trip.
    pub current_trip_accessible: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientAccessPath {
    Superadmin,
    OwningOrganization,
    GlobalRecord,
    CurrentTripParticipant,
}

fn owns_patient(principal: &Principal, facts: &PatientFacts) -> bool {
    facts
        .owner_organization_id
        .is_some_and(|org| principal.belongs_to(org))
}

fn is_global_record(_principal: &Principal, facts: &PatientFacts) -> bool {
    facts.owner_organization_id.is_none()
}

fn participates_in_current_trip(_principal: &Principal, facts: &PatientFacts) -> bool {
    facts.current_trip_accessible
}

pub const PATIENT_ACCESS_RULES: &[Rule<PatientAccessPath, PatientFacts>] = &[
    Rule {
        path: PatientAccessPath::Superadmin,
        check: is_superadmin,
    },
    Rule {
        path: PatientAccessPath::OwningOrganization,
        check: owns_patient,
    },
    Rule {
        path: PatientAccessPath::GlobalRecord,
        check: is_global_record,
    },
    Rule {
        path: PatientAccessPath::CurrentTripParticipant,
        check: participates_in_current_trip,
    },
];

pub fn resolve_patient_access(
    principal: &Principal,
    facts: &PatientFacts,
) -> Option<PatientAccessPath> {
    first_match(PATIENT_ACCESS_RULES, principal, facts)
}
