//! Crew Assignment Registry.
//!
//! An assignment attaches a user to a vehicle on behalf of one organization. The row key is
//! `(vehicle, user, assigning organization)`, so a fleet and a partnered hospital can each
//! assign the same paramedic to the same ambulance and each keep control of its own row.

use crate::access::{
    assignment_visibility, resolve_unassign, AssignmentFacts, AssignmentVisibility, UnassignPath,
};
use crate::constants::audit_actions;
use crate::error::{CoreError, CoreResult};
use crate::events::DomainEvent;
use crate::principal::Principal;
use crate::repositories::organizations::OrganizationDirectory;
use crate::repositories::partnerships::PartnershipRegistry;
use crate::repositories::users::{UserDirectory, UserStatus};
use crate::repositories::vehicles::{VehicleRegistry, VehicleStatus};
use crate::store::{Tables, Transaction};
use chrono::{DateTime, Utc};
use medtrip_ids::{AssignmentId, OrganizationId, UserId, VehicleId};
use medtrip_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub vehicle_id: VehicleId,
    pub user_id: UserId,
    pub assigning_organization_id: OrganizationId,
    pub assigned_by: UserId,
    pub role_label: Option<NonEmptyText>,
    pub is_active: bool,
    pub assigned_at: DateTime<Utc>,
    pub unassigned_at: Option<DateTime<Utc>>,
    pub unassigned_by: Option<UserId>,
}

/// Outcome of an unassignment, naming the rule that authorised it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Unassignment {
    pub assignment: Assignment,
    pub path: UnassignPath,
}

pub struct CrewAssignmentRegistry;

impl CrewAssignmentRegistry {
    /// Attach `user_id` to `vehicle_id` on behalf of the principal's organization.
    ///
    /// A superadmin acting without an organization assigns on behalf of the vehicle's owner.
    /// Re-assigning an existing `(vehicle, user, org)` row reactivates it.
    pub(crate) fn assign(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        vehicle_id: VehicleId,
        user_id: UserId,
        role_label: Option<NonEmptyText>,
    ) -> CoreResult<Assignment> {
        if !principal.role.can_manage_crew() {
            return Err(CoreError::Forbidden(format!(
                "role {} cannot manage crew assignments",
                principal.role
            )));
        }

        let vehicle = VehicleRegistry::get(tx.tables(), vehicle_id)?.clone();
        let assigning_org = principal
            .organization_id
            .unwrap_or(vehicle.organization_id);
        OrganizationDirectory::require_active(tx.tables(), assigning_org)?;

        let authorised = principal.is_superadmin()
            || assigning_org == vehicle.organization_id
            || (principal.is_hospital()
                && PartnershipRegistry::is_active_between(
                    tx.tables(),
                    assigning_org,
                    vehicle.organization_id,
                ));
        if !authorised {
            return Err(CoreError::Forbidden(format!(
                "organization {assigning_org} may not crew vehicle {vehicle_id}"
            )));
        }

        if vehicle.status == VehicleStatus::PendingApproval {
            return Err(CoreError::InvalidState(format!(
                "vehicle {vehicle_id} is pending approval"
            )));
        }

        let user = UserDirectory::get(tx.tables(), user_id)?;
        if user.status != UserStatus::Active {
            return Err(CoreError::InvalidState(format!("user {user_id} is suspended")));
        }
        if !user.role.is_clinical() {
            return Err(CoreError::InvalidState(format!(
                "user {user_id} has non-clinical role {}",
                user.role
            )));
        }
        if !principal.is_superadmin() && user.organization_id != assigning_org {
            return Err(CoreError::Forbidden(format!(
                "user {user_id} is not a member of organization {assigning_org}"
            )));
        }

        let now = tx.now();
        let existing = tx
            .tables()
            .assignments
            .values()
            .find(|a| {
                a.vehicle_id == vehicle_id
                    && a.user_id == user_id
                    && a.assigning_organization_id == assigning_org
            })
            .map(|a| a.id);

        let assignment = match existing {
            Some(id) => {
                let row = tx
                    .tables_mut()
                    .assignments
                    .get_mut(&id)
                    .ok_or_else(|| CoreError::not_found("assignment", id))?;
                row.is_active = true;
                row.assigned_by = principal.user_id;
                row.role_label = role_label;
                row.assigned_at = now;
                row.unassigned_at = None;
                row.unassigned_by = None;
                row.clone()
            }
            None => {
                let row = Assignment {
                    id: AssignmentId::new(),
                    vehicle_id,
                    user_id,
                    assigning_organization_id: assigning_org,
                    assigned_by: principal.user_id,
                    role_label,
                    is_active: true,
                    assigned_at: now,
                    unassigned_at: None,
                    unassigned_by: None,
                };
                tx.tables_mut().assignments.insert(row.id, row.clone());
                row
            }
        };

        tx.emit(DomainEvent::AssignmentCreated {
            assignment_id: assignment.id,
            vehicle_id,
            user_id,
            assigning_organization_id: assigning_org,
        });
        tx.audit(principal, audit_actions::ASSIGNMENT_CREATE, assignment.id);
        Ok(assignment)
    }

    /// Deactivate one active assignment of `user_id` on `vehicle_id`.
    ///
    /// `assigning_org` picks the row when several organizations assigned the same user. Without
    /// it the row created by the principal's own organization is preferred, then the only
    /// active row. Authorisation follows [`crate::access::UNASSIGN_RULES`].
    pub(crate) fn unassign(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        vehicle_id: VehicleId,
        user_id: UserId,
        assigning_org: Option<OrganizationId>,
    ) -> CoreResult<Unassignment> {
        if !principal.role.can_manage_crew() {
            return Err(CoreError::Forbidden(format!(
                "role {} cannot manage crew assignments",
                principal.role
            )));
        }

        let vehicle = VehicleRegistry::get(tx.tables(), vehicle_id)?;
        let owner = OrganizationDirectory::get(tx.tables(), vehicle.organization_id)?;
        let row = Self::select_row(tx.tables(), principal, vehicle_id, user_id, assigning_org)?;

        let facts = AssignmentFacts {
            assigning_organization_id: row.assigning_organization_id,
            vehicle_owner_organization_id: owner.id,
            vehicle_owner_type: owner.organization_type,
        };
        let Some(path) = resolve_unassign(principal, &facts) else {
            return Err(CoreError::Forbidden(format!(
                "user {} may not remove assignment {}",
                principal.user_id, row.id
            )));
        };

        let assignment = Self::deactivate(tx, principal, row.id)?;
        tracing::info!(
            assignment = %assignment.id,
            vehicle = %vehicle_id,
            user = %user_id,
            ?path,
            "crew unassigned"
        );
        Ok(Unassignment { assignment, path })
    }

    /// Deactivate every active assignment held by `user_id`. Used by suspension only.
    pub(crate) fn deactivate_all_for_user(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        user_id: UserId,
    ) -> CoreResult<Vec<AssignmentId>> {
        let ids: Vec<AssignmentId> = tx
            .tables()
            .assignments
            .values()
            .filter(|a| a.is_active && a.user_id == user_id)
            .map(|a| a.id)
            .collect();
        for id in &ids {
            Self::deactivate(tx, principal, *id)?;
        }
        Ok(ids)
    }

    pub fn get(tables: &Tables, id: AssignmentId) -> CoreResult<&Assignment> {
        tables
            .assignments
            .get(&id)
            .ok_or_else(|| CoreError::not_found("assignment", id))
    }

    /// Active assignments on a vehicle, filtered by what `principal` may see.
    pub fn list_for_vehicle(
        tables: &Tables,
        principal: &Principal,
        vehicle_id: VehicleId,
    ) -> CoreResult<Vec<Assignment>> {
        let vehicle = VehicleRegistry::get(tables, vehicle_id)?;
        let visibility = assignment_visibility(principal, vehicle.organization_id);
        Ok(Self::active_on_vehicle(tables, vehicle_id)
            .filter(|a| match visibility {
                AssignmentVisibility::All => true,
                AssignmentVisibility::CreatedBy(org) => a.assigning_organization_id == org,
                AssignmentVisibility::Nothing => false,
            })
            .cloned()
            .collect())
    }

    /// Every active assignment on a vehicle, unfiltered.
    pub fn active_on_vehicle(
        tables: &Tables,
        vehicle_id: VehicleId,
    ) -> impl Iterator<Item = &Assignment> {
        tables
            .assignments
            .values()
            .filter(move |a| a.is_active && a.vehicle_id == vehicle_id)
    }

    pub fn active_crew(tables: &Tables, vehicle_id: VehicleId) -> BTreeSet<UserId> {
        Self::active_on_vehicle(tables, vehicle_id)
            .map(|a| a.user_id)
            .collect()
    }

    pub fn is_active_crew(tables: &Tables, vehicle_id: VehicleId, user_id: UserId) -> bool {
        Self::active_on_vehicle(tables, vehicle_id).any(|a| a.user_id == user_id)
    }

    /// Vehicles on which `user_id` holds at least one active assignment.
    pub fn vehicles_for_user(tables: &Tables, user_id: UserId) -> BTreeSet<VehicleId> {
        tables
            .assignments
            .values()
            .filter(|a| a.is_active && a.user_id == user_id)
            .map(|a| a.vehicle_id)
            .collect()
    }

    fn select_row(
        tables: &Tables,
        principal: &Principal,
        vehicle_id: VehicleId,
        user_id: UserId,
        assigning_org: Option<OrganizationId>,
    ) -> CoreResult<Assignment> {
        let candidates: Vec<&Assignment> = Self::active_on_vehicle(tables, vehicle_id)
            .filter(|a| a.user_id == user_id)
            .collect();

        let chosen = match assigning_org {
            Some(org) => candidates
                .iter()
                .find(|a| a.assigning_organization_id == org)
                .copied(),
            None => {
                let own = principal.organization_id.and_then(|org| {
                    candidates
                        .iter()
                        .find(|a| a.assigning_organization_id == org)
                        .copied()
                });
                match (own, candidates.as_slice()) {
                    (Some(a), _) => Some(a),
                    (None, [only]) => Some(*only),
                    (None, []) => None,
                    (None, _) => {
                        return Err(CoreError::InvalidInput(format!(
                            "user {user_id} has several assignments on vehicle {vehicle_id}; \
                             name the assigning organization"
                        )))
                    }
                }
            }
        };

        chosen.cloned().ok_or_else(|| {
            CoreError::not_found("assignment", format!("{vehicle_id}/{user_id}"))
        })
    }

    fn deactivate(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        id: AssignmentId,
    ) -> CoreResult<Assignment> {
        let now = tx.now();
        let row = tx
            .tables_mut()
            .assignments
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("assignment", id))?;
        row.is_active = false;
        row.unassigned_at = Some(now);
        row.unassigned_by = Some(principal.user_id);
        let assignment = row.clone();

        tx.emit(DomainEvent::AssignmentRemoved {
            assignment_id: id,
            vehicle_id: assignment.vehicle_id,
            user_id: assignment.user_id,
        });
        tx.audit(principal, audit_actions::ASSIGNMENT_REMOVE, id);
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{text, World};
    use medtrip_types::{OrganizationType, Role};

    #[test]
    fn assignment_preconditions() {
        let world = World::new();
        let fleet_admin = world.admin(world.fleet);
        let medic = world.member(world.fleet, Role::Paramedic);
        let driver = world.member(world.fleet, Role::Driver);

        let pending = world
            .service
            .register_vehicle(&fleet_admin, world.fleet, text("RR-09"))
            .expect("register");
        let err = world
            .service
            .assign_crew(&fleet_admin, pending.id, medic.user_id, None)
            .expect_err("vehicle awaits approval");
        assert!(matches!(err, CoreError::InvalidState(_)));

        let err = world
            .service
            .assign_crew(&fleet_admin, world.vehicle, driver.user_id, None)
            .expect_err("drivers are not clinical crew");
        assert!(matches!(err, CoreError::InvalidState(_)));

        let err = world
            .service
            .assign_crew(&medic, world.vehicle, medic.user_id, None)
            .expect_err("paramedics cannot manage crew");
        assert!(matches!(err, CoreError::Forbidden(_)));

        let assignment = world
            .service
            .assign_crew(&fleet_admin, world.vehicle, medic.user_id, Some(text("lead")))
            .expect("owner assigns its paramedic");
        assert!(assignment.is_active);
        assert_eq!(assignment.assigning_organization_id, world.fleet);
        assert!(world.events.names().contains(&"assignment_created"));
    }

    #[test]
    fn hospital_needs_partnership_to_crew_fleet_vehicle() {
        let world = World::new();
        let hospital_admin = world.admin(world.hospital);
        let doctor = world.member(world.hospital, Role::Doctor);

        let err = world
            .service
            .assign_crew(&hospital_admin, world.vehicle, doctor.user_id, None)
            .expect_err("no partnership");
        assert!(matches!(err, CoreError::Forbidden(_)));

        world.partner(world.fleet, world.hospital);
        let assignment = world
            .service
            .assign_crew(&hospital_admin, world.vehicle, doctor.user_id, None)
            .expect("partnered hospital assigns its doctor");
        assert_eq!(assignment.assigning_organization_id, world.hospital);

        let fleet_medic = world.member(world.fleet, Role::Paramedic);
        let err = world
            .service
            .assign_crew(&hospital_admin, world.vehicle, fleet_medic.user_id, None)
            .expect_err("hospital cannot assign another organization's staff");
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn reassigning_reuses_the_row() {
        let world = World::new();
        let fleet_admin = world.admin(world.fleet);
        let medic = world.member(world.fleet, Role::Paramedic);

        let first = world
            .service
            .assign_crew(&fleet_admin, world.vehicle, medic.user_id, None)
            .expect("assign");
        world
            .service
            .unassign_crew(&fleet_admin, world.vehicle, medic.user_id, None)
            .expect("unassign");
        let second = world
            .service
            .assign_crew(&fleet_admin, world.vehicle, medic.user_id, None)
            .expect("assign again");

        assert_eq!(first.id, second.id);
        assert!(second.is_active);
        assert_eq!(second.unassigned_at, None);
        let rows = world
            .tables(|t| Ok(t.assignments.len()))
            .expect("read");
        assert_eq!(rows, 1);
    }

    #[test]
    fn listing_is_filtered_by_requester() {
        let world = World::new();
        world.partner(world.fleet, world.hospital);
        let fleet_admin = world.admin(world.fleet);
        let hospital_admin = world.admin(world.hospital);
        let medic = world.member(world.fleet, Role::Paramedic);
        let doctor = world.member(world.hospital, Role::Doctor);

        world
            .service
            .assign_crew(&fleet_admin, world.vehicle, medic.user_id, None)
            .expect("fleet assigns");
        world
            .service
            .assign_crew(&hospital_admin, world.vehicle, doctor.user_id, None)
            .expect("hospital assigns");

        let other_fleet = world
            .service
            .create_organization(&world.root, text("Other Fleet"), OrganizationType::Fleet)
            .expect("create")
            .id;
        let count = |p: &Principal| {
            world
                .service
                .list_assignments(p, world.vehicle)
                .expect("list")
                .len()
        };

        assert_eq!(count(&world.root), 2);
        assert_eq!(count(&fleet_admin), 2);
        assert_eq!(count(&hospital_admin), 1);
        assert_eq!(count(&world.admin(world.other_hospital)), 0);
        assert_eq!(count(&world.admin(other_fleet)), 0);
    }

    #[test]
    fn unassign_paths_follow_rule_order() {
        let world = World::new();
        world.partner(world.fleet, world.hospital);
        let fleet_admin = world.admin(world.fleet);
        let hospital_admin = world.admin(world.hospital);
        let doctor = world.member(world.hospital, Role::Doctor);

        let assign = || {
            world
                .service
                .assign_crew(&hospital_admin, world.vehicle, doctor.user_id, None)
                .expect("hospital assigns")
        };

        assign();
        let outsider = world.admin(world.other_hospital);
        let err = world
            .service
            .unassign_crew(&outsider, world.vehicle, doctor.user_id, None)
            .expect_err("unrelated hospital");
        assert!(matches!(err, CoreError::Forbidden(_)));

        let removed = world
            .service
            .unassign_crew(&hospital_admin, world.vehicle, doctor.user_id, None)
            .expect("creator removes its own row");
        assert_eq!(removed.path, UnassignPath::AssigningOrganization);
        assert!(!removed.assignment.is_active);

        assign();
        let removed = world
            .service
            .unassign_crew(&world.root, world.vehicle, doctor.user_id, Some(world.hospital))
            .expect("superadmin removes");
        assert_eq!(removed.path, UnassignPath::Superadmin);

        assign();
        let removed = world
            .service
            .unassign_crew(&fleet_admin, world.vehicle, doctor.user_id, None)
            .expect("fleet owner override");
        assert_eq!(removed.path, UnassignPath::FleetOwnerOverride);

        let err = world
            .service
            .unassign_crew(&fleet_admin, world.vehicle, doctor.user_id, None)
            .expect_err("nothing left to remove");
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
