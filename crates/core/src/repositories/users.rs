//! User Directory.
//!
//! Accounts are needed by the engine for two things: crew assignment checks the target user's
//! role, and suspension must sweep that user's assignments in the same transaction as the
//! status flip.

use crate::constants::audit_actions;
use crate::error::{CoreError, CoreResult};
use crate::events::DomainEvent;
use crate::principal::Principal;
use crate::repositories::assignments::CrewAssignmentRegistry;
use crate::repositories::organizations::OrganizationDirectory;
use crate::store::{Tables, Transaction};
use chrono::{DateTime, Utc};
use medtrip_ids::{AssignmentId, OrganizationId, UserId};
use medtrip_types::{NonEmptyText, Role};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Suspended,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub organization_id: OrganizationId,
    pub role: Role,
    pub name: NonEmptyText,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub suspended_at: Option<DateTime<Utc>>,
}

/// What a suspension swept away.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Suspension {
    pub user: User,
    pub removed_assignments: Vec<AssignmentId>,
}

pub struct UserDirectory;

impl UserDirectory {
    pub(crate) fn register(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        organization_id: OrganizationId,
        role: Role,
        name: NonEmptyText,
    ) -> CoreResult<User> {
        OrganizationDirectory::require_active(tx.tables(), organization_id)?;

        if !principal.administers(organization_id) {
            return Err(CoreError::Forbidden(format!(
                "user {} cannot register users for organization {organization_id}",
                principal.user_id
            )));
        }
        if role.is_superadmin() && !principal.is_superadmin() {
            return Err(CoreError::Forbidden(
                "only a superadmin may grant the superadmin role".into(),
            ));
        }

        let user = User {
            id: UserId::new(),
            organization_id,
            role,
            name,
            status: UserStatus::Active,
            created_at: tx.now(),
            suspended_at: None,
        };
        tx.tables_mut().users.insert(user.id, user.clone());
        tx.audit(principal, audit_actions::USER_REGISTER, user.id);
        Ok(user)
    }

    pub fn get(tables: &Tables, id: UserId) -> CoreResult<&User> {
        tables
            .users
            .get(&id)
            .ok_or_else(|| CoreError::not_found("user", id))
    }

    /// Deactivate every assignment the user holds, then mark them suspended.
    ///
    /// Both steps run in the caller's transaction, so no reader can observe a suspended user
    /// who is still assigned to a vehicle.
    pub(crate) fn suspend(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        user_id: UserId,
    ) -> CoreResult<Suspension> {
        let user = Self::get(tx.tables(), user_id)?.clone();
        Self::require_admin_over(principal, &user)?;
        if user.status == UserStatus::Suspended {
            return Err(CoreError::Conflict(format!(
                "user {user_id} is already suspended"
            )));
        }

        let removed = CrewAssignmentRegistry::deactivate_all_for_user(tx, principal, user_id)?;

        let now = tx.now();
        let stored = tx
            .tables_mut()
            .users
            .get_mut(&user_id)
            .ok_or_else(|| CoreError::not_found("user", user_id))?;
        stored.status = UserStatus::Suspended;
        stored.suspended_at = Some(now);
        let user = stored.clone();

        tx.emit(DomainEvent::UserSuspended { user_id });
        tx.audit(principal, audit_actions::USER_SUSPEND, user_id);
        tracing::info!(
            user = %user_id,
            removed = removed.len(),
            "user suspended and unassigned"
        );

        Ok(Suspension {
            user,
            removed_assignments: removed,
        })
    }

    pub(crate) fn reinstate(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        user_id: UserId,
    ) -> CoreResult<User> {
        let user = Self::get(tx.tables(), user_id)?.clone();
        Self::require_admin_over(principal, &user)?;
        if user.status == UserStatus::Active {
            return Err(CoreError::Conflict(format!("user {user_id} is already active")));
        }

        let stored = tx
            .tables_mut()
            .users
            .get_mut(&user_id)
            .ok_or_else(|| CoreError::not_found("user", user_id))?;
        stored.status = UserStatus::Active;
        stored.suspended_at = None;
        let user = stored.clone();

        tx.audit(principal, audit_actions::USER_REINSTATE, user_id);
        Ok(user)
    }

    fn require_admin_over(principal: &Principal, user: &User) -> CoreResult<()> {
        if principal.administers(user.organization_id) && principal.user_id != user.id {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "user {} cannot change the status of user {}",
                principal.user_id, user.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::organizations::OrganizationStatus;
    use crate::test_support::{text, World};

    #[test]
    fn admins_register_users_in_their_own_organization() {
        let world = World::new();
        let admin = world.admin(world.hospital);

        let doctor = world
            .service
            .register_user(&admin, world.hospital, Role::Doctor, text("Dr Who"))
            .expect("admin registers a doctor");
        assert_eq!(doctor.status, UserStatus::Active);

        let err = world
            .service
            .register_user(&admin, world.fleet, Role::Paramedic, text("Medic"))
            .expect_err("other organization");
        assert!(matches!(err, CoreError::Forbidden(_)));

        let err = world
            .service
            .register_user(&admin, world.hospital, Role::Superadmin, text("Root"))
            .expect_err("cannot mint a superadmin");
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn suspension_removes_every_assignment_first() {
        let world = World::new();
        world.partner(world.fleet, world.hospital);
        let fleet_admin = world.admin(world.fleet);
        let medic = world.member(world.fleet, Role::Paramedic);
        let second_vehicle = world.approved_vehicle(world.fleet, "RR-02");

        for vehicle in [world.vehicle, second_vehicle] {
            world
                .service
                .assign_crew(&fleet_admin, vehicle, medic.user_id, None)
                .expect("assign");
        }

        let suspension = world
            .service
            .suspend_user(&fleet_admin, medic.user_id)
            .expect("suspend");
        assert_eq!(suspension.user.status, UserStatus::Suspended);
        assert_eq!(suspension.removed_assignments.len(), 2);

        let still_assigned = world
            .tables(|t| Ok(CrewAssignmentRegistry::vehicles_for_user(t, medic.user_id)))
            .expect("read");
        assert!(still_assigned.is_empty());

        let names = world.events.names();
        assert_eq!(
            names.iter().filter(|n| **n == "assignment_removed").count(),
            2
        );
        assert!(names.contains(&"user_suspended"));

        let err = world
            .service
            .suspend_user(&fleet_admin, medic.user_id)
            .expect_err("already suspended");
        assert!(matches!(err, CoreError::Conflict(_)));

        let err = world
            .service
            .assign_crew(&fleet_admin, world.vehicle, medic.user_id, None)
            .expect_err("suspended users cannot be crew");
        assert!(matches!(err, CoreError::InvalidState(_)));

        let user = world
            .service
            .reinstate_user(&fleet_admin, medic.user_id)
            .expect("reinstate");
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.suspended_at, None);
    }

    #[test]
    fn admins_cannot_suspend_themselves_or_strangers() {
        let world = World::new();
        let admin = world.admin(world.hospital);
        let err = world
            .service
            .suspend_user(&admin, admin.user_id)
            .expect_err("self suspension");
        assert!(matches!(err, CoreError::Forbidden(_)));

        let fleet_medic = world.member(world.fleet, Role::Paramedic);
        let err = world
            .service
            .suspend_user(&admin, fleet_medic.user_id)
            .expect_err("other organization");
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn users_cannot_join_an_organization_that_is_not_active() {
        let world = World::new();
        world
            .service
            .set_organization_status(&world.root, world.hospital, OrganizationStatus::Suspended)
            .expect("suspend organization");

        let err = world
            .service
            .register_user(&world.root, world.hospital, Role::Doctor, text("Dr Late"))
            .expect_err("organization is suspended");
        assert!(matches!(err, CoreError::InvalidState(_)));
    }
}
