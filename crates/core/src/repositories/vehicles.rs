//! Vehicle Registry.
//!
//! Approval and operational state of each vehicle plus the advisory single-hospital lock.
//! `lockedHospitalId` is set only while a trip is in progress, and then the vehicle is `active`;
//! the trip manager is the only caller of [`VehicleRegistry::claim_for_trip`] and
//! [`VehicleRegistry::release_from_trip`].

use crate::access::{resolve_vehicle_access, VehicleAccessPath, VehicleFacts};
use crate::constants::audit_actions;
use crate::error::{CoreError, CoreResult};
use crate::events::DomainEvent;
use crate::principal::Principal;
use crate::repositories::assignments::CrewAssignmentRegistry;
use crate::repositories::organizations::OrganizationDirectory;
use crate::repositories::partnerships::PartnershipRegistry;
use crate::store::{Tables, Transaction};
use chrono::{DateTime, Utc};
use medtrip_ids::{OrganizationId, UserId, VehicleId};
use medtrip_types::{NonEmptyText, OrganizationType};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    PendingApproval,
    Available,
    Active,
    Maintenance,
    Inactive,
    Disabled,
}

impl VehicleStatus {
    /// Statuses only a superadmin may set by hand.
    pub fn is_restricted(self) -> bool {
        matches!(self, VehicleStatus::Inactive | VehicleStatus::Disabled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub organization_id: OrganizationId,
    pub call_sign: NonEmptyText,
    pub status: VehicleStatus,
    pub locked_hospital_id: Option<OrganizationId>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct VehicleRegistry;

impl VehicleRegistry {
    pub(crate) fn register(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        organization_id: OrganizationId,
        call_sign: NonEmptyText,
    ) -> CoreResult<Vehicle> {
        OrganizationDirectory::require_active_of_type(
            tx.tables(),
            organization_id,
            OrganizationType::Fleet,
        )?;
        if !principal.administers(organization_id) {
            return Err(CoreError::Forbidden(format!(
                "user {} cannot register vehicles for organization {organization_id}",
                principal.user_id
            )));
        }

        let now = tx.now();
        let vehicle = Vehicle {
            id: VehicleId::new(),
            organization_id,
            call_sign,
            status: VehicleStatus::PendingApproval,
            locked_hospital_id: None,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        tx.tables_mut().vehicles.insert(vehicle.id, vehicle.clone());
        tx.audit(principal, audit_actions::VEHICLE_REGISTER, vehicle.id);
        Ok(vehicle)
    }

    pub fn get(tables: &Tables, id: VehicleId) -> CoreResult<&Vehicle> {
        tables
            .vehicles
            .get(&id)
            .ok_or_else(|| CoreError::not_found("vehicle", id))
    }

    pub fn iter(tables: &Tables) -> impl Iterator<Item = &Vehicle> {
        tables.vehicles.values()
    }

    /// The path by which `principal` may see the vehicle, if any.
    pub fn access_path(
        tables: &Tables,
        principal: &Principal,
        vehicle: &Vehicle,
    ) -> Option<VehicleAccessPath> {
        let partnership_active = principal.organization_id.is_some_and(|org| {
            PartnershipRegistry::is_active_between(tables, org, vehicle.organization_id)
        });
        let facts = VehicleFacts {
            owner_organization_id: vehicle.organization_id,
            partnership_active,
            principal_is_crew: CrewAssignmentRegistry::is_active_crew(
                tables,
                vehicle.id,
                principal.user_id,
            ),
        };
        resolve_vehicle_access(principal, &facts)
    }

    pub fn get_visible<'t>(
        tables: &'t Tables,
        principal: &Principal,
        id: VehicleId,
    ) -> CoreResult<&'t Vehicle> {
        let vehicle = Self::get(tables, id)?;
        match Self::access_path(tables, principal, vehicle) {
            Some(_) => Ok(vehicle),
            None => Err(CoreError::Forbidden(format!(
                "user {} cannot see vehicle {id}",
                principal.user_id
            ))),
        }
    }

    /// Vehicles `principal` may see: everything for a superadmin, own fleet, partner fleets
    /// for a hospital, and vehicles the principal crews.
    pub fn list_visible(tables: &Tables, principal: &Principal) -> Vec<Vehicle> {
        Self::iter(tables)
            .filter(|v| Self::access_path(tables, principal, v).is_some())
            .cloned()
            .collect()
    }

    /// Move a vehicle out of `pending_approval` into service.
    pub(crate) fn approve(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        id: VehicleId,
    ) -> CoreResult<Vehicle> {
        principal.require_superadmin("approve vehicles")?;

        let vehicle = Self::get(tx.tables(), id)?;
        if vehicle.status != VehicleStatus::PendingApproval {
            return Err(CoreError::InvalidState(format!(
                "vehicle {id} is not pending approval"
            )));
        }

        let now = tx.now();
        let vehicle = Self::update(tx, id, |v| {
            v.status = VehicleStatus::Available;
            v.approved_by = Some(principal.user_id);
            v.approved_at = Some(now);
        })?;

        tx.emit(DomainEvent::VehicleApproved { vehicle_id: id });
        tx.audit(principal, audit_actions::VEHICLE_APPROVE, id);
        tracing::info!(vehicle = %id, approver = %principal.user_id, "vehicle approved");
        Ok(vehicle)
    }

    /// Manual status change by an operator.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidState`] for `pending_approval` (creation only) and `active`
    ///   (onboarding only)
    /// - [`CoreError::Forbidden`] for `inactive`/`disabled` unless superadmin, or when the
    ///   caller does not administer the owning fleet
    /// - [`CoreError::Conflict`] while a trip holds the vehicle
    pub(crate) fn set_status(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        id: VehicleId,
        status: VehicleStatus,
    ) -> CoreResult<Vehicle> {
        let vehicle = Self::get(tx.tables(), id)?;

        match status {
            VehicleStatus::PendingApproval => {
                return Err(CoreError::InvalidState(
                    "vehicles enter pending_approval only on creation".into(),
                ))
            }
            VehicleStatus::Active => {
                return Err(CoreError::InvalidState(
                    "vehicles become active only by onboarding a patient".into(),
                ))
            }
            VehicleStatus::Available
            | VehicleStatus::Maintenance
            | VehicleStatus::Inactive
            | VehicleStatus::Disabled => {}
        }
        if status.is_restricted() && !principal.is_superadmin() {
            return Err(CoreError::Forbidden(format!(
                "only a superadmin may mark a vehicle {status:?}"
            )));
        }
        if !principal.administers(vehicle.organization_id) {
            return Err(CoreError::Forbidden(format!(
                "user {} does not administer vehicle {id}",
                principal.user_id
            )));
        }
        if vehicle.status == VehicleStatus::PendingApproval {
            return Err(CoreError::InvalidState(format!(
                "vehicle {id} must be approved first"
            )));
        }
        if let Some(hospital) = vehicle.locked_hospital_id {
            return Err(CoreError::Conflict(format!(
                "vehicle {id} is held by organization {hospital} for an active trip"
            )));
        }

        let vehicle = Self::update(tx, id, |v| v.status = status)?;
        tx.emit(DomainEvent::VehicleStatusChanged {
            vehicle_id: id,
            status,
        });
        tx.audit(principal, audit_actions::VEHICLE_STATUS, id);
        Ok(vehicle)
    }

    /// Set the advisory lock. Re-locking by the holder is a no-op.
    pub(crate) fn lock(
        tx: &mut Transaction<'_>,
        id: VehicleId,
        hospital_id: OrganizationId,
    ) -> CoreResult<Vehicle> {
        match Self::get(tx.tables(), id)?.locked_hospital_id {
            Some(holder) if holder != hospital_id => Err(CoreError::Conflict(format!(
                "vehicle {id} is locked by organization {holder}"
            ))),
            _ => Self::update(tx, id, |v| v.locked_hospital_id = Some(hospital_id)),
        }
    }

    pub(crate) fn unlock(tx: &mut Transaction<'_>, id: VehicleId) -> CoreResult<Vehicle> {
        Self::update(tx, id, |v| v.locked_hospital_id = None)
    }

    /// Lock the vehicle to `hospital_id` and mark it `active`.
    pub(crate) fn claim_for_trip(
        tx: &mut Transaction<'_>,
        id: VehicleId,
        hospital_id: OrganizationId,
    ) -> CoreResult<Vehicle> {
        Self::lock(tx, id, hospital_id)?;
        Self::update(tx, id, |v| v.status = VehicleStatus::Active)
    }

    /// Clear the lock and return the vehicle to `available`.
    pub(crate) fn release_from_trip(tx: &mut Transaction<'_>, id: VehicleId) -> CoreResult<Vehicle> {
        Self::unlock(tx, id)?;
        Self::update(tx, id, |v| v.status = VehicleStatus::Available)
    }

    fn update(
        tx: &mut Transaction<'_>,
        id: VehicleId,
        apply: impl FnOnce(&mut Vehicle),
    ) -> CoreResult<Vehicle> {
        let now = tx.now();
        let vehicle = tx
            .tables_mut()
            .vehicles
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("vehicle", id))?;
        apply(vehicle);
        vehicle.updated_at = now;
        Ok(vehicle.clone())
    }
}
