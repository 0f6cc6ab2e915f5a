//! Trip Lifecycle Manager.
//!
//! ```text
//! onboarded ──► in_transit ──► offboarded
//!     │              │
//!     └──────────────┴────────► cancelled
//! ```
//!
//! Onboarding claims the vehicle (status `active`, locked to the requesting organization) and
//! marks the patient onboarded. Offboarding and cancelling release both. Trips are never
//! deleted; an offboarded trip carries an immutable [`OffboardSnapshot`].
//!
//! [`TripTable`] keeps a per-vehicle and per-patient index of non-terminal trips and refuses
//! any insert or update that would give either a second one, independent of the prechecks run
//! by [`TripLifecycle::onboard`].

use crate::access::{
    can_access, resolve_onboard, resolve_trip_access, OnboardFacts, TripAccessPath, TripFacts,
};
use crate::constants::audit_actions;
use crate::error::{CoreError, CoreResult};
use crate::events::DomainEvent;
use crate::principal::Principal;
use crate::repositories::assignments::CrewAssignmentRegistry;
use crate::repositories::organizations::{Organization, OrganizationDirectory};
use crate::repositories::partnerships::PartnershipRegistry;
use crate::repositories::patients::{Patient, PatientRegistry, PatientStatus};
use crate::repositories::users::UserDirectory;
use crate::repositories::vehicles::{Vehicle, VehicleRegistry, VehicleStatus};
use crate::store::{Tables, Transaction};
use chrono::{DateTime, Utc};
use medtrip_ids::{DataEntryId, OrganizationId, PatientId, TripId, UserId, VehicleId};
use medtrip_types::{NonEmptyText, OrganizationType, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Onboarded,
    InTransit,
    Offboarded,
    Cancelled,
}

impl TripStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TripStatus::Offboarded | TripStatus::Cancelled)
    }
}

/// Free-form observation attached to a trip while it is in progress.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub id: DataEntryId,
    pub kind: NonEmptyText,
    pub payload: Value,
    pub recorded_by: UserId,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub patient_id: PatientId,
    pub vehicle_id: VehicleId,
    /// The organization that initiated the trip.
    pub organization_id: OrganizationId,
    pub destination_organization_id: Option<OrganizationId>,
    pub status: TripStatus,
    pub pickup: Option<Value>,
    pub destination: Option<Value>,
    pub data_entries: Vec<DataEntry>,
    pub onboarded_by: UserId,
    pub onboarded_at: DateTime<Utc>,
    pub transit_started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub snapshot: Option<OffboardSnapshot>,
    pub cancelled_by: Option<UserId>,
    pub cancel_reason: Option<NonEmptyText>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: PatientId,
    pub name: NonEmptyText,
    pub national_id: Option<NonEmptyText>,
    pub organization_id: Option<OrganizationId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSummary {
    pub id: VehicleId,
    pub call_sign: NonEmptyText,
    pub organization_id: OrganizationId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSummary {
    pub id: OrganizationId,
    pub name: NonEmptyText,
    pub organization_type: OrganizationType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewMember {
    pub user_id: UserId,
    pub name: Option<NonEmptyText>,
    pub role: Option<Role>,
    pub role_label: Option<NonEmptyText>,
    pub assigning_organization_id: OrganizationId,
}

/// Point-in-time context captured when a trip is offboarded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OffboardSnapshot {
    pub patient: PatientSummary,
    pub vehicle: VehicleSummary,
    pub crew: Vec<CrewMember>,
    pub owning_organization: OrganizationSummary,
    pub destination_organization: Option<OrganizationSummary>,
    pub pickup: Option<Value>,
    pub destination: Option<Value>,
    pub elapsed_seconds: i64,
    pub data_entries: Vec<DataEntry>,
    pub offboarded_by: UserId,
    pub offboarded_at: DateTime<Utc>,
    pub notes: Option<NonEmptyText>,
}

impl From<&Patient> for PatientSummary {
    fn from(p: &Patient) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            national_id: p.national_id.clone(),
            organization_id: p.organization_id,
        }
    }
}

impl From<&Vehicle> for VehicleSummary {
    fn from(v: &Vehicle) -> Self {
        Self {
            id: v.id,
            call_sign: v.call_sign.clone(),
            organization_id: v.organization_id,
        }
    }
}

impl From<&Organization> for OrganizationSummary {
    fn from(o: &Organization) -> Self {
        Self {
            id: o.id,
            name: o.name.clone(),
            organization_type: o.organization_type,
        }
    }
}

// ============================================================================
// TABLE
// ============================================================================

/// Trip rows plus the indexes that enforce one non-terminal trip per vehicle and per patient.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TripTable {
    rows: BTreeMap<TripId, Trip>,
    #[serde(skip)]
    active_by_vehicle: BTreeMap<VehicleId, TripId>,
    #[serde(skip)]
    active_by_patient: BTreeMap<PatientId, TripId>,
}

impl TripTable {
    pub fn get(&self, id: TripId) -> Option<&Trip> {
        self.rows.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trip> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn active_for_vehicle(&self, vehicle_id: VehicleId) -> Option<TripId> {
        self.active_by_vehicle.get(&vehicle_id).copied()
    }

    pub fn active_for_patient(&self, patient_id: PatientId) -> Option<TripId> {
        self.active_by_patient.get(&patient_id).copied()
    }

    pub(crate) fn insert(&mut self, trip: Trip) -> CoreResult<()> {
        if self.rows.contains_key(&trip.id) {
            return Err(CoreError::Conflict(format!("trip {} already exists", trip.id)));
        }
        self.index(&trip)?;
        self.rows.insert(trip.id, trip);
        Ok(())
    }

    /// Replace an existing row, keeping the indexes in step with its status.
    pub(crate) fn update(&mut self, trip: Trip) -> CoreResult<()> {
        let Some(previous) = self.rows.get(&trip.id) else {
            return Err(CoreError::not_found("trip", trip.id));
        };
        let (old_vehicle, old_patient) = (previous.vehicle_id, previous.patient_id);
        self.unindex(trip.id, old_vehicle, old_patient);
        self.index(&trip)?;
        self.rows.insert(trip.id, trip);
        Ok(())
    }

    /// Recompute both indexes from the rows, e.g. after loading a data file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Internal`] if the rows hold two non-terminal trips for one vehicle
    /// or one patient.
    pub(crate) fn rebuild_indexes(&mut self) -> CoreResult<()> {
        self.active_by_vehicle.clear();
        self.active_by_patient.clear();
        let rows: Vec<Trip> = self.rows.values().cloned().collect();
        for trip in &rows {
            self.index(trip).map_err(|e| {
                CoreError::Internal(format!("stored trips are inconsistent: {e}"))
            })?;
        }
        Ok(())
    }

    fn index(&mut self, trip: &Trip) -> CoreResult<()> {
        if trip.status.is_terminal() {
            return Ok(());
        }
        if let Some(other) = self.active_for_vehicle(trip.vehicle_id) {
            if other != trip.id {
                return Err(CoreError::Conflict(format!(
                    "vehicle {} already has active trip {other}",
                    trip.vehicle_id
                )));
            }
        }
        if let Some(other) = self.active_for_patient(trip.patient_id) {
            if other != trip.id {
                return Err(CoreError::Conflict(format!(
                    "patient {} already has active trip {other}",
                    trip.patient_id
                )));
            }
        }
        self.active_by_vehicle.insert(trip.vehicle_id, trip.id);
        self.active_by_patient.insert(trip.patient_id, trip.id);
        Ok(())
    }

    fn unindex(&mut self, id: TripId, vehicle_id: VehicleId, patient_id: PatientId) {
        if self.active_by_vehicle.get(&vehicle_id) == Some(&id) {
            self.active_by_vehicle.remove(&vehicle_id);
        }
        if self.active_by_patient.get(&patient_id) == Some(&id) {
            self.active_by_patient.remove(&patient_id);
        }
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnboardRequest {
    pub patient_id: PatientId,
    pub vehicle_id: VehicleId,
    pub destination_organization_id: Option<OrganizationId>,
    pub pickup: Option<Value>,
    pub destination: Option<Value>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripFilter {
    pub status: Option<TripStatus>,
    pub vehicle_id: Option<VehicleId>,
}

impl TripFilter {
    fn matches(&self, trip: &Trip) -> bool {
        self.status.map_or(true, |s| trip.status == s)
            && self.vehicle_id.map_or(true, |v| trip.vehicle_id == v)
    }
}

pub struct TripLifecycle;

impl TripLifecycle {
    /// Start a trip for `request.patient_id` on `request.vehicle_id`.
    ///
    /// Preconditions are checked in order and the first failure is returned:
    ///
    /// 1. the vehicle exists and is `available`; a vehicle already on a trip is a
    ///    [`CoreError::Conflict`], any other status [`CoreError::InvalidState`]
    /// 2. no non-terminal trip references the vehicle
    /// 3. the patient exists, is active and has no non-terminal trip
    /// 4. the requester's fleet owns the vehicle, or the requester's hospital owns it or
    ///    partners with its owner
    pub(crate) fn onboard(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        request: OnboardRequest,
    ) -> CoreResult<Trip> {
        let (requester_org, requester_type) = principal.require_organization()?;
        if requester_type == OrganizationType::System {
            return Err(CoreError::Forbidden(
                "system organizations cannot onboard patients".into(),
            ));
        }

        let vehicle = VehicleRegistry::get(tx.tables(), request.vehicle_id)?;
        match vehicle.status {
            VehicleStatus::Available if vehicle.locked_hospital_id.is_none() => {}
            VehicleStatus::Available | VehicleStatus::Active => {
                return Err(CoreError::Conflict(format!(
                    "vehicle {} is already on a trip",
                    vehicle.id
                )))
            }
            other => {
                return Err(CoreError::InvalidState(format!(
                    "vehicle {} is {other:?}, not available",
                    vehicle.id
                )))
            }
        }
        let vehicle_owner = vehicle.organization_id;

        if let Some(existing) = tx.tables().trips.active_for_vehicle(request.vehicle_id) {
            return Err(CoreError::Conflict(format!(
                "vehicle {} already has active trip {existing}",
                request.vehicle_id
            )));
        }

        let patient = PatientRegistry::get(tx.tables(), request.patient_id)?;
        if patient.status != PatientStatus::Active {
            return Err(CoreError::InvalidState(format!(
                "patient {} is inactive",
                patient.id
            )));
        }
        if patient.is_onboarded
            || tx
                .tables()
                .trips
                .active_for_patient(request.patient_id)
                .is_some()
        {
            return Err(CoreError::Conflict(format!(
                "patient {} is already on an active trip",
                patient.id
            )));
        }

        OrganizationDirectory::require_active(tx.tables(), requester_org)?;
        let facts = OnboardFacts {
            vehicle_owner_organization_id: vehicle_owner,
            partnership_active: PartnershipRegistry::is_active_between(
                tx.tables(),
                requester_org,
                vehicle_owner,
            ),
        };
        let Some(path) = resolve_onboard(principal, &facts) else {
            tracing::debug!(
                user = %principal.user_id,
                vehicle = %request.vehicle_id,
                "onboarding refused: no ownership or partnership"
            );
            return Err(CoreError::Forbidden(format!(
                "organization {requester_org} may not use vehicle {}",
                request.vehicle_id
            )));
        };

        if let Some(dest) = request.destination_organization_id {
            OrganizationDirectory::require_active_of_type(
                tx.tables(),
                dest,
                OrganizationType::Hospital,
            )?;
        }

        let now = tx.now();
        let trip = Trip {
            id: TripId::new(),
            patient_id: request.patient_id,
            vehicle_id: request.vehicle_id,
            organization_id: requester_org,
            destination_organization_id: request.destination_organization_id,
            status: TripStatus::Onboarded,
            pickup: request.pickup,
            destination: request.destination,
            data_entries: Vec::new(),
            onboarded_by: principal.user_id,
            onboarded_at: now,
            transit_started_at: None,
            ended_at: None,
            snapshot: None,
            cancelled_by: None,
            cancel_reason: None,
            updated_at: now,
        };

        tx.tables_mut().trips.insert(trip.clone())?;
        VehicleRegistry::claim_for_trip(tx, trip.vehicle_id, requester_org)?;
        PatientRegistry::set_current_trip(tx, trip.patient_id, Some(trip.id))?;

        tx.emit(DomainEvent::Onboarded {
            trip_id: trip.id,
            patient_id: trip.patient_id,
            vehicle_id: trip.vehicle_id,
            organization_id: requester_org,
        });
        tx.audit(principal, audit_actions::TRIP_ONBOARD, trip.id);
        tracing::info!(
            trip = %trip.id,
            patient = %trip.patient_id,
            vehicle = %trip.vehicle_id,
            ?path,
            "patient onboarded"
        );
        Ok(trip)
    }

    pub(crate) fn start_transit(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        trip_id: TripId,
    ) -> CoreResult<Trip> {
        let mut trip = Self::authorised(tx.tables(), principal, trip_id)?;
        match trip.status {
            TripStatus::Onboarded => {}
            TripStatus::InTransit => {
                return Err(CoreError::InvalidState(format!(
                    "trip {trip_id} is already in transit"
                )))
            }
            TripStatus::Offboarded | TripStatus::Cancelled => {
                return Err(Self::terminal(&trip))
            }
        }

        let now = tx.now();
        trip.status = TripStatus::InTransit;
        trip.transit_started_at = Some(now);
        trip.updated_at = now;
        tx.tables_mut().trips.update(trip.clone())?;

        tx.emit(DomainEvent::TransitStarted {
            trip_id,
            vehicle_id: trip.vehicle_id,
        });
        tx.audit(principal, audit_actions::TRIP_TRANSIT, trip_id);
        Ok(trip)
    }

    pub(crate) fn add_data_entry(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        trip_id: TripId,
        kind: NonEmptyText,
        payload: Value,
        max_entries: usize,
    ) -> CoreResult<DataEntry> {
        let mut trip = Self::authorised(tx.tables(), principal, trip_id)?;
        if trip.status.is_terminal() {
            return Err(Self::terminal(&trip));
        }
        if trip.data_entries.len() >= max_entries {
            return Err(CoreError::Conflict(format!(
                "trip {trip_id} already holds the maximum of {max_entries} entries"
            )));
        }

        let now = tx.now();
        let entry = DataEntry {
            id: DataEntryId::new(),
            kind,
            payload,
            recorded_by: principal.user_id,
            recorded_at: now,
        };
        trip.data_entries.push(entry.clone());
        trip.updated_at = now;
        tx.tables_mut().trips.update(trip)?;

        tx.emit(DomainEvent::TripEntryAdded {
            trip_id,
            entry_id: entry.id,
        });
        tx.audit(principal, audit_actions::TRIP_ENTRY, trip_id);
        Ok(entry)
    }

    /// Point a trip at a receiving hospital. Only the owning organization may do this.
    pub(crate) fn set_destination(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        trip_id: TripId,
        hospital_id: OrganizationId,
    ) -> CoreResult<Trip> {
        let mut trip = Self::get(tx.tables(), trip_id)?.clone();
        if !(principal.is_superadmin() || principal.belongs_to(trip.organization_id)) {
            return Err(CoreError::Forbidden(format!(
                "only the owning organization may change the destination of trip {trip_id}"
            )));
        }
        if trip.status.is_terminal() {
            return Err(Self::terminal(&trip));
        }
        OrganizationDirectory::require_active_of_type(
            tx.tables(),
            hospital_id,
            OrganizationType::Hospital,
        )?;

        trip.destination_organization_id = Some(hospital_id);
        trip.updated_at = tx.now();
        tx.tables_mut().trips.update(trip.clone())?;

        tx.emit(DomainEvent::DestinationChanged {
            trip_id,
            destination_organization_id: hospital_id,
        });
        tx.audit(principal, audit_actions::TRIP_DESTINATION, trip_id);
        Ok(trip)
    }

    /// Finish a trip, capture its snapshot and release the vehicle and patient.
    pub(crate) fn offboard(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        trip_id: TripId,
        notes: Option<NonEmptyText>,
    ) -> CoreResult<Trip> {
        let (mut trip, path) = Self::authorised_open_trip(tx.tables(), principal, trip_id)?;

        let now = tx.now();
        let snapshot = Self::snapshot(tx.tables(), principal, &trip, now, notes)?;
        trip.status = TripStatus::Offboarded;
        trip.ended_at = Some(now);
        trip.snapshot = Some(snapshot);
        trip.updated_at = now;

        Self::finish(tx, &trip)?;

        tx.emit(DomainEvent::Offboarded {
            trip_id,
            patient_id: trip.patient_id,
            vehicle_id: trip.vehicle_id,
        });
        tx.audit(principal, audit_actions::TRIP_OFFBOARD, trip_id);
        tracing::info!(trip = %trip_id, ?path, "patient offboarded");
        Ok(trip)
    }

    pub(crate) fn cancel(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        trip_id: TripId,
        reason: Option<NonEmptyText>,
    ) -> CoreResult<Trip> {
        let (mut trip, path) = Self::authorised_open_trip(tx.tables(), principal, trip_id)?;

        let now = tx.now();
        trip.status = TripStatus::Cancelled;
        trip.ended_at = Some(now);
        trip.cancelled_by = Some(principal.user_id);
        trip.cancel_reason = reason;
        trip.updated_at = now;

        Self::finish(tx, &trip)?;

        tx.emit(DomainEvent::Cancelled {
            trip_id,
            patient_id: trip.patient_id,
            vehicle_id: trip.vehicle_id,
        });
        tx.audit(principal, audit_actions::TRIP_CANCEL, trip_id);
        tracing::info!(trip = %trip_id, ?path, "trip cancelled");
        Ok(trip)
    }

    pub fn get(tables: &Tables, id: TripId) -> CoreResult<&Trip> {
        tables
            .trips
            .get(id)
            .ok_or_else(|| CoreError::not_found("trip", id))
    }

    pub fn get_visible(tables: &Tables, principal: &Principal, id: TripId) -> CoreResult<Trip> {
        Self::authorised(tables, principal, id)
    }

    /// Trips the principal may see, narrowed by `filter`.
    ///
    /// A cheap organization filter runs first; every surviving row is then re-checked through
    /// the trip access rules, which the organization filter alone does not fully capture.
    pub fn list_visible(tables: &Tables, principal: &Principal, filter: &TripFilter) -> Vec<Trip> {
        let crew_vehicles = CrewAssignmentRegistry::vehicles_for_user(tables, principal.user_id);
        let org = principal.organization_id;

        tables
            .trips
            .iter()
            .filter(|t| filter.matches(t))
            .filter(|t| {
                if principal.is_superadmin() {
                    return true;
                }
                let vehicle_owner = VehicleRegistry::get(tables, t.vehicle_id)
                    .ok()
                    .map(|v| v.organization_id);
                let org_match = org.is_some_and(|o| {
                    t.organization_id == o
                        || t.destination_organization_id == Some(o)
                        || vehicle_owner == Some(o)
                });
                org_match || crew_vehicles.contains(&t.vehicle_id)
            })
            .filter(|t| {
                Self::trip_facts(tables, t.id).is_ok_and(|facts| can_access(principal, &facts))
            })
            .cloned()
            .collect()
    }

    /// Gather what the trip access rules need to know about `trip_id`.
    pub fn trip_facts(tables: &Tables, trip_id: TripId) -> CoreResult<TripFacts> {
        let trip = Self::get(tables, trip_id)?;
        let vehicle = VehicleRegistry::get(tables, trip.vehicle_id)?;
        let owner = OrganizationDirectory::get(tables, vehicle.organization_id)?;
        Ok(TripFacts {
            trip_id,
            owner_organization_id: trip.organization_id,
            destination_organization_id: trip.destination_organization_id,
            vehicle_owner_organization_id: owner.id,
            vehicle_owner_type: owner.organization_type,
            active_crew: CrewAssignmentRegistry::active_crew(tables, trip.vehicle_id),
        })
    }

    fn authorised(tables: &Tables, principal: &Principal, trip_id: TripId) -> CoreResult<Trip> {
        Self::authorised_with_path(tables, principal, trip_id).map(|(trip, _)| trip)
    }

    fn authorised_with_path(
        tables: &Tables,
        principal: &Principal,
        trip_id: TripId,
    ) -> CoreResult<(Trip, TripAccessPath)> {
        let trip = Self::get(tables, trip_id)?;
        let facts = Self::trip_facts(tables, trip_id)?;
        match resolve_trip_access(principal, &facts) {
            Some(path) => Ok((trip.clone(), path)),
            None => Err(CoreError::Forbidden(format!(
                "user {} has no access to trip {trip_id}",
                principal.user_id
            ))),
        }
    }

    /// Existence, then the terminal-state guard, then authorisation.
    fn authorised_open_trip(
        tables: &Tables,
        principal: &Principal,
        trip_id: TripId,
    ) -> CoreResult<(Trip, TripAccessPath)> {
        let trip = Self::get(tables, trip_id)?;
        if trip.status.is_terminal() {
            return Err(Self::terminal(trip));
        }
        Self::authorised_with_path(tables, principal, trip_id)
    }

    fn terminal(trip: &Trip) -> CoreError {
        CoreError::Conflict(format!(
            "trip {} is already {:?}",
            trip.id, trip.status
        ))
    }

    /// Write the terminal trip and release the vehicle and patient.
    fn finish(tx: &mut Transaction<'_>, trip: &Trip) -> CoreResult<()> {
        tx.tables_mut().trips.update(trip.clone())?;
        VehicleRegistry::release_from_trip(tx, trip.vehicle_id)?;
        PatientRegistry::set_current_trip(tx, trip.patient_id, None)?;
        Ok(())
    }

    fn snapshot(
        tables: &Tables,
        principal: &Principal,
        trip: &Trip,
        now: DateTime<Utc>,
        notes: Option<NonEmptyText>,
    ) -> CoreResult<OffboardSnapshot> {
        let patient = PatientRegistry::get(tables, trip.patient_id)?;
        let vehicle = VehicleRegistry::get(tables, trip.vehicle_id)?;
        let owning = OrganizationDirectory::get(tables, trip.organization_id)?;
        let destination = trip
            .destination_organization_id
            .map(|id| OrganizationDirectory::get(tables, id).map(OrganizationSummary::from))
            .transpose()?;

        let crew = CrewAssignmentRegistry::active_on_vehicle(tables, trip.vehicle_id)
            .map(|a| {
                let user = UserDirectory::get(tables, a.user_id).ok();
                CrewMember {
                    user_id: a.user_id,
                    name: user.map(|u| u.name.clone()),
                    role: user.map(|u| u.role),
                    role_label: a.role_label.clone(),
                    assigning_organization_id: a.assigning_organization_id,
                }
            })
            .collect();

        Ok(OffboardSnapshot {
            patient: PatientSummary::from(patient),
            vehicle: VehicleSummary::from(vehicle),
            crew,
            owning_organization: OrganizationSummary::from(owning),
            destination_organization: destination,
            pickup: trip.pickup.clone(),
            destination: trip.destination.clone(),
            elapsed_seconds: (now - trip.onboarded_at).num_seconds().max(0),
            data_entries: trip.data_entries.clone(),
            offboarded_by: principal.user_id,
            offboarded_at: now,
            notes,
        })
    }
}
