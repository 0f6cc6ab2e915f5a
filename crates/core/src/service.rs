//! Transport service.
//!
//! [`TransportService`] is the entry point for callers. Every mutating operation runs as one
//! unit of work on the [`Store`]; once it commits, the queued domain events and audit records
//! are handed to the sinks on a best-effort basis. A sink failure is logged and never reaches
//! the caller.

use crate::access::TripAccessPath;
use crate::config::CoreConfig;
use crate::constants::audit_actions;
use crate::error::{CoreError, CoreResult};
use crate::events::{
    publish_best_effort, record_best_effort, AuditSink, EventSink, JsonlAuditSink,
    TracingAuditSink, TracingEventSink,
};
use crate::principal::Principal;
use crate::repositories::assignments::{Assignment, CrewAssignmentRegistry, Unassignment};
use crate::repositories::organizations::{Organization, OrganizationDirectory, OrganizationStatus};
use crate::repositories::partnerships::{
    Acceptance, CollaborationRequest, EnsureOutcome, Partnership, PartnershipRegistry,
    ReconcileReport,
};
use crate::repositories::patients::{Patient, PatientRegistry};
use crate::repositories::trips::{DataEntry, OnboardRequest, Trip, TripFilter, TripLifecycle};
use crate::repositories::users::{Suspension, User, UserDirectory};
use crate::repositories::vehicles::{Vehicle, VehicleRegistry, VehicleStatus};
use crate::store::{MemoryStore, Store, Tables, Transaction};
use medtrip_ids::{
    AssignmentId, CollaborationRequestId, OrganizationId, PatientId, TripId, UserId, VehicleId,
};
use medtrip_types::{NonEmptyText, OrganizationType, Role};
use serde_json::Value;
use std::sync::Arc;

/// Service facade over the store, the registries and the sinks.
pub struct TransportService<S: Store = MemoryStore> {
    cfg: Arc<CoreConfig>,
    store: Arc<S>,
    events: Arc<dyn EventSink>,
    audit: Arc<dyn AuditSink>,
}

impl<S: Store> Clone for TransportService<S> {
    fn clone(&self) -> Self {
        Self {
            cfg: Arc::clone(&self.cfg),
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            audit: Arc::clone(&self.audit),
        }
    }
}

impl TransportService<MemoryStore> {
    /// Build a service from configuration: a file-backed store when a data file is
    /// configured, a JSON-lines audit log when an audit path is configured, and tracing sinks
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Internal`] if the data file cannot be loaded or the audit log
    /// cannot be opened.
    pub fn open(cfg: Arc<CoreConfig>) -> CoreResult<Self> {
        let store = match cfg.data_file() {
            Some(path) => MemoryStore::open(path)?,
            None => MemoryStore::new(),
        };
        let audit: Arc<dyn AuditSink> = match cfg.audit_log() {
            Some(path) => Arc::new(JsonlAuditSink::open(path).map_err(|e| {
                CoreError::Internal(format!(
                    "failed to open audit log {}: {e}",
                    path.display()
                ))
            })?),
            None => Arc::new(TracingAuditSink),
        };

        Ok(Self::new(cfg, Arc::new(store)).with_audit_sink(audit))
    }
}

impl<S: Store> TransportService<S> {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<S>) -> Self {
        Self {
            cfg,
            store,
            events: Arc::new(TracingEventSink),
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn commit<R>(&self, f: impl FnOnce(&mut Transaction<'_>) -> CoreResult<R>) -> CoreResult<R> {
        let committed = self.store.write(f)?;
        publish_best_effort(self.events.as_ref(), &committed.events);
        record_best_effort(self.audit.as_ref(), &committed.audit);
        Ok(committed.value)
    }

    fn query<R>(&self, f: impl FnOnce(&Tables) -> CoreResult<R>) -> CoreResult<R> {
        self.store.read(f)
    }

    // ========================================================================
    // ORGANIZATIONS
    // ========================================================================

    pub fn create_organization(
        &self,
        principal: &Principal,
        name: NonEmptyText,
        organization_type: OrganizationType,
    ) -> CoreResult<Organization> {
        self.commit(|tx| OrganizationDirectory::create(tx, principal, name, organization_type))
    }

    pub fn get_organization(&self, id: OrganizationId) -> CoreResult<Organization> {
        self.query(|t| OrganizationDirectory::get(t, id).cloned())
    }

    pub fn list_organizations(&self) -> CoreResult<Vec<Organization>> {
        self.query(|t| Ok(OrganizationDirectory::list(t)))
    }

    pub fn set_organization_status(
        &self,
        principal: &Principal,
        id: OrganizationId,
        status: OrganizationStatus,
    ) -> CoreResult<Organization> {
        self.commit(|tx| OrganizationDirectory::set_status(tx, principal, id, status))
    }

    // ========================================================================
    // USERS
    // ========================================================================

    pub fn register_user(
        &self,
        principal: &Principal,
        organization_id: OrganizationId,
        role: Role,
        name: NonEmptyText,
    ) -> CoreResult<User> {
        self.commit(|tx| UserDirectory::register(tx, principal, organization_id, role, name))
    }

    pub fn get_user(&self, id: UserId) -> CoreResult<User> {
        self.query(|t| UserDirectory::get(t, id).cloned())
    }

    /// Remove every crew assignment of the user and suspend them, atomically.
    pub fn suspend_user(&self, principal: &Principal, id: UserId) -> CoreResult<Suspension> {
        self.commit(|tx| UserDirectory::suspend(tx, principal, id))
    }

    pub fn reinstate_user(&self, principal: &Principal, id: UserId) -> CoreResult<User> {
        self.commit(|tx| UserDirectory::reinstate(tx, principal, id))
    }

    // ========================================================================
    // VEHICLES
    // ========================================================================

    pub fn register_vehicle(
        &self,
        principal: &Principal,
        organization_id: OrganizationId,
        call_sign: NonEmptyText,
    ) -> CoreResult<Vehicle> {
        self.commit(|tx| VehicleRegistry::register(tx, principal, organization_id, call_sign))
    }

    pub fn approve_vehicle(&self, principal: &Principal, id: VehicleId) -> CoreResult<Vehicle> {
        self.commit(|tx| VehicleRegistry::approve(tx, principal, id))
    }

    pub fn set_vehicle_status(
        &self,
        principal: &Principal,
        id: VehicleId,
        status: VehicleStatus,
    ) -> CoreResult<Vehicle> {
        self.commit(|tx| VehicleRegistry::set_status(tx, principal, id, status))
    }

    pub fn get_vehicle(&self, principal: &Principal, id: VehicleId) -> CoreResult<Vehicle> {
        self.query(|t| VehicleRegistry::get_visible(t, principal, id).cloned())
    }

    pub fn list_vehicles(&self, principal: &Principal) -> CoreResult<Vec<Vehicle>> {
        self.query(|t| Ok(VehicleRegistry::list_visible(t, principal)))
    }

    // ========================================================================
    // CREW ASSIGNMENTS
    // ========================================================================

    pub fn assign_crew(
        &self,
        principal: &Principal,
        vehicle_id: VehicleId,
        user_id: UserId,
        role_label: Option<NonEmptyText>,
    ) -> CoreResult<Assignment> {
        self.commit(|tx| {
            CrewAssignmentRegistry::assign(tx, principal, vehicle_id, user_id, role_label)
        })
    }

    pub fn unassign_crew(
        &self,
        principal: &Principal,
        vehicle_id: VehicleId,
        user_id: UserId,
        assigning_org: Option<OrganizationId>,
    ) -> CoreResult<Unassignment> {
        self.commit(|tx| {
            CrewAssignmentRegistry::unassign(tx, principal, vehicle_id, user_id, assigning_org)
        })
    }

    pub fn list_assignments(
        &self,
        principal: &Principal,
        vehicle_id: VehicleId,
    ) -> CoreResult<Vec<Assignment>> {
        self.query(|t| CrewAssignmentRegistry::list_for_vehicle(t, principal, vehicle_id))
    }

    pub fn get_assignment(&self, id: AssignmentId) -> CoreResult<Assignment> {
        self.query(|t| CrewAssignmentRegistry::get(t, id).cloned())
    }

    // ========================================================================
    // PARTNERSHIPS
    // ========================================================================

    pub fn request_collaboration(
        &self,
        principal: &Principal,
        hospital_id: OrganizationId,
        fleet_id: OrganizationId,
        message: Option<NonEmptyText>,
    ) -> CoreResult<CollaborationRequest> {
        self.commit(|tx| {
            PartnershipRegistry::request_collaboration(tx, principal, hospital_id, fleet_id, message)
        })
    }

    pub fn accept_collaboration(
        &self,
        principal: &Principal,
        id: CollaborationRequestId,
    ) -> CoreResult<Acceptance> {
        self.commit(|tx| PartnershipRegistry::accept(tx, principal, id))
    }

    pub fn reject_collaboration(
        &self,
        principal: &Principal,
        id: CollaborationRequestId,
    ) -> CoreResult<CollaborationRequest> {
        self.commit(|tx| PartnershipRegistry::reject(tx, principal, id))
    }

    pub fn cancel_collaboration(
        &self,
        principal: &Principal,
        id: CollaborationRequestId,
    ) -> CoreResult<CollaborationRequest> {
        self.commit(|tx| PartnershipRegistry::cancel(tx, principal, id))
    }

    pub fn list_collaboration_requests(
        &self,
        principal: &Principal,
    ) -> CoreResult<Vec<CollaborationRequest>> {
        self.query(|t| Ok(PartnershipRegistry::list_requests(t, principal)))
    }

    /// Operator override: make sure `(fleet_id, hospital_id)` has an active partnership.
    pub fn ensure_active_partnership(
        &self,
        principal: &Principal,
        fleet_id: OrganizationId,
        hospital_id: OrganizationId,
    ) -> CoreResult<(Partnership, EnsureOutcome)> {
        principal.require_superadmin("grant partnerships directly")?;
        self.commit(|tx| {
            let result = PartnershipRegistry::ensure_active(tx, fleet_id, hospital_id)?;
            tx.audit(principal, audit_actions::PARTNERSHIP_ENSURE, result.0.id);
            Ok(result)
        })
    }

    pub fn deactivate_partnership(
        &self,
        principal: &Principal,
        fleet_id: OrganizationId,
        hospital_id: OrganizationId,
    ) -> CoreResult<Partnership> {
        self.commit(|tx| PartnershipRegistry::deactivate(tx, principal, fleet_id, hospital_id))
    }

    pub fn reconcile_partnerships(&self, principal: &Principal) -> CoreResult<ReconcileReport> {
        principal.require_superadmin("reconcile partnerships")?;
        self.commit(|tx| PartnershipRegistry::reconcile_accepted_requests(tx))
    }

    pub fn is_partnered(&self, a: OrganizationId, b: OrganizationId) -> CoreResult<bool> {
        self.query(|t| Ok(PartnershipRegistry::is_active_between(t, a, b)))
    }

    // ========================================================================
    // PATIENTS
    // ========================================================================

    pub fn register_patient(
        &self,
        principal: &Principal,
        name: NonEmptyText,
        national_id: Option<NonEmptyText>,
    ) -> CoreResult<Patient> {
        self.commit(|tx| PatientRegistry::register(tx, principal, name, national_id))
    }

    pub fn get_patient(&self, principal: &Principal, id: PatientId) -> CoreResult<Patient> {
        self.query(|t| PatientRegistry::get_visible(t, principal, id).cloned())
    }

    pub fn list_patients(&self, principal: &Principal) -> CoreResult<Vec<Patient>> {
        self.query(|t| Ok(PatientRegistry::list_visible(t, principal)))
    }

    pub fn deactivate_patient(&self, principal: &Principal, id: PatientId) -> CoreResult<Patient> {
        self.commit(|tx| PatientRegistry::deactivate(tx, principal, id))
    }

    // ========================================================================
    // TRIPS
    // ========================================================================

    pub fn onboard(&self, principal: &Principal, request: OnboardRequest) -> CoreResult<Trip> {
        self.commit(|tx| TripLifecycle::onboard(tx, principal, request))
    }

    pub fn start_transit(&self, principal: &Principal, id: TripId) -> CoreResult<Trip> {
        self.commit(|tx| TripLifecycle::start_transit(tx, principal, id))
    }

    pub fn add_trip_entry(
        &self,
        principal: &Principal,
        id: TripId,
        kind: NonEmptyText,
        payload: Value,
    ) -> CoreResult<DataEntry> {
        let cap = self.cfg.max_trip_entries();
        self.commit(|tx| TripLifecycle::add_data_entry(tx, principal, id, kind, payload, cap))
    }

    pub fn set_trip_destination(
        &self,
        principal: &Principal,
        id: TripId,
        hospital_id: OrganizationId,
    ) -> CoreResult<Trip> {
        self.commit(|tx| TripLifecycle::set_destination(tx, principal, id, hospital_id))
    }

    pub fn offboard(
        &self,
        principal: &Principal,
        id: TripId,
        notes: Option<NonEmptyText>,
    ) -> CoreResult<Trip> {
        self.commit(|tx| TripLifecycle::offboard(tx, principal, id, notes))
    }

    pub fn cancel_trip(
        &self,
        principal: &Principal,
        id: TripId,
        reason: Option<NonEmptyText>,
    ) -> CoreResult<Trip> {
        self.commit(|tx| TripLifecycle::cancel(tx, principal, id, reason))
    }

    pub fn get_trip(&self, principal: &Principal, id: TripId) -> CoreResult<Trip> {
        self.query(|t| TripLifecycle::get_visible(t, principal, id))
    }

    pub fn list_trips(&self, principal: &Principal, filter: &TripFilter) -> CoreResult<Vec<Trip>> {
        self.query(|t| Ok(TripLifecycle::list_visible(t, principal, filter)))
    }

    /// Which access rule, if any, lets `principal` act on the trip.
    pub fn check_trip_access(
        &self,
        principal: &Principal,
        id: TripId,
    ) -> CoreResult<Option<TripAccessPath>> {
        self.query(|t| {
            let facts = TripLifecycle::trip_facts(t, id)?;
            Ok(crate::access::resolve_trip_access(principal, &facts))
        })
    }
}
