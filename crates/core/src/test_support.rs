//! Shared fixture for unit tests.

use crate::config::CoreConfig;
use crate::error::CoreResult;
use crate::events::MemoryEventSink;
use crate::principal::Principal;
use crate::repositories::organizations::OrganizationDirectory;
use crate::repositories::trips::{OnboardRequest, Trip};
use crate::service::TransportService;
use crate::store::{MemoryStore, Store, Tables};
use medtrip_ids::{OrganizationId, PatientId, UserId, VehicleId};
use medtrip_types::{NonEmptyText, OrganizationType, Role};
use std::sync::Arc;

pub(crate) fn text(value: &str) -> NonEmptyText {
    NonEmptyText::new(value).expect("fixture text is valid")
}

/// Two hospitals and a fleet, one approved vehicle owned by the fleet and one patient
/// registered by the first hospital. No partnerships.
pub(crate) struct World {
    pub service: TransportService,
    pub events: Arc<MemoryEventSink>,
    pub root: Principal,
    pub hospital: OrganizationId,
    pub other_hospital: OrganizationId,
    pub fleet: OrganizationId,
    pub vehicle: VehicleId,
    pub patient: PatientId,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(CoreConfig::in_memory())
    }

    pub fn with_config(cfg: CoreConfig) -> Self {
        let events = Arc::new(MemoryEventSink::new());
        let service = TransportService::new(Arc::new(cfg), Arc::new(MemoryStore::new()))
            .with_event_sink(events.clone());
        let root = Principal::superadmin(UserId::new());

        let org = |name: &str, kind| {
            service
                .create_organization(&root, text(name), kind)
                .expect("create organization")
                .id
        };
        let hospital = org("St Mary's", OrganizationType::Hospital);
        let other_hospital = org("Royal Infirmary", OrganizationType::Hospital);
        let fleet = org("Rapid Response", OrganizationType::Fleet);

        let mut world = Self {
            service,
            events,
            root,
            hospital,
            other_hospital,
            fleet,
            vehicle: VehicleId::new(),
            patient: PatientId::new(),
        };
        world.vehicle = world.approved_vehicle(fleet, "RR-01");
        let nurse = world.member(hospital, Role::Staff);
        world.patient = world
            .service
            .register_patient(&nurse, text("Ada Lovelace"), None)
            .expect("register patient")
            .id;
        world
    }

    /// Register a user in `org` and return the principal they would authenticate as.
    pub fn member(&self, org: OrganizationId, role: Role) -> Principal {
        let user = self
            .service
            .register_user(&self.root, org, role, text("Test User"))
            .expect("register user");
        let kind = self
            .tables(|t| Ok(OrganizationDirectory::get(t, org)?.organization_type))
            .expect("organization exists");
        Principal::new(user.id, role, org, kind)
    }

    pub fn admin(&self, org: OrganizationId) -> Principal {
        self.member(org, Role::Admin)
    }

    pub fn approved_vehicle(&self, fleet: OrganizationId, call_sign: &str) -> VehicleId {
        let vehicle = self
            .service
            .register_vehicle(&self.root, fleet, text(call_sign))
            .expect("register vehicle");
        self.service
            .approve_vehicle(&self.root, vehicle.id)
            .expect("approve vehicle")
            .id
    }

    pub fn partner(&self, fleet: OrganizationId, hospital: OrganizationId) {
        self.service
            .ensure_active_partnership(&self.root, fleet, hospital)
            .expect("ensure partnership");
    }

    pub fn onboard(
        &self,
        principal: &Principal,
        patient_id: PatientId,
        vehicle_id: VehicleId,
    ) -> CoreResult<Trip> {
        self.service.onboard(
            principal,
            OnboardRequest {
                patient_id,
                vehicle_id,
                destination_organization_id: None,
                pickup: None,
                destination: None,
            },
        )
    }

    pub fn tables<R>(&self, f: impl FnOnce(&Tables) -> CoreResult<R>) -> CoreResult<R> {
        self.service.store().read(f)
    }
}
