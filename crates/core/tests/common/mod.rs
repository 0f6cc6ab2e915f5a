#![allow(dead_code)]

use medtrip_core::events::MemoryEventSink;
use medtrip_core::ids::{OrganizationId, PatientId, UserId, VehicleId};
use medtrip_core::repositories::trips::{OnboardRequest, Trip};
use medtrip_core::types::{NonEmptyText, OrganizationType, Role};
use medtrip_core::{CoreConfig, CoreResult, MemoryStore, Principal, TransportService};
use std::sync::Arc;

pub fn text(value: &str) -> NonEmptyText {
    NonEmptyText::new(value).expect("valid text")
}

/// Hospital H, unrelated hospital X, fleet F with one approved vehicle, one patient of H.
pub struct Harness {
    pub service: TransportService,
    pub events: Arc<MemoryEventSink>,
    pub root: Principal,
    pub hospital: OrganizationId,
    pub third_party: OrganizationId,
    pub fleet: OrganizationId,
    pub vehicle: VehicleId,
    pub patient: PatientId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_service(TransportService::new(
            Arc::new(CoreConfig::in_memory()),
            Arc::new(MemoryStore::new()),
        ))
    }

    pub fn with_service(service: TransportService) -> Self {
        let events = Arc::new(MemoryEventSink::new());
        let service = service.with_event_sink(events.clone());
        let root = Principal::superadmin(UserId::new());

        let hospital = service
            .create_organization(&root, text("St Mary's"), OrganizationType::Hospital)
            .expect("hospital")
            .id;
        let third_party = service
            .create_organization(&root, text("Royal Infirmary"), OrganizationType::Hospital)
            .expect("third party")
            .id;
        let fleet = service
            .create_organization(&root, text("Rapid Response"), OrganizationType::Fleet)
            .expect("fleet")
            .id;

        let vehicle = service
            .register_vehicle(&root, fleet, text("RR-01"))
            .expect("vehicle")
            .id;
        service.approve_vehicle(&root, vehicle).expect("approve");
        let patient = service
            .register_patient(&root, text("Ada Lovelace"), None)
            .expect("patient")
            .id;

        Self {
            service,
            events,
            root,
            hospital,
            third_party,
            fleet,
            vehicle,
            patient,
        }
    }

    pub fn member(&self, org: OrganizationId, role: Role) -> Principal {
        let user = self
            .service
            .register_user(&self.root, org, role, text("Staff Member"))
            .expect("register user");
        let kind = self
            .service
            .get_organization(org)
            .expect("organization")
            .organization_type;
        Principal::new(user.id, role, org, kind)
    }

    pub fn vehicle(&self, call_sign: &str) -> VehicleId {
        let id = self
            .service
            .register_vehicle(&self.root, self.fleet, text(call_sign))
            .expect("vehicle")
            .id;
        self.service.approve_vehicle(&self.root, id).expect("approve");
        id
    }

    pub fn patient(&self, name: &str) -> PatientId {
        self.service
            .register_patient(&self.root, text(name), None)
            .expect("patient")
            .id
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
}
