mod common;

use common::Harness;
use medtrip_core::repositories::trips::TripFilter;
use medtrip_core::types::Role;
use medtrip_core::CoreError;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn racing_onboardings_onto_one_vehicle_yield_one_trip() {
    let h = Harness::new();
    h.service
        .ensure_active_partnership(&h.root, h.fleet, h.hospital)
        .expect("partner");
    let nurse = h.member(h.hospital, Role::Staff);

    const CONTENDERS: usize = 8;
    let patients: Vec<_> = (0..CONTENDERS)
        .map(|i| h.patient(&format!("Patient {i}")))
        .collect();
    let barrier = Arc::new(Barrier::new(CONTENDERS));

    let handles: Vec<_> = patients
        .into_iter()
        .map(|patient| {
            let service = h.service.clone();
            let nurse = nurse.clone();
            let barrier = Arc::clone(&barrier);
            let vehicle = h.vehicle;
            thread::spawn(move || {
                barrier.wait();
                service.onboard(
                    &nurse,
                    medtrip_core::repositories::trips::OnboardRequest {
                        patient_id: patient,
                        vehicle_id: vehicle,
                        destination_organization_id: None,
                        pickup: None,
                        destination: None,
                    },
                )
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread completes"))
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, CoreError::Conflict(_))));

    let trips = h
        .service
        .list_trips(&h.root, &TripFilter::default())
        .expect("list");
    assert_eq!(trips.len(), 1);
}

#[test]
fn racing_onboardings_of_one_patient_yield_one_trip() {
    let h = Harness::new();
    h.service
        .ensure_active_partnership(&h.root, h.fleet, h.hospital)
        .expect("partner");
    let nurse = h.member(h.hospital, Role::Staff);

    const CONTENDERS: usize = 6;
    let vehicles: Vec<_> = (0..CONTENDERS)
        .map(|i| h.vehicle(&format!("RR-1{i}")))
        .collect();
    let barrier = Arc::new(Barrier::new(CONTENDERS));

    let handles: Vec<_> = vehicles
        .into_iter()
        .map(|vehicle| {
            let service = h.service.clone();
            let nurse = nurse.clone();
            let barrier = Arc::clone(&barrier);
            let patient = h.patient;
            thread::spawn(move || {
                barrier.wait();
                service.onboard(
                    &nurse,
                    medtrip_core::repositories::trips::OnboardRequest {
                        patient_id: patient,
                        vehicle_id: vehicle,
                        destination_organization_id: None,
                        pickup: None,
                        destination: None,
                    },
                )
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("thread completes"))
        .filter(Result::is_ok)
        .count();
    assert_eq!(successes, 1);
}
