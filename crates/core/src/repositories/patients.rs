//! Patient Registry.
//!
//! `is_onboarded` and `current_trip_id` denormalise the patient's non-terminal trip.
//! [`PatientRegistry::set_current_trip`] is the only writer of both fields and only the trip
//! lifecycle calls it.

use crate::access::{can_access, resolve_patient_access, PatientAccessPath, PatientFacts};
use crate::constants::audit_actions;
use crate::error::{CoreError, CoreResult};
use crate::principal::Principal;
use crate::repositories::organizations::OrganizationDirectory;
use crate::repositories::trips::TripLifecycle;
use crate::store::{Tables, Transaction};
use chrono::{DateTime, Utc};
use medtrip_ids::{OrganizationId, PatientId, TripId};
use medtrip_types::NonEmptyText;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Active,
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    /// `None` for global records created by a superadmin.
    pub organization_id: Option<OrganizationId>,
    pub name: NonEmptyText,
    pub national_id: Option<NonEmptyText>,
    pub status: PatientStatus,
    pub is_onboarded: bool,
    pub current_trip_id: Option<TripId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct PatientRegistry;

impl PatientRegistry {
    pub(crate) fn register(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        name: NonEmptyText,
        national_id: Option<NonEmptyText>,
    ) -> CoreResult<Patient> {
        let organization_id = if principal.is_superadmin() {
            None
        } else {
            let (org, _) = principal.require_organization()?;
            OrganizationDirectory::require_active(tx.tables(), org)?;
            Some(org)
        };

        let now = tx.now();
        let patient = Patient {
            id: PatientId::new(),
            organization_id,
            name,
            national_id,
            status: PatientStatus::Active,
            is_onboarded: false,
            current_trip_id: None,
            created_at: now,
            updated_at: now,
        };
        tx.tables_mut().patients.insert(patient.id, patient.clone());
        tx.audit(principal, audit_actions::PATIENT_REGISTER, patient.id);
        Ok(patient)
    }

    pub fn get(tables: &Tables, id: PatientId) -> CoreResult<&Patient> {
        tables
            .patients
            .get(&id)
            .ok_or_else(|| CoreError::not_found("patient", id))
    }

    pub fn access_path(
        tables: &Tables,
        principal: &Principal,
        patient: &Patient,
    ) -> Option<PatientAccessPath> {
        let current_trip_accessible = patient
            .current_trip_id
            .and_then(|trip| TripLifecycle::trip_facts(tables, trip).ok())
            .is_some_and(|facts| can_access(principal, &facts));
        let facts = PatientFacts {
            owner_organization_id: patient.organization_id,
            current_trip_accessible,
        };
        resolve_patient_access(principal, &facts)
    }

    pub fn get_visible<'t>(
        tables: &'t Tables,
        principal: &Principal,
        id: PatientId,
    ) -> CoreResult<&'t Patient> {
        let patient = Self::get(tables, id)?;
        match Self::access_path(tables, principal, patient) {
            Some(_) => Ok(patient),
            None => Err(CoreError::Forbidden(format!(
                "user {} cannot see patient {id}",
                principal.user_id
            ))),
        }
    }

    pub fn list_visible(tables: &Tables, principal: &Principal) -> Vec<Patient> {
        tables
            .patients
            .values()
            .filter(|p| Self::access_path(tables, principal, p).is_some())
            .cloned()
            .collect()
    }

    pub(crate) fn deactivate(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        id: PatientId,
    ) -> CoreResult<Patient> {
        let patient = Self::get(tx.tables(), id)?;
        let allowed = match patient.organization_id {
            Some(org) => principal.administers(org),
            None => principal.is_superadmin(),
        };
        if !allowed {
            return Err(CoreError::Forbidden(format!(
                "user {} cannot deactivate patient {id}",
                principal.user_id
            )));
        }
        if patient.is_onboarded {
            return Err(CoreError::Conflict(format!(
                "patient {id} is on an active trip"
            )));
        }
        if patient.status == PatientStatus::Inactive {
            return Err(CoreError::Conflict(format!(
                "patient {id} is already inactive"
            )));
        }

        let patient = Self::update(tx, id, |p| p.status = PatientStatus::Inactive)?;
        tx.audit(principal, audit_actions::PATIENT_DEACTIVATE, id);
        Ok(patient)
    }

    /// Point the patient at its non-terminal trip, or clear the pointer with `None`.
    pub(crate) fn set_current_trip(
        tx: &mut Transaction<'_>,
        id: PatientId,
        trip: Option<TripId>,
    ) -> CoreResult<Patient> {
        Self::update(tx, id, |p| {
            p.is_onboarded = trip.is_some();
            p.current_trip_id = trip;
        })
    }

    fn update(
        tx: &mut Transaction<'_>,
        id: PatientId,
        apply: impl FnOnce(&mut Patient),
    ) -> CoreResult<Patient> {
        let now = tx.now();
        let patient = tx
            .tables_mut()
            .patients
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("patient", id))?;
        apply(patient);
        patient.updated_at = now;
        Ok(patient.clone())
    }
}
