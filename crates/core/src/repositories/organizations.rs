//! Organization Directory.
//!
//! Identity, type and status of every tenant. Type is fixed at creation; re-typing an
//! organization is an operational override outside this engine.

use crate::constants::audit_actions;
use crate::error::{CoreError, CoreResult};
use crate::principal::Principal;
use crate::store::{Tables, Transaction};
use chrono::{DateTime, Utc};
use medtrip_ids::OrganizationId;
use medtrip_types::{NonEmptyText, OrganizationType};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    Active,
    Suspended,
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: NonEmptyText,
    pub organization_type: OrganizationType,
    pub status: OrganizationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Namespacing type for organization operations.
pub struct OrganizationDirectory;

impl OrganizationDirectory {
    pub(crate) fn create(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        name: NonEmptyText,
        organization_type: OrganizationType,
    ) -> CoreResult<Organization> {
        principal.require_superadmin("create organizations")?;

        let now = tx.now();
        let org = Organization {
            id: OrganizationId::new(),
            name,
            organization_type,
            status: OrganizationStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tx.tables_mut().organizations.insert(org.id, org.clone());
        tx.audit(principal, audit_actions::ORGANIZATION_CREATE, org.id);

        tracing::info!(organization = %org.id, kind = %organization_type, "organization created");
        Ok(org)
    }

    pub fn get(tables: &Tables, id: OrganizationId) -> CoreResult<&Organization> {
        tables
            .organizations
            .get(&id)
            .ok_or_else(|| CoreError::not_found("organization", id))
    }

    pub fn list(tables: &Tables) -> Vec<Organization> {
        tables.organizations.values().cloned().collect()
    }

    /// Look up an organization that must be `active` and of `expected` type.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if it does not exist
    /// - [`CoreError::InvalidInput`] if it is of another type
    /// - [`CoreError::InvalidState`] if it is suspended or inactive
    pub fn require_active_of_type(
        tables: &Tables,
        id: OrganizationId,
        expected: OrganizationType,
    ) -> CoreResult<&Organization> {
        let org = Self::require_active(tables, id)?;
        if org.organization_type != expected {
            return Err(CoreError::InvalidInput(format!(
                "organization {id} is a {}, expected a {expected}",
                org.organization_type
            )));
        }
        Ok(org)
    }

    pub fn require_active(tables: &Tables, id: OrganizationId) -> CoreResult<&Organization> {
        let org = Self::get(tables, id)?;
        match org.status {
            OrganizationStatus::Active => Ok(org),
            OrganizationStatus::Suspended | OrganizationStatus::Inactive => Err(
                CoreError::InvalidState(format!("organization {id} is not active")),
            ),
        }
    }

    pub(crate) fn set_status(
        tx: &mut Transaction<'_>,
        principal: &Principal,
        id: OrganizationId,
        status: OrganizationStatus,
    ) -> CoreResult<Organization> {
        principal.require_superadmin("change organization status")?;

        let now = tx.now();
        let org = tx
            .tables_mut()
            .organizations
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("organization", id))?;
        org.status = status;
        org.updated_at = now;
        let org = org.clone();

        tx.audit(principal, audit_actions::ORGANIZATION_STATUS, id);
        tracing::info!(organization = %id, ?status, "organization status changed");
        Ok(org)
    }
}
