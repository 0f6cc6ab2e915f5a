//! The authenticated caller.
//!
//! A [`Principal`] is produced by the identity collaborator outside this crate and trusted as-is.
//! The engine never re-validates credentials; it only reasons about the role and organization
//! carried here.

use crate::error::{CoreError, CoreResult};
use medtrip_ids::{OrganizationId, UserId};
use medtrip_types::{OrganizationType, Role};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub organization_id: Option<OrganizationId>,
    pub organization_type: Option<OrganizationType>,
}

impl Principal {
    pub fn new(
        user_id: UserId,
        role: Role,
        organization_id: OrganizationId,
        organization_type: OrganizationType,
    ) -> Self {
        Self {
            user_id,
            role,
            organization_id: Some(organization_id),
            organization_type: Some(organization_type),
        }
    }

    /// A platform operator with no home organization.
    pub fn superadmin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Superadmin,
            organization_id: None,
            organization_type: None,
        }
    }

    pub fn is_superadmin(&self) -> bool {
        self.role.is_superadmin()
    }

    pub fn belongs_to(&self, organization_id: OrganizationId) -> bool {
        self.organization_id == Some(organization_id)
    }

    pub fn is_hospital(&self) -> bool {
        self.organization_type == Some(OrganizationType::Hospital)
    }

    pub fn is_fleet(&self) -> bool {
        self.organization_type == Some(OrganizationType::Fleet)
    }

    /// True when the principal administers `organization_id` (or is a superadmin).
    pub fn administers(&self, organization_id: OrganizationId) -> bool {
        self.is_superadmin() || (self.role == Role::Admin && self.belongs_to(organization_id))
    }

    /// Returns the principal's organization id and type, or `Forbidden` when it has none.
    pub fn require_organization(&self) -> CoreResult<(OrganizationId, OrganizationType)> {
        match (self.organization_id, self.organization_type) {
            (Some(id), Some(kind)) => Ok((id, kind)),
            _ => Err(CoreError::Forbidden(format!(
                "user {} does not act on behalf of an organization",
                self.user_id
            ))),
        }
    }

    pub fn require_superadmin(&self, action: &str) -> CoreResult<()> {
        if self.is_superadmin() {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "only a superadmin may {action}"
            )))
        }
    }
}
