//! Closed role and organization-type sets.
//!
//! Authorization code matches on these exhaustively; adding a variant forces every rule that
//! cares about it to be revisited at compile time.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Error returned when a role or organization type string is not recognised.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// The role a user holds inside their organization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator; passes every organization-relative check.
    Superadmin,
    /// Organization administrator.
    Admin,
    Doctor,
    Paramedic,
    Driver,
    Staff,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Superadmin,
        Role::Admin,
        Role::Doctor,
        Role::Paramedic,
        Role::Driver,
        Role::Staff,
    ];

    /// True for roles that may be attached to a vehicle as crew.
    pub fn is_clinical(self) -> bool {
        match self {
            Role::Doctor | Role::Paramedic => true,
            Role::Superadmin | Role::Admin | Role::Driver | Role::Staff => false,
        }
    }

    pub fn is_superadmin(self) -> bool {
        matches!(self, Role::Superadmin)
    }

    /// True for roles allowed to create or remove crew assignments and manage users.
    pub fn can_manage_crew(self) -> bool {
        match self {
            Role::Superadmin | Role::Admin => true,
            Role::Doctor | Role::Paramedic | Role::Driver | Role::Staff => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Paramedic => "paramedic",
            Role::Driver => "driver",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| ParseEnumError {
                kind: "role",
                value: s.to_string(),
            })
    }
}

/// The kind of tenant an organization is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Hospital,
    /// Ambulance operator owning vehicles.
    Fleet,
    /// The platform operator's own tenant.
    System,
}

impl OrganizationType {
    pub const ALL: [OrganizationType; 3] = [
        OrganizationType::Hospital,
        OrganizationType::Fleet,
        OrganizationType::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrganizationType::Hospital => "hospital",
            OrganizationType::Fleet => "fleet",
            OrganizationType::System => "system",
        }
    }
}

impl fmt::Display for OrganizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrganizationType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrganizationType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| ParseEnumError {
                kind: "organization type",
                value: s.to_string(),
            })
    }
}
