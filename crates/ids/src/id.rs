//! Newtype identifiers generated by [`define_id!`].

use crate::{is_canonical, IdError, IdResult};
use std::{fmt, str::FromStr};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl $name {
            /// Allocates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID without validation.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parses an identifier that must already be in canonical form.
            pub fn parse(input: &str) -> IdResult<Self> {
                if !is_canonical(input) {
                    return Err(IdError::InvalidFormat {
                        kind: $kind,
                        input: input.to_string(),
                    });
                }
                Uuid::parse_str(input)
                    .map(Self)
                    .map_err(|_| IdError::InvalidFormat {
                        kind: $kind,
                        input: input.to_string(),
                    })
            }

            /// Returns the underlying UUID.
            pub fn uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        #[cfg(feature = "serde")]
        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        #[cfg(feature = "serde")]
        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_id!(
    /// Identifier of a tenant organization (hospital, fleet or system).
    OrganizationId,
    "organization"
);
define_id!(
    /// Identifier of a user account.
    UserId,
    "user"
);
define_id!(
    /// Identifier of an ambulance or other transport vehicle.
    VehicleId,
    "vehicle"
);
define_id!(
    /// Identifier of a patient record.
    PatientId,
    "patient"
);
define_id!(
    /// Identifier of a trip (transport session).
    TripId,
    "trip"
);
define_id!(AssignmentId, "assignment");
define_id!(PartnershipId, "partnership");
define_id!(CollaborationRequestId, "collaboration request");
define_id!(DataEntryId, "data entry");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_canonical_simple_hex() {
        let id = VehicleId::new();
        let rendered = id.to_string();
        assert_eq!(rendered.len(), 32);
        assert!(is_canonical(&rendered));
        assert_eq!(VehicleId::parse(&rendered).expect("canonical parses"), id);
    }

    #[test]
    fn parse_rejects_hyphenated_and_uppercase() {
        let uuid = Uuid::new_v4();
        let hyphenated = uuid.hyphenated().to_string();
        let upper = uuid.simple().to_string().to_uppercase();

        let err = TripId::parse(&hyphenated).expect_err("hyphenated form is rejected");
        assert!(matches!(err, IdError::InvalidFormat { kind: "trip", .. }));
        assert!(TripId::parse(&upper).is_err());
        assert!(TripId::parse("").is_err());
    }

    #[test]
    fn serde_uses_canonical_string() {
        let id = PatientId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id));

        let back: PatientId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);

        let bad = serde_json::from_str::<PatientId>("\"not-an-id\"");
        assert!(bad.is_err());
    }
}
