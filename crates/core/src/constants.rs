//! Constants used throughout the core crate.

/// Default cap on free-form data entries attached to a single trip.
pub const DEFAULT_MAX_TRIP_ENTRIES: usize = 500;

/// Suffix appended to the data file while a new snapshot is being written.
pub const DATA_FILE_STAGING_SUFFIX: &str = "staging";

/// Suffix of the sidecar file whose exclusive lock marks the data file as owned by one process.
pub const DATA_FILE_LOCK_SUFFIX: &str = "lock";

/// Audit action names.
pub mod audit_actions {
    pub const ORGANIZATION_CREATE: &str = "organization.create";
    pub const ORGANIZATION_STATUS: &str = "organization.status";
    pub const USER_REGISTER: &str = "user.register";
    pub const USER_SUSPEND: &str = "user.suspend";
    pub const USER_REINSTATE: &str = "user.reinstate";
    pub const VEHICLE_REGISTER: &str = "vehicle.register";
    pub const VEHICLE_APPROVE: &str = "vehicle.approve";
    pub const VEHICLE_STATUS: &str = "vehicle.status";
    pub const ASSIGNMENT_CREATE: &str = "assignment.create";
    pub const ASSIGNMENT_REMOVE: &str = "assignment.remove";
    pub const COLLABORATION_REQUEST: &str = "collaboration.request";
    pub const COLLABORATION_ACCEPT: &str = "collaboration.accept";
    pub const COLLABORATION_REJECT: &str = "collaboration.reject";
    pub const COLLABORATION_CANCEL: &str = "collaboration.cancel";
    pub const PARTNERSHIP_ENSURE: &str = "partnership.ensure";
    pub const PARTNERSHIP_DEACTIVATE: &str = "partnership.deactivate";
    pub const PATIENT_REGISTER: &str = "patient.register";
    pub const PATIENT_DEACTIVATE: &str = "patient.deactivate";
    pub const TRIP_ONBOARD: &str = "trip.onboard";
    pub const TRIP_TRANSIT: &str = "trip.transit";
    pub const TRIP_ENTRY: &str = "trip.entry";
    pub const TRIP_DESTINATION: &str = "trip.destination";
    pub const TRIP_OFFBOARD: &str = "trip.offboard";
    pub const TRIP_CANCEL: &str = "trip.cancel";
}
