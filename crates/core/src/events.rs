//! Domain events and audit records, and the best-effort sinks that receive them.
//!
//! Both kinds of record are queued on the [`Transaction`](crate::store::Transaction) while a unit
//! of work runs and are handed to the sinks only after the store has committed. Sink failures
//! are logged and swallowed: they never roll back or fail the caller's operation.

use crate::principal::Principal;
use crate::repositories::partnerships::RequestStatus;
use crate::repositories::vehicles::VehicleStatus;
use chrono::{DateTime, Utc};
use medtrip_ids::{
    AssignmentId, CollaborationRequestId, DataEntryId, OrganizationId, PartnershipId, PatientId,
    TripId, UserId, VehicleId,
};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ============================================================================
// RECORDS
// ============================================================================

/// Fire-and-forget notification for downstream fan-out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Onboarded {
        trip_id: TripId,
        patient_id: PatientId,
        vehicle_id: VehicleId,
        organization_id: OrganizationId,
    },
    TransitStarted {
        trip_id: TripId,
        vehicle_id: VehicleId,
    },
    TripEntryAdded {
        trip_id: TripId,
        entry_id: DataEntryId,
    },
    DestinationChanged {
        trip_id: TripId,
        destination_organization_id: OrganizationId,
    },
    Offboarded {
        trip_id: TripId,
        patient_id: PatientId,
        vehicle_id: VehicleId,
    },
    Cancelled {
        trip_id: TripId,
        patient_id: PatientId,
        vehicle_id: VehicleId,
    },
    AssignmentCreated {
        assignment_id: AssignmentId,
        vehicle_id: VehicleId,
        user_id: UserId,
        assigning_organization_id: OrganizationId,
    },
    AssignmentRemoved {
        assignment_id: AssignmentId,
        vehicle_id: VehicleId,
        user_id: UserId,
    },
    CollaborationRequested {
        request_id: CollaborationRequestId,
        hospital_id: OrganizationId,
        fleet_id: OrganizationId,
    },
    CollaborationResolved {
        request_id: CollaborationRequestId,
        status: RequestStatus,
    },
    PartnershipActivated {
        partnership_id: PartnershipId,
        fleet_id: OrganizationId,
        hospital_id: OrganizationId,
    },
    PartnershipDeactivated {
        partnership_id: PartnershipId,
        fleet_id: OrganizationId,
        hospital_id: OrganizationId,
    },
    VehicleApproved {
        vehicle_id: VehicleId,
    },
    VehicleStatusChanged {
        vehicle_id: VehicleId,
        status: VehicleStatus,
    },
    UserSuspended {
        user_id: UserId,
    },
}

impl DomainEvent {
    /// Short name used in logs and by subscribers that route on event type.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::Onboarded { .. } => "onboarded",
            DomainEvent::TransitStarted { .. } => "transit_started",
            DomainEvent::TripEntryAdded { .. } => "trip_entry_added",
            DomainEvent::DestinationChanged { .. } => "destination_changed",
            DomainEvent::Offboarded { .. } => "offboarded",
            DomainEvent::Cancelled { .. } => "cancelled",
            DomainEvent::AssignmentCreated { .. } => "assignment_created",
            DomainEvent::AssignmentRemoved { .. } => "assignment_removed",
            DomainEvent::CollaborationRequested { .. } => "collaboration_requested",
            DomainEvent::CollaborationResolved { .. } => "collaboration_resolved",
            DomainEvent::PartnershipActivated { .. } => "partnership_activated",
            DomainEvent::PartnershipDeactivated { .. } => "partnership_deactivated",
            DomainEvent::VehicleApproved { .. } => "vehicle_approved",
            DomainEvent::VehicleStatusChanged { .. } => "vehicle_status_changed",
            DomainEvent::UserSuspended { .. } => "user_suspended",
        }
    }
}

/// Append-only who-did-what record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub actor: UserId,
    pub actor_organization_id: Option<OrganizationId>,
    pub action: String,
    pub target: String,
}

impl AuditRecord {
    pub fn new(
        at: DateTime<Utc>,
        actor: &Principal,
        action: &str,
        target: impl ToString,
    ) -> Self {
        Self {
            at,
            actor: actor.user_id,
            actor_organization_id: actor.organization_id,
            action: action.to_string(),
            target: target.to_string(),
        }
    }
}

// ============================================================================
// SINKS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Receives committed domain events for notification / real-time delivery.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &DomainEvent) -> Result<(), SinkError>;
}

/// Receives committed audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<(), SinkError>;
}

/// Deliver events one by one, logging and skipping any the sink refuses.
pub fn publish_best_effort(sink: &dyn EventSink, events: &[DomainEvent]) {
    for event in events {
        if let Err(e) = sink.publish(event) {
            tracing::warn!(event = event.name(), error = %e, "event sink rejected event");
        }
    }
}

/// Deliver audit records one by one, logging and skipping any the sink refuses.
pub fn record_best_effort(sink: &dyn AuditSink, records: &[AuditRecord]) {
    for record in records {
        if let Err(e) = sink.record(record) {
            tracing::warn!(action = %record.action, error = %e, "audit sink rejected record");
        }
    }
}

/// Logs events through `tracing`; the default when no transport is wired up.
#[derive(Clone, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &DomainEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(event = event.name(), %payload, "domain event");
        Ok(())
    }
}

/// Collects events in memory so callers and tests can inspect what was published.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event published so far.
    pub fn events(&self) -> Vec<DomainEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::name).collect()
    }
}

impl EventSink for MemoryEventSink {
    fn publish(&self, event: &DomainEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .map_err(|_| SinkError::Unavailable("event buffer lock poisoned".into()))?
            .push(event.clone());
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), SinkError> {
        tracing::info!(
            actor = %record.actor,
            action = %record.action,
            target = %record.target,
            "audit"
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a local file.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditSink {
    /// Opens (creating if needed) the audit log for appending.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self
            .file
            .lock()
            .map_err(|_| SinkError::Unavailable("audit log lock poisoned".into()))?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}
