//! Transactional store.
//!
//! The engine talks to persistence through the [`Store`] trait: a read view over [`Tables`] and a
//! write path that runs a unit of work inside a [`Transaction`]. [`MemoryStore`] is the bundled
//! implementation. It serialises writers behind one exclusive lock, runs each unit of work
//! against a staged copy of the tables and installs that copy only when the closure returns
//! `Ok`. Returning `Err` drops the copy, which is the rollback.
//!
//! When a data file is configured the staged copy is written to disk (temp file + rename)
//! before it is installed, so a failed snapshot write also rolls the transaction back.
//!
//! A file-backed store holds an exclusive advisory lock on a sidecar `<data file>.lock` for its
//! whole lifetime. The in-memory tables are the only copy a writer consults, so a second
//! process writing the same file would silently revert the first; opening a locked file fails
//! with [`CoreError::Conflict`] instead. The lock is released when the store is dropped or the
//! process exits.
//!
//! Every commit clones all tables and rewrites the full snapshot, so write cost grows with the
//! amount of retained history.

use crate::constants::{DATA_FILE_LOCK_SUFFIX, DATA_FILE_STAGING_SUFFIX};
use crate::error::{CoreError, CoreResult};
use crate::events::{AuditRecord, DomainEvent};
use crate::principal::Principal;
use crate::repositories::assignments::Assignment;
use crate::repositories::organizations::Organization;
use crate::repositories::partnerships::{CollaborationRequest, Partnership};
use crate::repositories::patients::Patient;
use crate::repositories::trips::TripTable;
use crate::repositories::users::User;
use crate::repositories::vehicles::Vehicle;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use medtrip_ids::{
    AssignmentId, CollaborationRequestId, OrganizationId, PartnershipId, PatientId, UserId,
    VehicleId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

// ============================================================================
// TABLES
// ============================================================================

/// Every row the engine owns, one map per entity.
///
/// Each map is written only by the registry module that owns the entity; other modules go
/// through that registry's query functions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Tables {
    pub(crate) organizations: BTreeMap<OrganizationId, Organization>,
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) vehicles: BTreeMap<VehicleId, Vehicle>,
    pub(crate) patients: BTreeMap<PatientId, Patient>,
    pub(crate) partnerships: BTreeMap<PartnershipId, Partnership>,
    pub(crate) collaboration_requests: BTreeMap<CollaborationRequestId, CollaborationRequest>,
    pub(crate) assignments: BTreeMap<AssignmentId, Assignment>,
    pub(crate) trips: TripTable,
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// A unit of work in progress.
///
/// Holds the staged tables plus the events and audit records that will be released to the
/// sinks if, and only if, the transaction commits.
pub struct Transaction<'a> {
    tables: &'a mut Tables,
    now: DateTime<Utc>,
    events: Vec<DomainEvent>,
    audit: Vec<AuditRecord>,
}

impl<'a> Transaction<'a> {
    fn new(tables: &'a mut Tables, now: DateTime<Utc>) -> Self {
        Self {
            tables,
            now,
            events: Vec::new(),
            audit: Vec::new(),
        }
    }

    /// Timestamp shared by every write in this transaction.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn tables(&self) -> &Tables {
        self.tables
    }

    pub(crate) fn tables_mut(&mut self) -> &mut Tables {
        self.tables
    }

    pub(crate) fn emit(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub(crate) fn audit(&mut self, actor: &Principal, action: &str, target: impl ToString) {
        self.audit
            .push(AuditRecord::new(self.now, actor, action, target));
    }
}

/// The result of a committed write plus everything it queued for the sinks.
#[derive(Clone, Debug)]
pub struct Committed<T> {
    pub value: T,
    pub events: Vec<DomainEvent>,
    pub audit: Vec<AuditRecord>,
}

impl<T> Committed<T> {
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.iter().map(DomainEvent::name).collect()
    }
}

// ============================================================================
// STORE
// ============================================================================

pub trait Store: Send + Sync {
    /// Run a read-only query. Takes no write lock and may observe results that an in-flight
    /// writer is about to replace.
    fn read<R>(&self, f: impl FnOnce(&Tables) -> CoreResult<R>) -> CoreResult<R>;

    /// Run a unit of work atomically: either every write in `f` lands, or none does.
    fn write<R>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> CoreResult<R>,
    ) -> CoreResult<Committed<R>>;
}

/// In-process store with optional JSON snapshot persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    data_file: Option<PathBuf>,
    /// Held open so the exclusive lock on the sidecar file lasts as long as the store.
    lock: Option<File>,
}

impl MemoryStore {
    /// Empty store that lives only in memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by `data_file`, loading it if it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conflict`] if another store (in this or another process) already
    /// has the file open, and [`CoreError::Internal`] if the file cannot be read or parsed, or
    /// if its trips violate the one-active-trip-per-vehicle/patient constraint.
    pub fn open(data_file: &Path) -> CoreResult<Self> {
        let lock = Self::lock_data_file(data_file)?;

        let tables = if data_file.exists() {
            let raw = fs::read(data_file).map_err(|e| {
                CoreError::Internal(format!(
                    "failed to read data file {}: {e}",
                    data_file.display()
                ))
            })?;
            let mut tables: Tables = serde_json::from_slice(&raw).map_err(|e| {
                CoreError::Internal(format!(
                    "failed to parse data file {}: {e}",
                    data_file.display()
                ))
            })?;
            tables.trips.rebuild_indexes()?;
            tables
        } else {
            Tables::default()
        };

        tracing::info!(path = %data_file.display(), "opened data file");

        Ok(Self {
            tables: RwLock::new(tables),
            data_file: Some(data_file.to_path_buf()),
            lock: Some(lock),
        })
    }

    fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("medtrip-data");
        path.with_file_name(format!("{file_name}.{suffix}"))
    }

    fn lock_data_file(data_file: &Path) -> CoreResult<File> {
        if let Some(parent) = data_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                CoreError::Internal(format!("failed to create data directory: {e}"))
            })?;
        }

        let lock_path = Self::sidecar_path(data_file, DATA_FILE_LOCK_SUFFIX);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| {
                CoreError::Internal(format!(
                    "failed to open lock file {}: {e}",
                    lock_path.display()
                ))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                tracing::warn!(path = %data_file.display(), "data file already in use");
                Err(CoreError::Conflict(format!(
                    "data file {} is in use by another process",
                    data_file.display()
                )))
            }
            Err(e) => Err(CoreError::Internal(format!(
                "failed to lock {}: {e}",
                lock_path.display()
            ))),
        }
    }

    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    fn persist(path: &Path, tables: &Tables) -> CoreResult<()> {
        let bytes = serde_json::to_vec_pretty(tables)
            .map_err(|e| CoreError::Internal(format!("failed to serialize tables: {e}")))?;

        let staging = Self::sidecar_path(path, DATA_FILE_STAGING_SUFFIX);
        fs::write(&staging, bytes)
            .map_err(|e| CoreError::Internal(format!("failed to write data file: {e}")))?;
        fs::rename(&staging, path)
            .map_err(|e| CoreError::Internal(format!("failed to replace data file: {e}")))?;
        Ok(())
    }
}

impl Store for MemoryStore {
    fn read<R>(&self, f: impl FnOnce(&Tables) -> CoreResult<R>) -> CoreResult<R> {
        let guard = self
            .tables
            .read()
            .map_err(|_| CoreError::Internal("store lock poisoned".into()))?;
        f(&guard)
    }

    fn write<R>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> CoreResult<R>,
    ) -> CoreResult<Committed<R>> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| CoreError::Internal("store lock poisoned".into()))?;

        let mut staged = guard.clone();
        let (value, events, audit) = {
            let mut tx = Transaction::new(&mut staged, Utc::now());
            match f(&mut tx) {
                Ok(value) => (value, tx.events, tx.audit),
                Err(e) => {
                    tracing::debug!(error = %e, "transaction rolled back");
                    return Err(e);
                }
            }
        };

        if let Some(path) = &self.data_file {
            Self::persist(path, &staged)?;
        }
        *guard = staged;

        Ok(Committed {
            value,
            events,
            audit,
        })
    }
}
