//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the service as an
//! `Arc<CoreConfig>`. Nothing in the engine reads environment variables during request handling.

use crate::constants::DEFAULT_MAX_TRIP_ENTRIES;
use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_file: Option<PathBuf>,
    audit_log: Option<PathBuf>,
    max_trip_entries: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if `max_trip_entries` is zero or if either path
    /// points at an existing directory.
    pub fn new(
        data_file: Option<PathBuf>,
        audit_log: Option<PathBuf>,
        max_trip_entries: usize,
    ) -> CoreResult<Self> {
        if max_trip_entries == 0 {
            return Err(CoreError::InvalidInput(
                "max_trip_entries must be at least 1".into(),
            ));
        }
        for (label, path) in [("data file", &data_file), ("audit log", &audit_log)] {
            if let Some(path) = path {
                if path.is_dir() {
                    return Err(CoreError::InvalidInput(format!(
                        "{label} path is a directory: {}",
                        path.display()
                    )));
                }
            }
        }

        Ok(Self {
            data_file,
            audit_log,
            max_trip_entries,
        })
    }

    /// Purely in-memory configuration with defaults; used by tests and the CLI dry runs.
    pub fn in_memory() -> Self {
        Self {
            data_file: None,
            audit_log: None,
            max_trip_entries: DEFAULT_MAX_TRIP_ENTRIES,
        }
    }

    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    pub fn audit_log(&self) -> Option<&Path> {
        self.audit_log.as_deref()
    }

    pub fn max_trip_entries(&self) -> usize {
        self.max_trip_entries
    }
}

/// Parse the per-trip entry cap from an optional string value.
///
/// `None` or blank input yields [`DEFAULT_MAX_TRIP_ENTRIES`].
pub fn max_trip_entries_from_env_value(value: Option<String>) -> CoreResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_MAX_TRIP_ENTRIES),
        Some(v) => v.parse::<usize>().map_err(|e| {
            CoreError::InvalidInput(format!("MEDTRIP_MAX_TRIP_ENTRIES is not a number: {e}"))
        }),
    }
}

/// Turn an optional environment value into a path, treating blank values as unset.
pub fn path_from_env_value(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
