//! # MedTrip Core
//!
//! Trip lifecycle and cross-organization access control for emergency transport.
//!
//! Hospitals and ambulance fleets are independent tenants. This crate decides when an
//! ambulance may be claimed for a trip, when a patient may be onboarded or offboarded, who
//! crews which vehicle, and who may see or change any of that when the resource spans two
//! organizations joined by a partnership.
//!
//! - [`service::TransportService`] is the caller-facing facade
//! - [`access`] holds the pure authorisation rules
//! - [`repositories`] holds one registry per entity
//! - [`store`] provides the transactional [`store::Store`] and its in-memory implementation
//! - [`events`] defines domain events, audit records and their best-effort sinks
//!
//! **No transport concerns**: HTTP routing, credential checks and process setup live in
//! `api-rest` and the binaries.

pub mod access;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod principal;
pub mod repositories;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use principal::Principal;
pub use service::TransportService;
pub use store::{MemoryStore, Store};

pub use medtrip_ids as ids;
pub use medtrip_types as types;
