//! Registries.
//!
//! Each module owns one table of [`crate::store::Tables`]. Queries take `&Tables`; mutations
//! take the caller's [`crate::store::Transaction`] and are crate-private, so every write goes
//! through [`crate::service::TransportService`].

pub mod assignments;
pub mod organizations;
pub mod partnerships;
pub mod patients;
pub mod trips;
pub mod users;
pub mod vehicles;
