//! Validated primitives shared by the engine, the REST layer and the CLI.
//!
//! - [`NonEmptyText`] for names, labels and free-text fields that must carry content
//! - [`Role`] and [`OrganizationType`], the closed sets the authorization rules match on

mod roles;
mod text;

pub use roles::{OrganizationType, ParseEnumError, Role};
pub use text::{NonEmptyText, TextError, MAX_TEXT_LEN};
