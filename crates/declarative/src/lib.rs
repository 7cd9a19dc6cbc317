//! # Declarative
//!
//! Declarative reconciliation of resources behind a REST API.
//!
//! This crate provides the building blocks for converging a remote service to
//! a locally declared configuration, without knowing anything about the
//! service itself.
//!
//! ## Core Concepts
//!
//! - **Mapping table**: a slice of [`Attr`] rows binding local attribute names
//!   to remote keys or dynamic fields, with validation and translation rules
//! - **Field codec**: translation of schema-driven dynamic fields, whose select
//!   options are described by the remote itself
//! - **Registry**: the supported types of a polymorphic category, looked up by
//!   local type name or remote implementation
//! - **Reconciler**: name-keyed create/update/delete over a [`Collection`]
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{Fallback, Kind, Lookups, create_attrs, normalize, top};
//!
//! let attrs = [top("enable", "enable", Kind::Bool, Fallback::Bool(true))];
//! let local = normalize(&attrs, &serde_json::Map::new(), "settings.x", &[])?;
//! let remote = create_attrs("settings.x", &attrs, &local, &Lookups::new())?;
//! assert_eq!(remote.attrs["enable"], true);
//! ```
//!
//! The [`Reconcile`] trait keeps the crate free of any transport: callers
//! implement it over their own API client.

pub mod display;
pub mod error;
pub mod field;
pub mod mapping;
pub mod reconcile;
pub mod schema;
pub mod types;

// Re-export main types at crate root
pub use error::{Error, ErrorCategory, Result, quoted_list};
pub use field::{Field, SelectOption, fields_of, find_field, indexer_urls};
pub use mapping::{
    Attr, Choices, Fallback, Kind, Lookups, Place, Raw, RemoteAttrs, create_attrs, decode,
    field, get_path, local, normalize, set_path, top, update_attrs,
};
pub use reconcile::{Collection, Reconcile, converge, definition_tree, prune};
pub use schema::{AttrsFn, CheckFn, Registry, TypeSpec, get_schema};
pub use types::{Outcome, Summary, Version};
