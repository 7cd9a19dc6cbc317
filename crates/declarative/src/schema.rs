//! Type registry and remote schema templates.
//!
//! Each polymorphic category (applications, proxies, download clients,
//! notifications) has a fixed set of supported types. A [`TypeSpec`] names a
//! type locally, ties it to the remote `implementation` identifier, and
//! provides its mapping table. Remote schema templates, fetched from the
//! category's `/schema` endpoint, supply the full default payload a new
//! resource is built from.

use crate::error::{Error, Result, quoted_list};
use crate::mapping::Attr;
use crate::types::Version;
use serde_json::{Map, Value};

/// Builds the mapping table of a type for a given remote version.
pub type AttrsFn = fn(Option<&Version>) -> Vec<Attr>;

/// Cross-attribute check run on the normalized local form.
pub type CheckFn = fn(&Map<String, Value>) -> std::result::Result<(), String>;

/// A supported resource type.
#[derive(Debug, Clone, Copy)]
pub struct TypeSpec {
    /// Canonical local type name.
    pub name: &'static str,
    /// Other accepted local type names.
    pub aliases: &'static [&'static str],
    /// Remote `implementation` identifier.
    pub implementation: &'static str,
    pub attrs: AttrsFn,
    pub check: Option<CheckFn>,
}

impl TypeSpec {
    /// Whether `name` refers to this type, ignoring case.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// The supported types of one category.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    /// Category name used in error messages, e.g. `download client`.
    pub category: &'static str,
    pub types: &'static [TypeSpec],
}

impl Registry {
    /// Find a type by local name or alias.
    pub fn by_type(&self, name: &str) -> Result<&'static TypeSpec> {
        self.types
            .iter()
            .find(|spec| spec.matches(name))
            .ok_or_else(|| Error::UnsupportedType {
                category: self.category.to_string(),
                value: name.to_string(),
                expected: quoted_list(self.type_names()),
            })
    }

    /// Find a type by remote implementation identifier, ignoring case.
    pub fn by_implementation(&self, implementation: &str) -> Option<&'static TypeSpec> {
        self.types
            .iter()
            .find(|spec| spec.implementation.eq_ignore_ascii_case(implementation))
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.types.iter().map(|spec| spec.name).collect()
    }
}

/// Find the schema template whose `key` matches `wanted`, ignoring case.
///
/// The template is returned with the `strip` keys removed, ready to be used
/// as the base of a create payload.
pub fn get_schema(
    schemas: &[Value],
    what: &str,
    key: &str,
    wanted: &str,
    strip: &[&str],
) -> Result<Map<String, Value>> {
    let identifier = |schema: &Value| {
        schema
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    schemas
        .iter()
        .find(|schema| identifier(schema).is_some_and(|id| id.eq_ignore_ascii_case(wanted)))
        .and_then(Value::as_object)
        .map(|schema| {
            schema
                .iter()
                .filter(|(k, _)| !strip.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .ok_or_else(|| Error::SchemaMismatch {
            what: what.to_string(),
            value: wanted.to_string(),
            expected: quoted_list(
                schemas
                    .iter()
                    .filter_map(identifier)
                    .map(|id| id.to_lowercase()),
            ),
        })
}
