//! Remote mapping tables.
//!
//! An [`Attr`] binds one local attribute to one remote attribute: where it
//! lives on the remote resource ([`Place`]), how its value is translated
//! ([`Kind`]), and what it defaults to locally ([`Fallback`]). A resource type
//! is described by a slice of attrs, and the functions here use that table to
//! move values in all three directions:
//!
//! - [`normalize`]: validate a user-authored definition into canonical form
//! - [`decode`]: read a remote resource into the same canonical form
//! - [`create_attrs`] / [`update_attrs`]: encode the local form for writing,
//!   logging what is set or changed along the way
//!
//! Canonical form makes comparison a plain equality check: sets are sorted
//! and deduplicated, choices use their table name, and empty optional
//! strings are null.
//!
//! Local names may be dotted (`notification_triggers.on_health_issue`), in
//! which case the value lives in a nested table.

use crate::display::{masked, repr};
use crate::error::{Error, Result, quoted_list};
use crate::field::{Field, find_field};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

// ============================================================================
// Table types
// ============================================================================

/// Remote representation of a named choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Raw {
    Int(i64),
    Str(&'static str),
}

impl Raw {
    pub fn to_value(self) -> Value {
        match self {
            Raw::Int(i) => Value::from(i),
            Raw::Str(s) => Value::from(s),
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Raw::Int(i) => value.as_i64() == Some(i),
            Raw::Str(s) => value.as_str() == Some(s),
        }
    }
}

/// Name to remote value table of a choice attribute.
pub type Choices = &'static [(&'static str, Raw)];

/// How an attribute value is validated and translated.
#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Bool,
    /// Integer within an inclusive range.
    Int { min: i64, max: i64 },
    /// Optional integer with a lower bound. Null remotely when unset.
    OptInt { min: i64 },
    /// Non-empty string.
    Str,
    /// String that may be unset. Empty string remotely when unset.
    OptStr,
    /// Non-empty credential, masked in logs.
    Secret,
    /// Credential that may be unset.
    OptSecret,
    /// One of a fixed set of named values.
    Choice(Choices),
    /// Set of named values, sent as a sorted list.
    ChoiceSet(Choices),
    /// Named choice stored remotely as a bool: `on` is true, anything else false.
    ChoiceFlag {
        on: &'static str,
        off: &'static str,
        choices: Choices,
    },
    /// Ordered list of non-empty strings.
    StrList,
    /// Set of strings, sent as a sorted list.
    StrSet,
    /// Set of strings, sent as a sorted comma-separated string.
    CommaSet,
    /// Name resolved to a remote ID through a lookup table.
    Id(&'static str),
    /// Set of names resolved to remote IDs.
    IdSet(&'static str),
    /// Like [`Kind::IdSet`], but names match case-insensitively.
    NameSet(&'static str),
    /// Table of client category to a set of category names, sent as a list
    /// of `{clientCategory, categories}` objects.
    CategoryMappings(&'static str),
}

impl Kind {
    pub fn is_secret(&self) -> bool {
        matches!(self, Kind::Secret | Kind::OptSecret)
    }
}

/// Where an attribute lives on the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    /// Top-level key of the resource object.
    Top,
    /// Entry of the resource's `fields` array.
    Field,
    /// Not sent to the remote at all.
    Local,
}

/// Local default of an attribute.
#[derive(Debug, Clone, Copy)]
pub enum Fallback {
    Required,
    Null,
    Bool(bool),
    Int(i64),
    Str(&'static str),
    /// List of strings, for sets and lists alike.
    Strs(&'static [&'static str]),
    /// Empty list, set or table, depending on the kind.
    Empty,
}

/// One row of a remote mapping table.
#[derive(Debug, Clone, Copy)]
pub struct Attr {
    pub name: &'static str,
    pub remote: &'static str,
    pub place: Place,
    pub kind: Kind,
    pub fallback: Fallback,
}

/// Attribute stored as a top-level key of the remote resource.
pub const fn top(name: &'static str, remote: &'static str, kind: Kind, fallback: Fallback) -> Attr {
    Attr {
        name,
        remote,
        place: Place::Top,
        kind,
        fallback,
    }
}

/// Attribute stored in the remote resource's `fields` array.
pub const fn field(
    name: &'static str,
    remote: &'static str,
    kind: Kind,
    fallback: Fallback,
) -> Attr {
    Attr {
        name,
        remote,
        place: Place::Field,
        kind,
        fallback,
    }
}

/// Attribute that only exists in the local configuration.
pub const fn local(name: &'static str, kind: Kind, fallback: Fallback) -> Attr {
    Attr {
        name,
        remote: "",
        place: Place::Local,
        kind,
        fallback,
    }
}

// ============================================================================
// Lookup tables
// ============================================================================

/// Name to ID tables fetched from the remote, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    tables: IndexMap<String, IndexMap<String, i64>>,
}

impl Lookups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table.
    pub fn insert<I>(&mut self, table: &str, entries: I)
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        self.tables.insert(table.to_string(), entries.into_iter().collect());
    }

    #[must_use]
    pub fn with<I>(mut self, table: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        self.insert(table, entries);
        self
    }

    /// Resolve a name to its ID, preferring an exact match.
    pub fn id(&self, table: &str, name: &str) -> Result<i64> {
        let entries = self.tables.get(table);
        entries
            .and_then(|entries| {
                entries.get(name).copied().or_else(|| {
                    entries
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(name))
                        .map(|(_, id)| *id)
                })
            })
            .ok_or_else(|| Error::UnknownName {
                table: table.to_string(),
                name: name.to_string(),
            })
    }

    /// Resolve an ID back to its name.
    pub fn name(&self, table: &str, id: i64) -> Result<&str> {
        self.tables
            .get(table)
            .and_then(|entries| entries.iter().find(|(_, v)| **v == id))
            .map(|(k, _)| k.as_str())
            .ok_or_else(|| Error::UnknownId {
                table: table.to_string(),
                id,
            })
    }
}

// ============================================================================
// Dotted paths
// ============================================================================

/// Read a value at a dotted local path.
pub fn get_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        None => map.get(path),
        Some((head, rest)) => get_path(map.get(head)?.as_object()?, rest),
    }
}

/// Write a value at a dotted local path, creating tables as needed.
pub fn set_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Canonical choice key: case and `-`/`_` insensitive.
fn choice_key(s: &str) -> String {
    s.to_lowercase().replace('_', "-")
}

fn find_choice(choices: Choices, input: &Value) -> Option<&'static str> {
    if let Some(s) = input.as_str() {
        let key = choice_key(s);
        if let Some((name, _)) = choices.iter().find(|(name, _)| choice_key(name) == key) {
            return Some(*name);
        }
    }
    choices
        .iter()
        .find(|(_, raw)| raw.matches(input))
        .map(|(name, _)| *name)
}

fn choice_error(path: &str, choices: Choices, input: &Value) -> Error {
    Error::validation(
        path,
        format!(
            "invalid value {} (expected one of: {})",
            repr(input),
            quoted_list(choices.iter().map(|(name, _)| name))
        ),
    )
}

fn choice_order(choices: Choices, name: &str) -> usize {
    choices
        .iter()
        .position(|(n, _)| *n == name)
        .unwrap_or(usize::MAX)
}

fn string_items(path: &str, value: &Value, allow_empty: bool) -> Result<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::validation(path, "expected a list"))?;
    items
        .iter()
        .map(|item| match item.as_str() {
            Some(s) if allow_empty || !s.is_empty() => Ok(s.to_string()),
            Some(_) => Err(Error::validation(path, "list items must not be empty")),
            None => Err(Error::validation(
                path,
                format!("expected a string, got {}", repr(item)),
            )),
        })
        .collect()
}

fn sorted_set(items: impl IntoIterator<Item = String>) -> Value {
    let set: BTreeSet<String> = items.into_iter().collect();
    Value::Array(set.into_iter().map(Value::from).collect())
}

/// Validate one value and bring it into canonical form.
pub fn normalize_value(path: &str, kind: Kind, value: &Value) -> Result<Value> {
    match kind {
        Kind::Bool => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(Error::validation(
                path,
                format!("expected a boolean, got {}", repr(other)),
            )),
        },
        Kind::Int { min, max } => match value.as_i64() {
            Some(i) if (min..=max).contains(&i) => Ok(Value::from(i)),
            Some(i) => Err(Error::validation(
                path,
                format!("value {i} is out of range ({min}..={max})"),
            )),
            None => Err(Error::validation(
                path,
                format!("expected an integer, got {}", repr(value)),
            )),
        },
        Kind::OptInt { min } => match value {
            Value::Null => Ok(Value::Null),
            other => match other.as_i64() {
                Some(i) if i >= min => Ok(Value::from(i)),
                Some(i) => Err(Error::validation(
                    path,
                    format!("value {i} must be at least {min}"),
                )),
                None => Err(Error::validation(
                    path,
                    format!("expected an integer, got {}", repr(other)),
                )),
            },
        },
        Kind::Str | Kind::Secret => match value.as_str() {
            Some(s) if !s.is_empty() => Ok(value.clone()),
            Some(_) => Err(Error::validation(path, "value must not be empty")),
            None => Err(Error::validation(
                path,
                format!("expected a string, got {}", masked(value, kind.is_secret())),
            )),
        },
        Kind::OptStr | Kind::OptSecret => match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) if s.is_empty() => Ok(Value::Null),
            Value::String(_) => Ok(value.clone()),
            other => Err(Error::validation(
                path,
                format!("expected a string, got {}", masked(other, kind.is_secret())),
            )),
        },
        Kind::Choice(choices) | Kind::ChoiceFlag { choices, .. } => find_choice(choices, value)
            .map(Value::from)
            .ok_or_else(|| choice_error(path, choices, value)),
        Kind::ChoiceSet(choices) => {
            let items = value
                .as_array()
                .ok_or_else(|| Error::validation(path, "expected a list"))?;
            let mut names = items
                .iter()
                .map(|item| find_choice(choices, item).ok_or_else(|| choice_error(path, choices, item)))
                .collect::<Result<Vec<_>>>()?;
            names.sort_by_key(|name| choice_order(choices, name));
            names.dedup();
            Ok(Value::Array(names.into_iter().map(Value::from).collect()))
        }
        Kind::StrList => Ok(Value::Array(
            string_items(path, value, false)?
                .into_iter()
                .map(Value::from)
                .collect(),
        )),
        Kind::StrSet | Kind::CommaSet | Kind::IdSet(_) => {
            Ok(sorted_set(string_items(path, value, false)?))
        }
        Kind::NameSet(_) => Ok(sorted_set(
            string_items(path, value, false)?
                .into_iter()
                .map(|s| s.to_lowercase()),
        )),
        Kind::Id(_) => match value.as_str() {
            Some(s) if !s.is_empty() => Ok(value.clone()),
            _ => Err(Error::validation(
                path,
                format!("expected a name, got {}", repr(value)),
            )),
        },
        Kind::CategoryMappings(_) => {
            let table = value
                .as_object()
                .ok_or_else(|| Error::validation(path, "expected a table"))?;
            let mut out = Map::new();
            for (client_category, names) in table {
                let item_path = format!("{path}['{client_category}']");
                let names = string_items(&item_path, names, false)?;
                out.insert(
                    client_category.clone(),
                    sorted_set(names.into_iter().map(|s| s.to_lowercase())),
                );
            }
            Ok(Value::Object(out))
        }
    }
}

fn fallback_value(kind: Kind, fallback: Fallback) -> Option<Value> {
    match fallback {
        Fallback::Required => None,
        Fallback::Null => Some(Value::Null),
        Fallback::Bool(b) => Some(Value::from(b)),
        Fallback::Int(i) => Some(Value::from(i)),
        Fallback::Str(s) => Some(Value::from(s)),
        Fallback::Strs(items) => Some(Value::Array(items.iter().map(|s| Value::from(*s)).collect())),
        Fallback::Empty => Some(match kind {
            Kind::CategoryMappings(_) => Value::Object(Map::new()),
            _ => Value::Array(Vec::new()),
        }),
    }
}

fn unique_attrs(attrs: &[Attr]) -> Vec<&Attr> {
    let mut seen = BTreeSet::new();
    attrs.iter().filter(|a| seen.insert(a.name)).collect()
}

fn check_unknown(
    attrs: &[Attr],
    input: &Map<String, Value>,
    prefix: &str,
    path: &str,
    ignore: &[&str],
) -> Result<()> {
    for (key, value) in input {
        let name = format!("{prefix}{key}");
        if ignore.contains(&name.as_str()) || attrs.iter().any(|a| a.name == name) {
            continue;
        }
        let nested = format!("{name}.");
        match value.as_object() {
            Some(inner) if attrs.iter().any(|a| a.name.starts_with(&nested)) => {
                check_unknown(attrs, inner, &nested, path, ignore)?;
            }
            _ => return Err(Error::validation(format!("{path}.{name}"), "unknown attribute")),
        }
    }
    Ok(())
}

/// Validate a user-authored definition against a mapping table.
///
/// Returns the canonical local form, with defaults filled in. Keys listed in
/// `ignore` are accepted but not copied.
pub fn normalize(
    attrs: &[Attr],
    input: &Map<String, Value>,
    path: &str,
    ignore: &[&str],
) -> Result<Map<String, Value>> {
    check_unknown(attrs, input, "", path, ignore)?;
    let mut out = Map::new();
    for attr in unique_attrs(attrs) {
        let attr_path = format!("{path}.{}", attr.name);
        let value = match get_path(input, attr.name) {
            Some(value) => normalize_value(&attr_path, attr.kind, value)?,
            None => match fallback_value(attr.kind, attr.fallback) {
                Some(Value::Null) => Value::Null,
                Some(value) => normalize_value(&attr_path, attr.kind, &value)?,
                None => return Err(Error::validation(attr_path, "field required")),
            },
        };
        set_path(&mut out, attr.name, value);
    }
    Ok(out)
}

// ============================================================================
// Decoding
// ============================================================================

fn remote_value<'a>(attr: &Attr, remote: &'a Value) -> Option<&'a Value> {
    match attr.place {
        Place::Top => remote.get(attr.remote),
        Place::Field => find_field(remote, attr.remote).map(|f: Field<'a>| f.value()),
        Place::Local => None,
    }
}

fn ints(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

/// Translate one remote value into canonical local form.
pub fn decode_value(attr: &Attr, raw: &Value, lookups: &Lookups) -> Result<Value> {
    let unknown = || Error::UnknownSelectValue {
        field: attr.remote.to_string(),
        value: repr(raw),
    };
    Ok(match attr.kind {
        Kind::Bool | Kind::Int { .. } | Kind::OptInt { .. } | Kind::Str | Kind::Secret => {
            raw.clone()
        }
        Kind::StrList => match raw {
            Value::Null => Value::Array(Vec::new()),
            other => other.clone(),
        },
        Kind::OptStr | Kind::OptSecret => match raw.as_str() {
            Some("") | None => Value::Null,
            Some(_) => raw.clone(),
        },
        Kind::Choice(choices) => Value::from(
            choices
                .iter()
                .find(|(_, r)| r.matches(raw))
                .map(|(name, _)| *name)
                .ok_or_else(unknown)?,
        ),
        Kind::ChoiceFlag { on, off, .. } => match raw.as_bool() {
            Some(true) => Value::from(on),
            Some(false) => Value::from(off),
            None => return Err(unknown()),
        },
        Kind::ChoiceSet(choices) => {
            let mut names = raw
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .map(|item| {
                    choices
                        .iter()
                        .find(|(_, r)| r.matches(item))
                        .map(|(name, _)| *name)
                        .ok_or_else(unknown)
                })
                .collect::<Result<Vec<_>>>()?;
            names.sort_by_key(|name| choice_order(choices, name));
            names.dedup();
            Value::Array(names.into_iter().map(Value::from).collect())
        }
        Kind::StrSet => sorted_set(
            raw.as_array()
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string)),
        ),
        Kind::CommaSet => sorted_set(
            raw.as_str()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        ),
        Kind::Id(table) => match raw.as_i64() {
            Some(id) => Value::from(lookups.name(table, id)?),
            None => Value::Null,
        },
        Kind::IdSet(table) => sorted_set(ints(raw).into_iter().filter_map(|id| {
            match lookups.name(table, id) {
                Ok(name) => Some(name.to_string()),
                Err(e) => {
                    warn!("{}: ignoring {e}", attr.remote);
                    None
                }
            }
        })),
        Kind::NameSet(table) => sorted_set(
            ints(raw)
                .into_iter()
                .map(|id| lookups.name(table, id).map(str::to_lowercase))
                .collect::<Result<Vec<_>>>()?,
        ),
        Kind::CategoryMappings(table) => {
            let mut out = Map::new();
            for mapping in raw.as_array().map(Vec::as_slice).unwrap_or_default() {
                let Some(client_category) = mapping.get("clientCategory").and_then(Value::as_str)
                else {
                    continue;
                };
                let names = mapping
                    .get("categories")
                    .map(ints)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|id| lookups.name(table, id).map(str::to_lowercase))
                    .collect::<Result<Vec<_>>>()?;
                out.insert(client_category.to_string(), sorted_set(names));
            }
            Value::Object(out)
        }
    })
}

/// Read a remote resource into canonical local form.
///
/// Attributes the remote does not carry, and local-only attributes, take
/// their default (or null when they have none).
pub fn decode(attrs: &[Attr], remote: &Value, lookups: &Lookups) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for attr in unique_attrs(attrs) {
        let value = match remote_value(attr, remote) {
            Some(raw) => decode_value(attr, raw, lookups)?,
            None => match fallback_value(attr.kind, attr.fallback) {
                Some(Value::Null) | None => Value::Null,
                Some(value) => normalize_value(attr.name, attr.kind, &value)?,
            },
        };
        set_path(&mut out, attr.name, value);
    }
    Ok(out)
}

// ============================================================================
// Encoding
// ============================================================================

fn id_list(table: &str, value: &Value, lookups: &Lookups) -> Result<Vec<i64>> {
    let mut ids = value
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str)
        .map(|name| lookups.id(table, name))
        .collect::<Result<Vec<_>>>()?;
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Translate one canonical local value into its remote form.
pub fn encode_value(attr: &Attr, value: &Value, lookups: &Lookups) -> Result<Value> {
    Ok(match attr.kind {
        Kind::Bool
        | Kind::Int { .. }
        | Kind::OptInt { .. }
        | Kind::Str
        | Kind::Secret
        | Kind::StrList
        | Kind::StrSet => value.clone(),
        Kind::OptStr | Kind::OptSecret => match value {
            Value::Null => Value::from(""),
            other => other.clone(),
        },
        Kind::Choice(choices) => find_choice(choices, value)
            .and_then(|name| choices.iter().find(|(n, _)| *n == name))
            .map(|(_, raw)| raw.to_value())
            .ok_or_else(|| choice_error(attr.name, choices, value))?,
        Kind::ChoiceFlag { on, choices, .. } => {
            Value::from(find_choice(choices, value).is_some_and(|name| name == on))
        }
        Kind::ChoiceSet(choices) => {
            let mut raws = value
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .map(|item| {
                    find_choice(choices, item)
                        .and_then(|name| choices.iter().find(|(n, _)| *n == name))
                        .map(|(_, raw)| *raw)
                        .ok_or_else(|| choice_error(attr.name, choices, item))
                })
                .collect::<Result<Vec<_>>>()?;
            raws.sort_by_key(|raw| match raw {
                Raw::Int(i) => (*i, ""),
                Raw::Str(s) => (0, *s),
            });
            raws.dedup();
            Value::Array(raws.into_iter().map(Raw::to_value).collect())
        }
        Kind::CommaSet => Value::from(
            value
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_str)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>()
                .join(","),
        ),
        Kind::Id(table) => match value.as_str() {
            Some(name) => Value::from(lookups.id(table, name)?),
            None => Value::Null,
        },
        Kind::IdSet(table) | Kind::NameSet(table) => {
            Value::Array(id_list(table, value, lookups)?.into_iter().map(Value::from).collect())
        }
        Kind::CategoryMappings(table) => Value::Array(
            value
                .as_object()
                .map(|table_value| {
                    table_value
                        .iter()
                        .map(|(client_category, names)| {
                            let ids = id_list(table, names, lookups)?;
                            Ok(serde_json::json!({
                                "clientCategory": client_category,
                                "categories": ids,
                            }))
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?
                .unwrap_or_default(),
        ),
    })
}

/// Encoded values ready to be merged into a remote payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteAttrs {
    /// Top-level keys.
    pub attrs: Map<String, Value>,
    /// `(name, value)` pairs for the `fields` array.
    pub fields: Vec<(String, Value)>,
}

impl RemoteAttrs {
    fn push(&mut self, attr: &Attr, value: Value) {
        match attr.place {
            Place::Top => {
                self.attrs.insert(attr.remote.to_string(), value);
            }
            Place::Field => self.fields.push((attr.remote.to_string(), value)),
            Place::Local => {}
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.fields.is_empty()
    }

    /// Overlay encoded field values onto a template `fields` array.
    ///
    /// Template order is kept; entries without a mapped value keep theirs.
    pub fn overlay_fields(&self, template: &[Value]) -> Vec<Value> {
        template
            .iter()
            .map(|raw| match Field::new(raw) {
                Some(f) => match self.field(f.name()) {
                    Some(value) => f.with_value(value.clone()),
                    None => raw.clone(),
                },
                None => raw.clone(),
            })
            .collect()
    }
}

/// Encode every mapped attribute of a new resource, logging each one.
pub fn create_attrs(
    tree: &str,
    attrs: &[Attr],
    local: &Map<String, Value>,
    lookups: &Lookups,
) -> Result<RemoteAttrs> {
    let mut out = RemoteAttrs::default();
    let mut logged = BTreeSet::new();
    for attr in attrs.iter().filter(|a| a.place != Place::Local) {
        let value = get_path(local, attr.name).unwrap_or(&Value::Null);
        if logged.insert(attr.name) {
            info!(
                "{tree}.{}: {} (created)",
                attr.name,
                masked(value, attr.kind.is_secret())
            );
        }
        out.push(attr, encode_value(attr, value, lookups)?);
    }
    Ok(out)
}

fn same(kind: Kind, a: &Value, b: &Value) -> bool {
    match kind {
        Kind::Choice(_) => match (a.as_str(), b.as_str()) {
            (Some(a), Some(b)) => choice_key(a) == choice_key(b),
            _ => a == b,
        },
        Kind::ChoiceFlag { on, .. } => {
            let flag = |v: &Value| v.as_str().is_some_and(|s| choice_key(s) == choice_key(on));
            flag(a) == flag(b)
        }
        _ => a == b,
    }
}

/// Diff a local definition against the decoded remote one.
///
/// Returns whether anything changed, and the encoded values to send: the
/// changed ones, or every mapped attribute when `set_unchanged` is set.
pub fn update_attrs(
    tree: &str,
    attrs: &[Attr],
    local: &Map<String, Value>,
    remote: &Map<String, Value>,
    lookups: &Lookups,
    set_unchanged: bool,
) -> Result<(bool, RemoteAttrs)> {
    let mut changed = false;
    let mut out = RemoteAttrs::default();
    let mut logged = BTreeSet::new();
    for attr in attrs.iter().filter(|a| a.place != Place::Local) {
        let local_value = get_path(local, attr.name).unwrap_or(&Value::Null);
        let remote_value = get_path(remote, attr.name).unwrap_or(&Value::Null);
        let secret = attr.kind.is_secret();
        let first = logged.insert(attr.name);
        if same(attr.kind, local_value, remote_value) {
            if first {
                debug!(
                    "{tree}.{}: {} (up to date)",
                    attr.name,
                    masked(local_value, secret)
                );
            }
            if set_unchanged {
                out.push(attr, encode_value(attr, local_value, lookups)?);
            }
        } else {
            if first {
                info!(
                    "{tree}.{}: {} -> {}",
                    attr.name,
                    masked(remote_value, secret),
                    masked(local_value, secret)
                );
            }
            changed = true;
            out.push(attr, encode_value(attr, local_value, lookups)?);
        }
    }
    Ok((changed, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PRIORITY: Choices = &[
        ("last", Raw::Int(0)),
        ("first", Raw::Int(1)),
    ];
    const SYNC_LEVEL: Choices = &[
        ("disabled", Raw::Str("disabled")),
        ("add-and-remove-only", Raw::Str("addOnly")),
        ("full-sync", Raw::Str("fullSync")),
    ];
    const FIELDS: Choices = &[
        ("overview", Raw::Int(0)),
        ("rating", Raw::Int(1)),
        ("genres", Raw::Int(2)),
    ];

    fn table() -> Vec<Attr> {
        vec![
            top("enable", "enable", Kind::Bool, Fallback::Bool(true)),
            top("priority", "priority", Kind::Int { min: 1, max: 50 }, Fallback::Int(25)),
            top("sync_level", "syncLevel", Kind::Choice(SYNC_LEVEL), Fallback::Str("addOnly")),
            top("tags", "tags", Kind::IdSet("tags"), Fallback::Empty),
            field("host", "host", Kind::Str, Fallback::Required),
            field("url_base", "urlBase", Kind::OptStr, Fallback::Null),
            field("password", "password", Kind::OptSecret, Fallback::Null),
            field("order", "priority", Kind::Choice(PRIORITY), Fallback::Str("last")),
            field("grab_fields", "grabFields", Kind::ChoiceSet(FIELDS), Fallback::Strs(&["overview", "rating"])),
            field("topics", "topics", Kind::CommaSet, Fallback::Empty),
            local("instance_name", Kind::OptStr, Fallback::Null),
            top(
                "notification_triggers.on_health_issue",
                "onHealthIssue",
                Kind::Bool,
                Fallback::Bool(false),
            ),
        ]
    }

    fn lookups() -> Lookups {
        Lookups::new().with(
            "tags",
            [("anime".to_string(), 1), ("shows".to_string(), 2)],
        )
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let out = normalize(&table(), &input(json!({"host": "localhost"})), "x", &[]).unwrap();
        assert_eq!(out["enable"], json!(true));
        assert_eq!(out["priority"], json!(25));
        assert_eq!(out["sync_level"], json!("add-and-remove-only"));
        assert_eq!(out["tags"], json!([]));
        assert_eq!(out["url_base"], Value::Null);
        assert_eq!(out["grab_fields"], json!(["overview", "rating"]));
        assert_eq!(out["notification_triggers"]["on_health_issue"], json!(false));
    }

    #[test]
    fn test_normalize_required() {
        let err = normalize(&table(), &Map::new(), "x", &[]).unwrap_err();
        assert_eq!(err.to_string(), "x.host: field required");
    }

    #[test]
    fn test_normalize_unknown_attribute() {
        let err = normalize(&table(), &input(json!({"host": "h", "bogus": 1})), "x", &[]).unwrap_err();
        assert_eq!(err.to_string(), "x.bogus: unknown attribute");

        let err = normalize(
            &table(),
            &input(json!({"host": "h", "notification_triggers": {"on_bogus": true}})),
            "x",
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("notification_triggers.on_bogus"));
    }

    #[test]
    fn test_normalize_ignore() {
        let out = normalize(&table(), &input(json!({"type": "x", "host": "h"})), "x", &["type"]).unwrap();
        assert!(!out.contains_key("type"));
    }

    #[test]
    fn test_normalize_range() {
        let err = normalize(&table(), &input(json!({"host": "h", "priority": 51})), "x", &[]).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_normalize_choice_spellings() {
        for spelling in ["full-sync", "FULL_SYNC", "fullSync"] {
            let out = normalize(
                &table(),
                &input(json!({"host": "h", "sync_level": spelling})),
                "x",
                &[],
            )
            .unwrap();
            assert_eq!(out["sync_level"], json!("full-sync"));
        }
        let err = normalize(&table(), &input(json!({"host": "h", "sync_level": "all"})), "x", &[]).unwrap_err();
        assert!(err.to_string().contains("'disabled', 'add-and-remove-only', 'full-sync'"));
    }

    #[test]
    fn test_normalize_sets() {
        let out = normalize(
            &table(),
            &input(json!({
                "host": "h",
                "tags": ["shows", "anime", "shows"],
                "grab_fields": ["genres", "overview", "genres"],
            })),
            "x",
            &[],
        )
        .unwrap();
        assert_eq!(out["tags"], json!(["anime", "shows"]));
        assert_eq!(out["grab_fields"], json!(["overview", "genres"]));
    }

    #[test]
    fn test_normalize_empty_optional_is_null() {
        let out = normalize(&table(), &input(json!({"host": "h", "url_base": ""})), "x", &[]).unwrap();
        assert_eq!(out["url_base"], Value::Null);
    }

    #[test]
    fn test_normalize_empty_required_string() {
        assert!(normalize(&table(), &input(json!({"host": ""})), "x", &[]).is_err());
    }

    #[test]
    fn test_decode_remote_resource() {
        let remote = json!({
            "enable": false,
            "priority": 3,
            "syncLevel": "fullSync",
            "tags": [2, 1, 99],
            "onHealthIssue": true,
            "fields": [
                {"name": "host", "value": "sab"},
                {"name": "urlBase", "value": ""},
                {"name": "password", "value": "secret"},
                {"name": "priority", "value": 1},
                {"name": "grabFields", "value": [2, 0]},
                {"name": "topics", "value": "b, a,"},
            ],
        });
        let out = decode(&table(), &remote, &lookups()).unwrap();
        assert_eq!(out["enable"], json!(false));
        assert_eq!(out["sync_level"], json!("full-sync"));
        assert_eq!(out["tags"], json!(["anime", "shows"]));
        assert_eq!(out["host"], json!("sab"));
        assert_eq!(out["url_base"], Value::Null);
        assert_eq!(out["password"], json!("secret"));
        assert_eq!(out["order"], json!("first"));
        assert_eq!(out["grab_fields"], json!(["overview", "genres"]));
        assert_eq!(out["topics"], json!(["a", "b"]));
        assert_eq!(out["instance_name"], Value::Null);
        assert_eq!(out["notification_triggers"]["on_health_issue"], json!(true));
    }

    #[test]
    fn test_decode_unknown_choice() {
        let remote = json!({"syncLevel": "sometimes", "fields": []});
        let err = decode(&table(), &remote, &lookups()).unwrap_err();
        assert!(matches!(err, Error::UnknownSelectValue { .. }));
    }

    #[test]
    fn test_normalized_and_decoded_forms_match() {
        let local = normalize(
            &table(),
            &input(json!({"host": "sab", "tags": ["shows", "anime"], "order": "FIRST"})),
            "x",
            &[],
        )
        .unwrap();
        let remote = json!({
            "enable": true,
            "priority": 25,
            "syncLevel": "addOnly",
            "tags": [1, 2],
            "onHealthIssue": false,
            "fields": [
                {"name": "host", "value": "sab"},
                {"name": "urlBase", "value": ""},
                {"name": "password", "value": ""},
                {"name": "priority", "value": 1},
                {"name": "grabFields", "value": [1, 0]},
                {"name": "topics", "value": ""},
            ],
        });
        let decoded = decode(&table(), &remote, &lookups()).unwrap();
        let (changed, attrs) =
            update_attrs("t", &table(), &local, &decoded, &lookups(), false).unwrap();
        assert!(!changed);
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_create_attrs_encodes() {
        let local = normalize(
            &table(),
            &input(json!({
                "host": "sab",
                "tags": ["shows"],
                "sync_level": "full-sync",
                "grab_fields": ["genres", "overview"],
                "topics": ["b", "a"],
            })),
            "x",
            &[],
        )
        .unwrap();
        let out = create_attrs("t", &table(), &local, &lookups()).unwrap();
        assert_eq!(out.attrs["syncLevel"], json!("fullSync"));
        assert_eq!(out.attrs["tags"], json!([2]));
        assert_eq!(out.attrs["onHealthIssue"], json!(false));
        assert_eq!(out.field("host"), Some(&json!("sab")));
        assert_eq!(out.field("urlBase"), Some(&json!("")));
        assert_eq!(out.field("priority"), Some(&json!(0)));
        assert_eq!(out.field("grabFields"), Some(&json!([0, 2])));
        assert_eq!(out.field("topics"), Some(&json!("a,b")));
        assert!(!out.attrs.contains_key("instance_name"));
    }

    #[test]
    fn test_create_attrs_unknown_tag() {
        let local = normalize(&table(), &input(json!({"host": "h", "tags": ["movies"]})), "x", &[]).unwrap();
        let err = create_attrs("t", &table(), &local, &lookups()).unwrap_err();
        assert_eq!(err.to_string(), "Unable to find tags 'movies' on the remote instance");
    }

    #[test]
    fn test_update_attrs_only_changed() {
        let remote = normalize(&table(), &input(json!({"host": "a"})), "x", &[]).unwrap();
        let local = normalize(&table(), &input(json!({"host": "b"})), "x", &[]).unwrap();

        let (changed, attrs) = update_attrs("t", &table(), &local, &remote, &lookups(), false).unwrap();
        assert!(changed);
        assert_eq!(attrs.fields, vec![("host".to_string(), json!("b"))]);
        assert!(attrs.attrs.is_empty());

        let (changed, attrs) = update_attrs("t", &table(), &local, &remote, &lookups(), true).unwrap();
        assert!(changed);
        assert_eq!(attrs.field("host"), Some(&json!("b")));
        assert_eq!(attrs.attrs["priority"], json!(25));
    }

    #[test]
    fn test_choice_flag() {
        const ENCRYPTION: Choices = &[
            ("always", Raw::Int(0)),
            ("preferred", Raw::Int(1)),
            ("never", Raw::Int(2)),
        ];
        let attr = field(
            "use_encryption",
            "requireEncryption",
            Kind::ChoiceFlag {
                on: "always",
                off: "preferred",
                choices: ENCRYPTION,
            },
            Fallback::Str("preferred"),
        );
        let lookups = Lookups::new();
        assert_eq!(encode_value(&attr, &json!("always"), &lookups).unwrap(), json!(true));
        assert_eq!(encode_value(&attr, &json!("never"), &lookups).unwrap(), json!(false));
        assert_eq!(decode_value(&attr, &json!(true), &lookups).unwrap(), json!("always"));
        assert_eq!(decode_value(&attr, &json!(false), &lookups).unwrap(), json!("preferred"));
    }

    #[test]
    fn test_category_mappings() {
        let attr = top(
            "category_mappings",
            "categories",
            Kind::CategoryMappings("categories"),
            Fallback::Empty,
        );
        let lookups = Lookups::new().with(
            "categories",
            [("tv/hd".to_string(), 5040), ("tv/sd".to_string(), 5030)],
        );
        let local = normalize_value("x", attr.kind, &json!({"tv": ["TV/SD", "TV/HD"]})).unwrap();
        assert_eq!(local, json!({"tv": ["tv/hd", "tv/sd"]}));

        let encoded = encode_value(&attr, &local, &lookups).unwrap();
        assert_eq!(
            encoded,
            json!([{"clientCategory": "tv", "categories": [5030, 5040]}])
        );
        assert_eq!(decode_value(&attr, &encoded, &lookups).unwrap(), local);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        const ENCRYPTION: Choices = &[
            ("always", Raw::Int(0)),
            ("preferred", Raw::Int(1)),
            ("never", Raw::Int(2)),
        ];
        let lookups = lookups().with(
            "categories",
            [("tv/hd".to_string(), 5040), ("tv/sd".to_string(), 5030)],
        );
        let cases = [
            (Kind::Bool, vec![json!(true), json!(false)]),
            (Kind::Int { min: 1, max: 50 }, vec![json!(1), json!(50)]),
            (Kind::OptInt { min: 0 }, vec![Value::Null, json!(0), json!(7)]),
            (Kind::Str, vec![json!("sab")]),
            (Kind::OptStr, vec![Value::Null, json!("/sab")]),
            (Kind::Secret, vec![json!("hunter2")]),
            (Kind::OptSecret, vec![Value::Null, json!("hunter2")]),
            (
                Kind::Choice(SYNC_LEVEL),
                SYNC_LEVEL.iter().map(|(name, _)| json!(name)).collect(),
            ),
            (
                Kind::Choice(PRIORITY),
                PRIORITY.iter().map(|(name, _)| json!(name)).collect(),
            ),
            (
                Kind::ChoiceSet(FIELDS),
                vec![json!([]), json!(["rating"]), json!(["overview", "rating", "genres"])],
            ),
            (
                Kind::ChoiceFlag {
                    on: "always",
                    off: "preferred",
                    choices: ENCRYPTION,
                },
                vec![json!("always"), json!("preferred")],
            ),
            (Kind::StrList, vec![json!([]), json!(["b", "a"])]),
            (Kind::StrSet, vec![json!([]), json!(["a", "b"])]),
            (Kind::CommaSet, vec![json!([]), json!(["a", "b"])]),
            (Kind::Id("tags"), vec![Value::Null, json!("shows")]),
            (Kind::IdSet("tags"), vec![json!([]), json!(["anime", "shows"])]),
            (Kind::NameSet("categories"), vec![json!([]), json!(["tv/hd", "tv/sd"])]),
            (
                Kind::CategoryMappings("categories"),
                vec![json!({}), json!({"anime": ["tv/sd"], "tv": ["tv/hd", "tv/sd"]})],
            ),
        ];

        for (kind, values) in cases {
            let attr = top("value", "value", kind, Fallback::Null);
            for value in values {
                let encoded = encode_value(&attr, &value, &lookups).unwrap();
                let decoded = decode_value(&attr, &encoded, &lookups).unwrap();
                assert_eq!(decoded, value, "{kind:?} via {encoded}");
            }
        }
    }

    #[test]
    fn test_decode_unknown_ids() {
        let tags = top("tags", "tags", Kind::IdSet("tags"), Fallback::Empty);
        assert_eq!(
            decode_value(&tags, &json!([1, 99]), &lookups()).unwrap(),
            json!(["anime"])
        );

        let categories = top("categories", "categories", Kind::NameSet("tags"), Fallback::Empty);
        let err = decode_value(&categories, &json!([1, 99]), &lookups()).unwrap_err();
        assert!(matches!(err, Error::UnknownId { id: 99, .. }));
    }

    #[test]
    fn test_lookups() {
        let lookups = lookups();
        assert_eq!(lookups.id("tags", "anime").unwrap(), 1);
        assert_eq!(lookups.id("tags", "ANIME").unwrap(), 1);
        assert_eq!(lookups.name("tags", 2).unwrap(), "shows");
        assert!(lookups.id("tags", "movies").is_err());
        assert!(lookups.name("tags", 3).is_err());
        assert!(lookups.id("sync_profiles", "Standard").is_err());
    }

    #[test]
    fn test_paths() {
        let mut map = Map::new();
        set_path(&mut map, "a.b", json!(1));
        set_path(&mut map, "a.c", json!(2));
        set_path(&mut map, "d", json!(3));
        assert_eq!(get_path(&map, "a.b"), Some(&json!(1)));
        assert_eq!(get_path(&map, "a.c"), Some(&json!(2)));
        assert_eq!(get_path(&map, "d"), Some(&json!(3)));
        assert_eq!(get_path(&map, "a.x"), None);
        assert_eq!(get_path(&map, "d.x"), None);
    }

    #[test]
    fn test_overlay_fields() {
        let attrs = RemoteAttrs {
            attrs: Map::new(),
            fields: vec![("host".to_string(), json!("sab"))],
        };
        let template = vec![
            json!({"name": "host", "type": "textbox", "value": ""}),
            json!({"name": "port", "type": "textbox", "value": 8080}),
        ];
        let out = attrs.overlay_fields(&template);
        assert_eq!(out[0]["value"], json!("sab"));
        assert_eq!(out[0]["type"], json!("textbox"));
        assert_eq!(out[1]["value"], json!(8080));
    }
}
