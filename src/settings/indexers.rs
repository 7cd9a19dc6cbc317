//! Indexers.
//!
//! An indexer's `type` is the remote definition name (`nyaasi`, `torznab`,
//! ...), and there are hundreds of them. Only the attributes every indexer
//! shares are mapped; the rest are carried as dynamic `fields` and
//! `secret_fields`, keyed by remote field name, and encoded through the
//! field schema the remote attaches to every indexer.

use super::{
    SyncContext, by_name, deserialize_secrets, remote_id, serialize_secrets, sync_profiles,
    tag_lookups,
};
use anyhow::{Context as _, Result};
use declarative::display::masked;
use declarative::{
    Attr, Collection, Error as MappingError, Fallback, Field, Kind, Lookups, Place, Reconcile,
    RemoteAttrs, Summary, converge, create_attrs, decode, definition_tree, field, fields_of,
    get_schema, indexer_urls, normalize, prune, top, update_attrs,
};
use indexmap::IndexMap;
use log::{debug, info};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PATH: &str = "/api/v1/indexer";

/// Keys of a schema template that never belong in a create payload.
const SCHEMA_STRIP: &[&str] = &["id", "name", "added"];

pub(crate) const ATTRS: &[Attr] = &[
    top("enable", "enable", Kind::Bool, Fallback::Bool(true)),
    top(
        "sync_profile",
        "appProfileId",
        Kind::Id("sync_profiles"),
        Fallback::Required,
    ),
    top("redirect", "redirect", Kind::Bool, Fallback::Bool(false)),
    top(
        "priority",
        "priority",
        Kind::Int { min: 1, max: 50 },
        Fallback::Int(25),
    ),
    field(
        "query_limit",
        "baseSettings.queryLimit",
        Kind::OptInt { min: 0 },
        Fallback::Null,
    ),
    field(
        "grab_limit",
        "baseSettings.grabLimit",
        Kind::OptInt { min: 0 },
        Fallback::Null,
    ),
    top("tags", "tags", Kind::IdSet("tags"), Fallback::Empty),
];

/// One indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indexer {
    /// Remote definition name.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
    /// Dynamic fields, select values by option name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, Value>,
    /// Dynamic fields holding credentials.
    #[serde(
        default,
        skip_serializing_if = "IndexMap::is_empty",
        serialize_with = "serialize_secrets",
        deserialize_with = "deserialize_secrets"
    )]
    pub secret_fields: IndexMap<String, SecretString>,
}

impl Indexer {
    pub fn normalize(&mut self, path: &str) -> declarative::Result<()> {
        if self.kind.trim().is_empty() {
            return Err(MappingError::validation(
                format!("{path}.type"),
                "value must not be empty",
            ));
        }
        self.attrs = normalize(ATTRS, &self.attrs, path, &[])?;
        if let Some(name) = self
            .fields
            .keys()
            .find(|name| self.secret_fields.contains_key(*name))
        {
            return Err(MappingError::validation(
                path,
                format!("field '{name}' defined in both 'fields' and 'secret_fields'"),
            ));
        }
        Ok(())
    }

    /// The configured value of a dynamic field, and where it is configured.
    fn explicit(&self, name: &str) -> Option<(Value, &'static str)> {
        if let Some(secret) = self.secret_fields.get(name) {
            return Some((Value::from(secret.expose_secret()), "secret_fields"));
        }
        self.fields.get(name).map(|value| (value.clone(), "fields"))
    }

    fn explicit_names(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.fields
            .keys()
            .map(|name| (name.as_str(), "fields"))
            .chain(
                self.secret_fields
                    .keys()
                    .map(|name| (name.as_str(), "secret_fields")),
            )
    }
}

pub fn normalize_collection(
    collection: &mut Collection<Indexer>,
    tree: &str,
) -> declarative::Result<()> {
    for (name, indexer) in &mut collection.definitions {
        indexer.normalize(&definition_tree(tree, name))?;
    }
    Ok(())
}

/// Remote field names bound to mapped attributes.
fn mapped_fields() -> impl Iterator<Item = &'static str> {
    ATTRS
        .iter()
        .filter(|attr| attr.place == Place::Field)
        .map(|attr| attr.remote)
}

fn is_mapped(name: &str) -> bool {
    mapped_fields().any(|mapped| mapped == name)
}

fn fetch_lookups(ctx: &SyncContext<'_>) -> Result<Lookups> {
    let profiles = ctx
        .client
        .get_list(sync_profiles::PATH)?
        .iter()
        .filter_map(|profile| {
            Some((
                profile.get("name")?.as_str()?.to_string(),
                profile.get("id")?.as_i64()?,
            ))
        })
        .collect::<Vec<_>>();
    Ok(Lookups::new()
        .with("tags", tag_lookups(ctx.client)?)
        .with("sync_profiles", profiles))
}

fn definition_name(object: &Value) -> &str {
    object
        .get("definitionName")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

pub fn from_remote(ctx: &SyncContext<'_>) -> Result<Collection<Indexer>> {
    let objects = by_name(ctx.client.get_list(PATH)?);
    if objects.is_empty() {
        return Ok(Collection::default());
    }
    let lookups = fetch_lookups(ctx)?;
    let mut definitions = IndexMap::new();
    for (name, object) in &objects {
        let attrs = decode(ATTRS, object, &lookups)
            .with_context(|| format!("Unable to read indexer '{name}'"))?;
        let urls = indexer_urls(object);
        let mut fields = IndexMap::new();
        let mut secret_fields = IndexMap::new();
        for f in fields_of(object) {
            if f.is_info() || is_mapped(f.name()) {
                continue;
            }
            let value = f.decode(f.value(), urls).with_context(|| {
                format!("Unable to read field '{}' of indexer '{name}'", f.name())
            })?;
            match value {
                Value::String(secret) if f.looks_secret() => {
                    secret_fields.insert(f.name().to_string(), SecretString::from(secret));
                }
                value => {
                    fields.insert(f.name().to_string(), value);
                }
            }
        }
        definitions.insert(
            name.clone(),
            Indexer {
                kind: definition_name(object).to_string(),
                attrs,
                fields,
                secret_fields,
            },
        );
    }
    Ok(Collection::new(definitions))
}

/// Everything fetched from the indexer endpoints in one pass.
struct Catalog {
    objects: IndexMap<String, Value>,
    lookups: Lookups,
    schemas: Option<Vec<Value>>,
}

impl Catalog {
    fn object(&self, tree: &str, name: &str) -> Result<&Value> {
        self.objects
            .get(name)
            .with_context(|| format!("{tree}: '{name}' no longer exists on the remote instance"))
    }
}

struct Reconciler<'a> {
    ctx: &'a SyncContext<'a>,
    catalog: Option<Catalog>,
}

impl Reconciler<'_> {
    fn catalog(&mut self) -> Result<&mut Catalog> {
        let catalog = match self.catalog.take() {
            Some(catalog) => catalog,
            None => Catalog {
                objects: by_name(self.ctx.client.get_list(PATH)?),
                lookups: fetch_lookups(self.ctx)?,
                schemas: None,
            },
        };
        Ok(self.catalog.insert(catalog))
    }

    /// Schema template of an indexer definition. The schema list is large,
    /// so it is only fetched when a template is needed.
    fn schema(&mut self, kind: &str) -> Result<Map<String, Value>> {
        let client = self.ctx.client;
        let catalog = self.catalog()?;
        if catalog.schemas.is_none() {
            catalog.schemas = Some(client.get_list(&format!("{PATH}/schema"))?);
        }
        let schemas = catalog.schemas.as_deref().unwrap_or_default();
        Ok(get_schema(schemas, "indexer", "definitionName", kind, SCHEMA_STRIP)?)
    }

    /// Create or replace an indexer from the schema template of its type.
    fn from_template(
        &mut self,
        tree: &str,
        name: &str,
        local: &Indexer,
        remote: Option<&Indexer>,
    ) -> Result<Map<String, Value>> {
        let mut body = self.schema(&local.kind)?;
        let catalog = self.catalog()?;
        let common = match remote {
            None => create_attrs(tree, ATTRS, &local.attrs, &catalog.lookups)?,
            Some(remote) => {
                update_attrs(tree, ATTRS, &local.attrs, &remote.attrs, &catalog.lookups, true)?.1
            }
        };
        let urls = body
            .get("indexerUrls")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);
        let template: Vec<Field<'_>> = body
            .get("fields")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Field::new).collect())
            .unwrap_or_default();
        check_fields(tree, local, &template)?;
        let mut fields = Vec::new();
        for f in template.iter().filter(|f| !f.is_info()) {
            if let Some(value) = mapped_value(&common, f)? {
                fields.push(f.with_value(value));
                continue;
            }
            match local.explicit(f.name()) {
                Some((value, map)) => {
                    info!(
                        "{tree}.{map}['{}']: {} (created)",
                        f.name(),
                        masked(&value, map == "secret_fields")
                    );
                    fields.push(f.with_value(f.encode(&value, urls)?));
                }
                None => fields.push(f.with_value(f.value().clone())),
            }
        }
        body.insert("name".to_string(), Value::from(name));
        body.extend(common.attrs);
        body.insert("fields".to_string(), Value::Array(fields));
        Ok(body)
    }
}

/// Every explicitly configured field must exist on the remote resource.
fn check_fields(tree: &str, local: &Indexer, known: &[Field<'_>]) -> Result<()> {
    for (name, map) in local.explicit_names() {
        if !known.iter().any(|f| f.name() == name && !f.is_info()) {
            return Err(MappingError::validation(
                format!("{tree}.{map}['{name}']"),
                format!("no such field on indexer type '{}'", local.kind),
            )
            .into());
        }
    }
    Ok(())
}

/// Encoded value of a field bound to a mapped attribute.
fn mapped_value(common: &RemoteAttrs, f: &Field<'_>) -> declarative::Result<Option<Value>> {
    if !is_mapped(f.name()) {
        return Ok(None);
    }
    common
        .field(f.name())
        .cloned()
        .map(Some)
        .ok_or_else(|| MappingError::MissingField(f.name().to_string()))
}

impl Reconcile for Reconciler<'_> {
    type Definition = Indexer;

    fn create(&mut self, tree: &str, name: &str, local: &Indexer) -> Result<()> {
        let body = self.from_template(tree, name, local, None)?;
        self.ctx.client.post(PATH, Value::Object(body))?;
        Ok(())
    }

    fn update(&mut self, tree: &str, name: &str, local: &Indexer, remote: &Indexer) -> Result<bool> {
        if !local.kind.eq_ignore_ascii_case(&remote.kind) {
            info!("{tree}.type: '{}' -> '{}'", remote.kind, local.kind);
            let id = remote_id(self.catalog()?.object(tree, name)?)?;
            let mut body = self.from_template(tree, name, local, Some(remote))?;
            body.insert("id".to_string(), Value::from(id));
            self.ctx
                .client
                .put(&format!("{PATH}/{id}"), Value::Object(body))?;
            return Ok(true);
        }

        let client = self.ctx.client;
        let catalog = self.catalog()?;
        let object = catalog.object(tree, name)?;
        let (mut changed, common) =
            update_attrs(tree, ATTRS, &local.attrs, &remote.attrs, &catalog.lookups, true)?;
        let known = fields_of(object);
        check_fields(tree, local, &known)?;
        let urls = indexer_urls(object);
        let mut fields = Vec::new();
        for f in known {
            if f.is_info() {
                continue;
            }
            if let Some(value) = mapped_value(&common, &f)? {
                fields.push(f.with_value(value));
                continue;
            }
            let current = f.decode(f.value(), urls)?;
            match local.explicit(f.name()) {
                Some((value, map)) => {
                    let path = format!("{tree}.{map}['{}']", f.name());
                    let secret = map == "secret_fields" || f.looks_secret();
                    if f.same(&value, &current) || value == *f.value() {
                        debug!("{path}: {} (up to date)", masked(&current, secret));
                        fields.push(f.with_value(f.value().clone()));
                    } else {
                        info!(
                            "{path}: {} -> {}",
                            masked(&current, secret),
                            masked(&value, secret)
                        );
                        changed = true;
                        fields.push(f.with_value(f.encode(&value, urls)?));
                    }
                }
                None => {
                    let map = if f.looks_secret() { "secret_fields" } else { "fields" };
                    debug!(
                        "{tree}.{map}['{}']: {} (unmanaged)",
                        f.name(),
                        masked(&current, f.looks_secret())
                    );
                    fields.push(f.with_value(f.value().clone()));
                }
            }
        }
        if !changed {
            return Ok(false);
        }
        let id = remote_id(object)?;
        let mut body = object.as_object().cloned().unwrap_or_default();
        body.extend(common.attrs);
        body.insert("fields".to_string(), Value::Array(fields));
        client.put(&format!("{PATH}/{id}"), Value::Object(body))?;
        Ok(true)
    }

    fn delete(&mut self, tree: &str, name: &str, _remote: &Indexer) -> Result<()> {
        let client = self.ctx.client;
        let id = remote_id(self.catalog()?.object(tree, name)?)?;
        client.delete(&format!("{PATH}/{id}"))?;
        Ok(())
    }
}

pub fn update_remote(
    ctx: &SyncContext<'_>,
    tree: &str,
    local: &Collection<Indexer>,
    remote: &Collection<Indexer>,
) -> Result<Summary> {
    let mut reconciler = Reconciler { ctx, catalog: None };
    converge(tree, local, remote, &mut reconciler)
}

pub fn delete_remote(
    ctx: &SyncContext<'_>,
    tree: &str,
    local: &Collection<Indexer>,
    remote: &Collection<Indexer>,
) -> Result<Summary> {
    let mut reconciler = Reconciler { ctx, catalog: None };
    prune(tree, local, remote, &mut reconciler, ctx.check_unmanaged)
}
