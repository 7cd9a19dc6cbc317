//! Schema-backed resource categories.
//!
//! Applications, indexer proxies, download clients and notifications share
//! one shape: a `type` selects a [`TypeSpec`] whose mapping table translates
//! the local attributes into the remote resource, and the category's
//! `/schema` endpoint supplies the template new resources are built from.

use super::{SyncContext, by_name, category_lookups, remote_id, tag_lookups};
use anyhow::{Context as _, Result};
use declarative::{
    Collection, Error as MappingError, Field, Lookups, Reconcile, Registry, RemoteAttrs, Summary,
    TypeSpec, converge, create_attrs, decode, definition_tree, get_schema, normalize, prune,
    update_attrs,
};
use indexmap::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys of a schema template that never belong in a create payload.
const SCHEMA_STRIP: &[&str] = &["id", "name"];

/// Fill in values the configuration refers to indirectly, right before they
/// are sent.
pub type ResolveFn = fn(&SyncContext<'_>, &TypeSpec, &mut Map<String, Value>) -> Result<()>;

/// Extract lookup tables from the schema templates.
pub type SchemaLookupsFn = fn(&[Value], &mut Lookups);

/// Endpoint and type registry of one category.
pub struct Resources {
    pub registry: Registry,
    /// Collection endpoint, e.g. `/api/v1/applications`.
    pub path: &'static str,
    /// Whether the mapping tables reference indexer categories.
    pub categories: bool,
    pub schema_lookups: Option<SchemaLookupsFn>,
    pub resolve: Option<ResolveFn>,
}

/// One resource of a schema-backed category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl Definition {
    pub fn new(kind: impl Into<String>, attrs: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            attrs,
        }
    }

    /// Validate against the type's mapping table, canonicalize the type name
    /// and fill in defaults.
    pub fn normalize(&mut self, registry: &Registry, path: &str) -> declarative::Result<()> {
        let spec = registry.by_type(&self.kind)?;
        let attrs = normalize(&(spec.attrs)(None), &self.attrs, path, &[])?;
        if let Some(check) = spec.check {
            check(&attrs).map_err(|message| MappingError::validation(path, message))?;
        }
        self.kind = spec.name.to_string();
        self.attrs = attrs;
        Ok(())
    }
}

pub fn normalize_collection(
    collection: &mut Collection<Definition>,
    registry: &Registry,
    tree: &str,
) -> declarative::Result<()> {
    for (name, definition) in &mut collection.definitions {
        definition.normalize(registry, &definition_tree(tree, name))?;
    }
    Ok(())
}

/// Everything fetched from a category's endpoints in one pass.
struct Catalog {
    schemas: Vec<Value>,
    objects: IndexMap<String, Value>,
    lookups: Lookups,
}

impl Catalog {
    fn fetch(ctx: &SyncContext<'_>, resources: &Resources) -> Result<Self> {
        let client = ctx.client;
        let objects = by_name(client.get_list(resources.path)?);
        let schemas = client.get_list(&format!("{}/schema", resources.path))?;
        let mut lookups = Lookups::new();
        lookups.insert("tags", tag_lookups(client)?);
        if resources.categories {
            lookups.insert("categories", category_lookups(client)?);
        }
        if let Some(schema_lookups) = resources.schema_lookups {
            schema_lookups(&schemas, &mut lookups);
        }
        Ok(Self {
            schemas,
            objects,
            lookups,
        })
    }

    fn object(&self, tree: &str, name: &str) -> Result<&Value> {
        self.objects
            .get(name)
            .with_context(|| format!("{tree}: '{name}' no longer exists on the remote instance"))
    }
}

/// Read every resource of a category whose implementation is supported.
pub fn from_remote(
    ctx: &SyncContext<'_>,
    resources: &Resources,
    tree: &str,
) -> Result<Collection<Definition>> {
    let catalog = Catalog::fetch(ctx, resources)?;
    let mut definitions = IndexMap::new();
    for (name, object) in &catalog.objects {
        let implementation = object
            .get("implementation")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(spec) = resources.registry.by_implementation(implementation) else {
            warn!(
                "{}: unsupported {} implementation '{implementation}', skipping",
                definition_tree(tree, name),
                resources.registry.category
            );
            continue;
        };
        let attrs = decode(&(spec.attrs)(ctx.version.as_ref()), object, &catalog.lookups)
            .with_context(|| format!("Unable to read {}", definition_tree(tree, name)))?;
        definitions.insert(name.clone(), Definition::new(spec.name, attrs));
    }
    Ok(Collection::new(definitions))
}

/// Template fields with the mapped values overlaid and `info` fields dropped.
///
/// A mapped field missing from the template means the remote schema changed
/// under the mapping table.
fn overlay(remote: &RemoteAttrs, template: &[Value]) -> declarative::Result<Vec<Value>> {
    if let Some((name, _)) = remote
        .fields
        .iter()
        .find(|(name, _)| !template.iter().filter_map(Field::new).any(|f| f.name() == name))
    {
        return Err(MappingError::MissingField(name.clone()));
    }
    let kept: Vec<Value> = template
        .iter()
        .filter(|raw| Field::new(raw).is_none_or(|f| !f.is_info()))
        .cloned()
        .collect();
    Ok(remote.overlay_fields(&kept))
}

fn schema(
    resources: &Resources,
    catalog: &Catalog,
    spec: &TypeSpec,
) -> declarative::Result<Map<String, Value>> {
    get_schema(
        &catalog.schemas,
        resources.registry.category,
        "implementation",
        spec.implementation,
        SCHEMA_STRIP,
    )
}

fn template_fields(resource: &Map<String, Value>) -> &[Value] {
    resource
        .get("fields")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
}

/// Reconciler for one schema-backed category.
///
/// Remote state is fetched on first use, after the categories converged
/// earlier in the pass have created whatever this one references.
pub struct Reconciler<'a> {
    ctx: &'a SyncContext<'a>,
    resources: &'static Resources,
    catalog: Option<Catalog>,
}

impl<'a> Reconciler<'a> {
    pub fn new(ctx: &'a SyncContext<'a>, resources: &'static Resources) -> Self {
        Self {
            ctx,
            resources,
            catalog: None,
        }
    }

    fn catalog(&mut self) -> Result<&Catalog> {
        let catalog = match self.catalog.take() {
            Some(catalog) => catalog,
            None => Catalog::fetch(self.ctx, self.resources)?,
        };
        Ok(self.catalog.insert(catalog))
    }

    fn local_attrs(&self, spec: &TypeSpec, local: &Definition) -> Result<Map<String, Value>> {
        let mut attrs = local.attrs.clone();
        if let Some(resolve) = self.resources.resolve {
            resolve(self.ctx, spec, &mut attrs)?;
        }
        Ok(attrs)
    }
}

impl Reconcile for Reconciler<'_> {
    type Definition = Definition;

    fn create(&mut self, tree: &str, name: &str, local: &Definition) -> Result<()> {
        let (ctx, resources) = (self.ctx, self.resources);
        let spec = resources.registry.by_type(&local.kind)?;
        let attrs = (spec.attrs)(ctx.version.as_ref());
        let local_attrs = self.local_attrs(spec, local)?;
        let catalog = self.catalog()?;
        let schema = schema(resources, catalog, spec)?;

        let remote = create_attrs(tree, &attrs, &local_attrs, &catalog.lookups)?;
        let fields = overlay(&remote, template_fields(&schema))?;

        let mut body = schema;
        body.insert("name".to_string(), Value::from(name));
        body.extend(remote.attrs);
        body.insert("fields".to_string(), Value::Array(fields));
        ctx.client.post(resources.path, Value::Object(body))?;
        Ok(())
    }

    fn update(
        &mut self,
        tree: &str,
        name: &str,
        local: &Definition,
        remote: &Definition,
    ) -> Result<bool> {
        let (ctx, resources) = (self.ctx, self.resources);
        let spec = resources.registry.by_type(&local.kind)?;
        let attrs = (spec.attrs)(ctx.version.as_ref());
        let local_attrs = self.local_attrs(spec, local)?;
        let catalog = self.catalog()?;
        let object = catalog.object(tree, name)?;
        let id = remote_id(object)?;

        let body = if spec.matches(&remote.kind) {
            let (changed, changes) =
                update_attrs(tree, &attrs, &local_attrs, &remote.attrs, &catalog.lookups, false)?;
            if !changed {
                return Ok(false);
            }
            let mut body = object.as_object().cloned().unwrap_or_default();
            let fields = overlay(&changes, template_fields(&body))?;
            body.extend(changes.attrs);
            body.insert("fields".to_string(), Value::Array(fields));
            body
        } else {
            // A new type needs the new type's template, with every attribute set.
            info!("{tree}.type: '{}' -> '{}'", remote.kind, spec.name);
            let schema = schema(resources, catalog, spec)?;
            let (_, changes) =
                update_attrs(tree, &attrs, &local_attrs, &Map::new(), &catalog.lookups, true)?;
            let fields = overlay(&changes, template_fields(&schema))?;
            let mut body = schema;
            body.insert("id".to_string(), Value::from(id));
            body.insert("name".to_string(), Value::from(name));
            body.extend(changes.attrs);
            body.insert("fields".to_string(), Value::Array(fields));
            body
        };
        ctx.client
            .put(&format!("{}/{id}", resources.path), Value::Object(body))?;
        Ok(true)
    }

    fn delete(&mut self, tree: &str, name: &str, _remote: &Definition) -> Result<()> {
        let (ctx, path) = (self.ctx, self.resources.path);
        let id = remote_id(self.catalog()?.object(tree, name)?)?;
        ctx.client.delete(&format!("{path}/{id}"))?;
        Ok(())
    }
}

pub fn update_remote(
    ctx: &SyncContext<'_>,
    resources: &'static Resources,
    tree: &str,
    local: &Collection<Definition>,
    remote: &Collection<Definition>,
) -> Result<Summary> {
    converge(tree, local, remote, &mut Reconciler::new(ctx, resources))
}

pub fn delete_remote(
    ctx: &SyncContext<'_>,
    resources: &'static Resources,
    tree: &str,
    local: &Collection<Definition>,
    remote: &Collection<Definition>,
) -> Result<Summary> {
    prune(
        tree,
        local,
        remote,
        &mut Reconciler::new(ctx, resources),
        ctx.check_unmanaged,
    )
}
