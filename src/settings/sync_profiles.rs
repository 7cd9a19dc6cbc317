//! Sync profiles, the search settings applications use for an indexer.

use super::{RemoteObjects, SyncContext, remote_id};
use anyhow::Result;
use declarative::{
    Attr, Collection, Fallback, Kind, Lookups, Reconcile, Summary, converge, create_attrs, decode,
    definition_tree, normalize, prune, top, update_attrs,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};

pub const PATH: &str = "/api/v1/appprofile";

/// A sync profile is a plain attribute table.
pub type SyncProfile = Map<String, Value>;

pub(crate) const ATTRS: &[Attr] = &[
    top("enable_rss", "enableRss", Kind::Bool, Fallback::Bool(true)),
    top(
        "enable_interactive_search",
        "enableInteractiveSearch",
        Kind::Bool,
        Fallback::Bool(true),
    ),
    top(
        "enable_automatic_search",
        "enableAutomaticSearch",
        Kind::Bool,
        Fallback::Bool(true),
    ),
    top(
        "minimum_seeders",
        "minimumSeeders",
        Kind::Int { min: 1, max: i64::MAX },
        Fallback::Int(1),
    ),
];

pub fn normalize_collection(
    collection: &mut Collection<SyncProfile>,
    tree: &str,
) -> declarative::Result<()> {
    for (name, profile) in &mut collection.definitions {
        *profile = normalize(ATTRS, profile, &definition_tree(tree, name), &[])?;
    }
    Ok(())
}

pub fn from_remote(ctx: &SyncContext<'_>) -> Result<Collection<SyncProfile>> {
    let lookups = Lookups::new();
    let mut definitions = IndexMap::new();
    for object in ctx.client.get_list(PATH)? {
        let Some(name) = object.get("name").and_then(Value::as_str) else {
            continue;
        };
        definitions.insert(name.to_string(), decode(ATTRS, &object, &lookups)?);
    }
    Ok(Collection::new(definitions))
}

struct Reconciler<'a> {
    ctx: &'a SyncContext<'a>,
    objects: RemoteObjects,
}

impl Reconcile for Reconciler<'_> {
    type Definition = SyncProfile;

    fn create(&mut self, tree: &str, name: &str, local: &SyncProfile) -> Result<()> {
        let remote = create_attrs(tree, ATTRS, local, &Lookups::new())?;
        let mut body = Map::new();
        body.insert("name".to_string(), Value::from(name));
        body.extend(remote.attrs);
        self.ctx.client.post(PATH, Value::Object(body))?;
        Ok(())
    }

    fn update(
        &mut self,
        tree: &str,
        name: &str,
        local: &SyncProfile,
        remote: &SyncProfile,
    ) -> Result<bool> {
        let (changed, changes) = update_attrs(tree, ATTRS, local, remote, &Lookups::new(), false)?;
        if !changed {
            return Ok(false);
        }
        let object = self.objects.get(self.ctx.client, name)?;
        let id = remote_id(object)?;
        let mut body = object.as_object().cloned().unwrap_or_default();
        body.extend(changes.attrs);
        self.ctx
            .client
            .put(&format!("{PATH}/{id}"), Value::Object(body))?;
        Ok(true)
    }

    fn delete(&mut self, _tree: &str, name: &str, _remote: &SyncProfile) -> Result<()> {
        let id = remote_id(self.objects.get(self.ctx.client, name)?)?;
        self.ctx.client.delete(&format!("{PATH}/{id}"))?;
        Ok(())
    }
}

pub fn update_remote(
    ctx: &SyncContext<'_>,
    tree: &str,
    local: &Collection<SyncProfile>,
    remote: &Collection<SyncProfile>,
) -> Result<Summary> {
    let mut reconciler = Reconciler {
        ctx,
        objects: RemoteObjects::new(PATH),
    };
    converge(tree, local, remote, &mut reconciler)
}

pub fn delete_remote(
    ctx: &SyncContext<'_>,
    tree: &str,
    local: &Collection<SyncProfile>,
    remote: &Collection<SyncProfile>,
) -> Result<Summary> {
    let mut reconciler = Reconciler {
        ctx,
        objects: RemoteObjects::new(PATH),
    };
    prune(tree, local, remote, &mut reconciler, ctx.check_unmanaged)
}
