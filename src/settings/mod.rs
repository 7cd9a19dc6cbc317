//! The settings tree of one Prowlarr instance.
//!
//! Each category module knows how to read its resources from the remote
//! instance (`from_remote`) and how to converge the remote instance to a local
//! definition (`update_remote`, `delete_remote`). [`Settings`] strings them
//! together in dependency order: tags first, then the resources that others
//! reference by name, then everything else.

pub mod applications;
pub mod definition;
pub mod download_clients;
pub mod indexers;
pub mod notifications;
pub mod proxies;
pub mod sync_profiles;
pub mod tags;
pub mod ui;

use anyhow::{Context as _, Result};
use declarative::{Collection, Summary, Version};
use indexmap::IndexMap;
use prowlarr::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub use definition::Definition;
pub use indexers::Indexer;
pub use sync_profiles::SyncProfile;
pub use tags::TagsSettings;
pub use ui::UiSettings;

pub const ROOT: &str = "prowlarr.settings";
pub const TAG_PATH: &str = "/api/v1/tag";
pub const CATEGORIES_PATH: &str = "/api/v1/indexer/categories";

// ============================================================================
// Sync context
// ============================================================================

/// API keys of sibling services, looked up by plugin and instance name.
pub trait Links {
    fn api_key(&self, plugin: &str, instance: &str) -> Option<SecretString>;
}

/// No linked instances.
pub struct NoLinks;

impl Links for NoLinks {
    fn api_key(&self, _plugin: &str, _instance: &str) -> Option<SecretString> {
        None
    }
}

/// Everything a reconciliation pass needs from its surroundings.
pub struct SyncContext<'a> {
    pub client: &'a Client,
    /// Version of the remote instance, selects version-dependent mappings.
    pub version: Option<Version>,
    pub links: &'a dyn Links,
    /// Report remote resources missing from the configuration as warnings.
    pub check_unmanaged: bool,
}

impl<'a> SyncContext<'a> {
    pub fn new(client: &'a Client, version: &str, links: &'a dyn Links) -> Self {
        let version = match version.parse::<Version>() {
            Ok(version) => Some(version),
            Err(e) => {
                log::warn!("{e}: version-dependent attributes use their latest mapping");
                None
            }
        };
        Self {
            client,
            version,
            links,
            check_unmanaged: false,
        }
    }

    #[must_use]
    pub fn check_unmanaged(mut self, check_unmanaged: bool) -> Self {
        self.check_unmanaged = check_unmanaged;
        self
    }
}

// ============================================================================
// Settings tree
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexersSettings {
    #[serde(default)]
    pub proxies: Collection<Definition>,
    #[serde(default)]
    pub indexers: Collection<Indexer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppsSettings {
    #[serde(default)]
    pub sync_profiles: Collection<SyncProfile>,
    #[serde(default)]
    pub applications: Collection<Definition>,
}

/// Declarative configuration of one Prowlarr instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub tags: TagsSettings,
    #[serde(default)]
    pub apps: AppsSettings,
    #[serde(default)]
    pub indexers: IndexersSettings,
    #[serde(default)]
    pub download_clients: Collection<Definition>,
    #[serde(default)]
    pub notifications: Collection<Definition>,
    #[serde(default)]
    pub ui: UiSettings,
}

/// Tree path of a category, used as the prefix of every log line about it.
pub fn tree(category: &str) -> String {
    format!("{ROOT}.{category}")
}

impl Settings {
    /// Validate every definition and fill in defaults.
    ///
    /// Types are canonicalized, so an alias such as `rutorrent` reads back as
    /// `rtorrent`.
    pub fn validate(&mut self) -> declarative::Result<()> {
        self.tags.validate(&tree("tags"))?;
        sync_profiles::normalize_collection(&mut self.apps.sync_profiles, &tree("apps.sync_profiles"))?;
        definition::normalize_collection(
            &mut self.apps.applications,
            &applications::RESOURCES.registry,
            &tree("apps.applications"),
        )?;
        definition::normalize_collection(
            &mut self.indexers.proxies,
            &proxies::RESOURCES.registry,
            &tree("indexers.proxies"),
        )?;
        indexers::normalize_collection(&mut self.indexers.indexers, &tree("indexers.indexers"))?;
        definition::normalize_collection(
            &mut self.download_clients,
            &download_clients::RESOURCES.registry,
            &tree("download_clients"),
        )?;
        definition::normalize_collection(
            &mut self.notifications,
            &notifications::RESOURCES.registry,
            &tree("notifications"),
        )?;
        self.ui.validate(&tree("ui"))
    }

    /// Read the current configuration of the remote instance.
    pub fn from_remote(ctx: &SyncContext<'_>) -> Result<Self> {
        Ok(Self {
            tags: tags::from_remote(ctx).context("Failed to read tags")?,
            apps: AppsSettings {
                sync_profiles: sync_profiles::from_remote(ctx)
                    .context("Failed to read sync profiles")?,
                applications: definition::from_remote(
                    ctx,
                    &applications::RESOURCES,
                    &tree("apps.applications"),
                )
                .context("Failed to read applications")?,
            },
            indexers: IndexersSettings {
                proxies: definition::from_remote(ctx, &proxies::RESOURCES, &tree("indexers.proxies"))
                    .context("Failed to read indexer proxies")?,
                indexers: indexers::from_remote(ctx).context("Failed to read indexers")?,
            },
            download_clients: definition::from_remote(
                ctx,
                &download_clients::RESOURCES,
                &tree("download_clients"),
            )
            .context("Failed to read download clients")?,
            notifications: definition::from_remote(
                ctx,
                &notifications::RESOURCES,
                &tree("notifications"),
            )
            .context("Failed to read notifications")?,
            ui: ui::from_remote(ctx).context("Failed to read UI settings")?,
        })
    }

    /// Create and update remote resources to match this configuration.
    ///
    /// Every category runs, in dependency order, even when an earlier one
    /// changed something. The first error stops the pass.
    pub fn update_remote(&self, ctx: &SyncContext<'_>, remote: &Settings) -> Result<Summary> {
        let mut summary = Summary::default();
        summary.merge(&tags::update_remote(ctx, &self.tags)?);
        summary.merge(&sync_profiles::update_remote(
            ctx,
            &tree("apps.sync_profiles"),
            &self.apps.sync_profiles,
            &remote.apps.sync_profiles,
        )?);
        summary.merge(&definition::update_remote(
            ctx,
            &applications::RESOURCES,
            &tree("apps.applications"),
            &self.apps.applications,
            &remote.apps.applications,
        )?);
        summary.merge(&definition::update_remote(
            ctx,
            &proxies::RESOURCES,
            &tree("indexers.proxies"),
            &self.indexers.proxies,
            &remote.indexers.proxies,
        )?);
        summary.merge(&indexers::update_remote(
            ctx,
            &tree("indexers.indexers"),
            &self.indexers.indexers,
            &remote.indexers.indexers,
        )?);
        summary.merge(&definition::update_remote(
            ctx,
            &download_clients::RESOURCES,
            &tree("download_clients"),
            &self.download_clients,
            &remote.download_clients,
        )?);
        summary.merge(&definition::update_remote(
            ctx,
            &notifications::RESOURCES,
            &tree("notifications"),
            &self.notifications,
            &remote.notifications,
        )?);
        summary.merge(&ui::update_remote(ctx, &tree("ui"), &self.ui)?);
        Ok(summary)
    }

    /// Delete remote resources with no local definition, in reverse
    /// dependency order, for every collection with `delete_unmanaged` set.
    ///
    /// Tags are never deleted.
    pub fn delete_remote(&self, ctx: &SyncContext<'_>, remote: &Settings) -> Result<Summary> {
        let mut summary = Summary::default();
        summary.merge(&definition::delete_remote(
            ctx,
            &notifications::RESOURCES,
            &tree("notifications"),
            &self.notifications,
            &remote.notifications,
        )?);
        summary.merge(&definition::delete_remote(
            ctx,
            &download_clients::RESOURCES,
            &tree("download_clients"),
            &self.download_clients,
            &remote.download_clients,
        )?);
        summary.merge(&indexers::delete_remote(
            ctx,
            &tree("indexers.indexers"),
            &self.indexers.indexers,
            &remote.indexers.indexers,
        )?);
        summary.merge(&definition::delete_remote(
            ctx,
            &proxies::RESOURCES,
            &tree("indexers.proxies"),
            &self.indexers.proxies,
            &remote.indexers.proxies,
        )?);
        summary.merge(&definition::delete_remote(
            ctx,
            &applications::RESOURCES,
            &tree("apps.applications"),
            &self.apps.applications,
            &remote.apps.applications,
        )?);
        summary.merge(&sync_profiles::delete_remote(
            ctx,
            &tree("apps.sync_profiles"),
            &self.apps.sync_profiles,
            &remote.apps.sync_profiles,
        )?);
        Ok(summary)
    }
}

// ============================================================================
// Remote helpers
// ============================================================================

/// Key remote resources by their `name`.
pub(crate) fn by_name(objects: Vec<Value>) -> IndexMap<String, Value> {
    objects
        .into_iter()
        .filter_map(|object| {
            let name = object.get("name")?.as_str()?.to_string();
            Some((name, object))
        })
        .collect()
}

pub(crate) fn remote_id(object: &Value) -> Result<i64> {
    object
        .get("id")
        .and_then(Value::as_i64)
        .context("remote resource has no 'id'")
}

/// `(label, id)` pairs of the remote tags.
pub(crate) fn tag_lookups(client: &Client) -> Result<Vec<(String, i64)>> {
    Ok(client
        .get_list(TAG_PATH)?
        .iter()
        .filter_map(|tag| Some((tag.get("label")?.as_str()?.to_string(), tag.get("id")?.as_i64()?)))
        .collect())
}

/// `(name, id)` pairs of the indexer categories, sub-categories included.
pub(crate) fn category_lookups(client: &Client) -> Result<Vec<(String, i64)>> {
    fn entry(category: &Value) -> Option<(String, i64)> {
        Some((
            category.get("name")?.as_str()?.to_string(),
            category.get("id")?.as_i64()?,
        ))
    }
    let mut out = Vec::new();
    for category in client.get_list(CATEGORIES_PATH)? {
        out.extend(entry(&category));
        if let Some(subs) = category.get("subCategories").and_then(Value::as_array) {
            out.extend(subs.iter().filter_map(entry));
        }
    }
    Ok(out)
}

/// Remote resources of one endpoint, fetched on first use.
pub(crate) struct RemoteObjects {
    path: &'static str,
    objects: Option<IndexMap<String, Value>>,
}

impl RemoteObjects {
    pub(crate) fn new(path: &'static str) -> Self {
        Self {
            path,
            objects: None,
        }
    }

    pub(crate) fn get(&mut self, client: &Client, name: &str) -> Result<&Value> {
        let objects = match self.objects.take() {
            Some(objects) => objects,
            None => by_name(client.get_list(self.path)?),
        };
        self.objects
            .insert(objects)
            .get(name)
            .with_context(|| format!("'{name}' not found at {}", client.url(self.path)))
    }
}

// ============================================================================
// Secret maps
// ============================================================================

pub(crate) fn serialize_secrets<S: Serializer>(
    secrets: &IndexMap<String, SecretString>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(secrets.iter().map(|(k, v)| (k, v.expose_secret())))
}

pub(crate) fn deserialize_secrets<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, SecretString>, D::Error> {
    let plain = IndexMap::<String, String>::deserialize(deserializer)?;
    Ok(plain
        .into_iter()
        .map(|(k, v)| (k, SecretString::from(v)))
        .collect())
}

/// Drop `null` entries recursively, for notations that cannot express them.
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other,
    }
}
