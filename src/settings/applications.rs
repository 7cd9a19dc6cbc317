//! Applications Prowlarr pushes its indexers to.
//!
//! Sync categories are named locally and resolved through the select options
//! of the `syncCategories` schema field. Radarr and Sonarr may name a linked
//! instance instead of carrying an API key.

use super::SyncContext;
use super::definition::Resources;
use anyhow::{Result, bail};
use declarative::{
    Attr, Choices, Fallback, Field, Kind, Lookups, Raw, Registry, TypeSpec, Version, field,
    fields_of, local, top,
};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};

const SYNC_LEVEL: Choices = &[
    ("disabled", Raw::Str("disabled")),
    ("add-and-remove-only", Raw::Str("addOnly")),
    ("full-sync", Raw::Str("fullSync")),
];

const SYNC_CATEGORIES: Kind = Kind::NameSet("sync_categories");

const BOOKS: &[&str] = &[
    "Books/Mags",
    "Books/EBook",
    "Books/Comics",
    "Books/Technical",
    "Books/Other",
    "Books/Foreign",
];

const LIDARR_CATEGORIES: &[&str] = &[
    "Audio/MP3",
    "Audio/Audiobook",
    "Audio/Lossless",
    "Audio/Other",
    "Audio/Foreign",
];

const MYLAR_CATEGORIES: &[&str] = &["Books/Comics"];

const RADARR_CATEGORIES: &[&str] = &[
    "Movies/Foreign",
    "Movies/Other",
    "Movies/SD",
    "Movies/HD",
    "Movies/UHD",
    "Movies/BluRay",
    "Movies/3D",
    "Movies/DVD",
    "Movies/WEB-DL",
];

const READARR_CATEGORIES: &[&str] = &[
    "Audio/Audiobook",
    "Books/Mags",
    "Books/EBook",
    "Books/Comics",
    "Books/Technical",
    "Books/Other",
    "Books/Foreign",
];

const SONARR_CATEGORIES: &[&str] = &[
    "TV/WEB-DL",
    "TV/Foreign",
    "TV/SD",
    "TV/HD",
    "TV/UHD",
    "TV/Other",
];

const WHISPARR_CATEGORIES: &[&str] = &[
    "XXX/DVD",
    "XXX/WMV",
    "XXX/XviD",
    "XXX/x264",
    "XXX/Pack",
    "XXX/Other",
    "XXX/SD",
    "XXX/WEB-DL",
];

fn base(categories: &'static [&'static str]) -> Vec<Attr> {
    vec![
        field("prowlarr_url", "prowlarrUrl", Kind::Str, Fallback::Required),
        field("base_url", "baseUrl", Kind::Str, Fallback::Required),
        top(
            "sync_level",
            "syncLevel",
            Kind::Choice(SYNC_LEVEL),
            Fallback::Str("add-and-remove-only"),
        ),
        field(
            "sync_categories",
            "syncCategories",
            SYNC_CATEGORIES,
            Fallback::Strs(categories),
        ),
        top("tags", "tags", Kind::IdSet("tags"), Fallback::Empty),
    ]
}

fn with_api_key(categories: &'static [&'static str]) -> Vec<Attr> {
    let mut attrs = base(categories);
    attrs.push(field("api_key", "apiKey", Kind::Secret, Fallback::Required));
    attrs
}

/// An API key, or the name of a linked instance to take it from.
fn with_linked_api_key(categories: &'static [&'static str]) -> Vec<Attr> {
    let mut attrs = base(categories);
    attrs.extend([
        local("instance_name", Kind::OptStr, Fallback::Null),
        field("api_key", "apiKey", Kind::OptSecret, Fallback::Null),
    ]);
    attrs
}

fn lazylibrarian(_: Option<&Version>) -> Vec<Attr> {
    with_api_key(BOOKS)
}

fn lidarr(_: Option<&Version>) -> Vec<Attr> {
    with_api_key(LIDARR_CATEGORIES)
}

fn mylar(_: Option<&Version>) -> Vec<Attr> {
    with_api_key(MYLAR_CATEGORIES)
}

fn radarr(_: Option<&Version>) -> Vec<Attr> {
    with_linked_api_key(RADARR_CATEGORIES)
}

fn readarr(_: Option<&Version>) -> Vec<Attr> {
    with_api_key(READARR_CATEGORIES)
}

fn sonarr(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = with_linked_api_key(SONARR_CATEGORIES);
    attrs.extend([
        field(
            "anime_sync_categories",
            "animeSyncCategories",
            SYNC_CATEGORIES,
            Fallback::Strs(&["TV/Anime"]),
        ),
        field(
            "sync_anime_standard_format_search",
            "syncAnimeStandardFormatSearch",
            Kind::Bool,
            Fallback::Bool(false),
        ),
    ]);
    attrs
}

fn whisparr(_: Option<&Version>) -> Vec<Attr> {
    with_api_key(WHISPARR_CATEGORIES)
}

fn check_linked_api_key(attrs: &Map<String, Value>) -> Result<(), String> {
    if attrs.get("api_key").is_none_or(Value::is_null)
        && attrs.get("instance_name").is_none_or(Value::is_null)
    {
        return Err("api_key: required when 'instance_name' is not defined".to_string());
    }
    Ok(())
}

static TYPES: &[TypeSpec] = &[
    TypeSpec {
        name: "lazylibrarian",
        aliases: &["lazylibrary"],
        implementation: "LazyLibrarian",
        attrs: lazylibrarian,
        check: None,
    },
    TypeSpec {
        name: "lidarr",
        aliases: &[],
        implementation: "Lidarr",
        attrs: lidarr,
        check: None,
    },
    TypeSpec {
        name: "mylar",
        aliases: &[],
        implementation: "Mylar",
        attrs: mylar,
        check: None,
    },
    TypeSpec {
        name: "radarr",
        aliases: &[],
        implementation: "Radarr",
        attrs: radarr,
        check: Some(check_linked_api_key),
    },
    TypeSpec {
        name: "readarr",
        aliases: &[],
        implementation: "Readarr",
        attrs: readarr,
        check: None,
    },
    TypeSpec {
        name: "sonarr",
        aliases: &[],
        implementation: "Sonarr",
        attrs: sonarr,
        check: Some(check_linked_api_key),
    },
    TypeSpec {
        name: "whisparr",
        aliases: &[],
        implementation: "Whisparr",
        attrs: whisparr,
        check: None,
    },
];

/// Sync category names come from the schema's select options.
fn sync_category_lookups(schemas: &[Value], lookups: &mut Lookups) {
    let mut entries: Vec<(String, i64)> = Vec::new();
    for schema in schemas {
        for field in fields_of(schema)
            .into_iter()
            .filter(|f| matches!(f.name(), "syncCategories" | "animeSyncCategories"))
        {
            entries.extend(options(&field));
        }
    }
    lookups.insert("sync_categories", entries);
}

fn options(field: &Field<'_>) -> Vec<(String, i64)> {
    field
        .options()
        .into_iter()
        .filter_map(|option| Some((option.name.to_lowercase(), option.value.as_i64()?)))
        .collect()
}

/// Take the API key from the linked instance when only `instance_name` is set.
fn resolve_linked_api_key(
    ctx: &SyncContext<'_>,
    spec: &TypeSpec,
    attrs: &mut Map<String, Value>,
) -> Result<()> {
    if attrs.get("api_key").is_some_and(|key| !key.is_null()) {
        return Ok(());
    }
    let Some(instance) = attrs.get("instance_name").and_then(Value::as_str) else {
        return Ok(());
    };
    let Some(api_key) = ctx.links.api_key(spec.name, instance) else {
        bail!(
            "Unable to find the API key of the {} instance '{instance}' in the configured links",
            spec.name
        );
    };
    attrs.insert(
        "api_key".to_string(),
        Value::from(api_key.expose_secret()),
    );
    Ok(())
}

pub static RESOURCES: Resources = Resources {
    registry: Registry {
        category: "application",
        types: TYPES,
    },
    path: "/api/v1/applications",
    categories: false,
    schema_lookups: Some(sync_category_lookups),
    resolve: Some(resolve_linked_api_key),
};
