//! Download clients, usenet and torrent.
//!
//! Most clients share a connection block (host, port, SSL, URL base and
//! credentials) and can map their own categories onto Prowlarr's indexer
//! categories.

use super::definition::Resources;
use declarative::{
    Attr, Choices, Fallback, Kind, Raw, Registry, TypeSpec, Version, field, top,
};
use serde_json::{Map, Value};

const PORT: Kind = Kind::Int { min: 1, max: 65535 };

const NZBGET_PRIORITY: Choices = &[
    ("verylow", Raw::Int(-100)),
    ("low", Raw::Int(-50)),
    ("normal", Raw::Int(0)),
    ("high", Raw::Int(50)),
    ("veryhigh", Raw::Int(100)),
    ("force", Raw::Int(900)),
];

const NZBVORTEX_PRIORITY: Choices = &[
    ("low", Raw::Int(-1)),
    ("normal", Raw::Int(0)),
    ("high", Raw::Int(1)),
];

const SABNZBD_PRIORITY: Choices = &[
    ("default", Raw::Int(-100)),
    ("paused", Raw::Int(-2)),
    ("low", Raw::Int(-1)),
    ("normal", Raw::Int(0)),
    ("high", Raw::Int(1)),
    ("force", Raw::Int(2)),
];

/// Queue position of new torrents.
const QUEUE_PRIORITY: Choices = &[("last", Raw::Int(0)), ("first", Raw::Int(1))];

const RTORRENT_PRIORITY: Choices = &[
    ("verylow", Raw::Int(0)),
    ("low", Raw::Int(1)),
    ("normal", Raw::Int(2)),
    ("high", Raw::Int(3)),
];

const QBITTORRENT_STATE: Choices = &[
    ("start", Raw::Int(0)),
    ("force-start", Raw::Int(1)),
    ("pause", Raw::Int(2)),
];

const UTORRENT_STATE: Choices = &[
    ("start", Raw::Int(0)),
    ("force-start", Raw::Int(1)),
    ("pause", Raw::Int(2)),
    ("stop", Raw::Int(3)),
];

const FLOOD_TAGS: Choices = &[
    ("title-slug", Raw::Int(0)),
    ("quality", Raw::Int(1)),
    ("language", Raw::Int(2)),
    ("release-group", Raw::Int(3)),
    ("year", Raw::Int(4)),
    ("indexer", Raw::Int(5)),
    ("network", Raw::Int(6)),
];

fn base() -> Vec<Attr> {
    vec![
        top("enable", "enable", Kind::Bool, Fallback::Bool(true)),
        top(
            "priority",
            "priority",
            Kind::Int { min: 1, max: 50 },
            Fallback::Int(1),
        ),
        top("tags", "tags", Kind::IdSet("tags"), Fallback::Empty),
    ]
}

fn host(default_port: i64) -> [Attr; 3] {
    [
        field("host", "host", Kind::Str, Fallback::Required),
        field("port", "port", PORT, Fallback::Int(default_port)),
        field("use_ssl", "useSsl", Kind::Bool, Fallback::Bool(false)),
    ]
}

fn url_base() -> Attr {
    field("url_base", "urlBase", Kind::OptStr, Fallback::Null)
}

fn credentials() -> [Attr; 2] {
    [
        field("username", "username", Kind::Str, Fallback::Required),
        field("password", "password", Kind::Secret, Fallback::Required),
    ]
}

fn optional_credentials() -> [Attr; 2] {
    [
        field("username", "username", Kind::OptStr, Fallback::Null),
        field("password", "password", Kind::OptSecret, Fallback::Null),
    ]
}

fn category(fallback: Fallback) -> Attr {
    field("category", "category", Kind::OptStr, fallback)
}

fn client_priority(remote: &'static str, choices: Choices, default: &'static str) -> Attr {
    field(
        "client_priority",
        remote,
        Kind::Choice(choices),
        Fallback::Str(default),
    )
}

fn flag(name: &'static str, remote: &'static str) -> Attr {
    field(name, remote, Kind::Bool, Fallback::Bool(false))
}

fn category_mappings() -> Attr {
    top(
        "category_mappings",
        "categories",
        Kind::CategoryMappings("categories"),
        Fallback::Empty,
    )
}

fn download_station(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(5000));
    attrs.extend(credentials());
    attrs.extend([
        category(Fallback::Null),
        field("directory", "tvDirectory", Kind::OptStr, Fallback::Null),
    ]);
    attrs
}

// ============================================================================
// Usenet
// ============================================================================

fn nzbget(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(5000));
    attrs.push(url_base());
    attrs.extend(credentials());
    attrs.extend([
        category(Fallback::Null),
        client_priority("priority", NZBGET_PRIORITY, "normal"),
        flag("add_paused", "addPaused"),
        category_mappings(),
    ]);
    attrs
}

fn nzbvortex(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(4321));
    attrs.extend([
        url_base(),
        field("api_key", "apiKey", Kind::Secret, Fallback::Required),
        category(Fallback::Null),
        client_priority("priority", NZBVORTEX_PRIORITY, "normal"),
        category_mappings(),
    ]);
    attrs
}

fn pneumatic(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend([
        field("nzb_folder", "nzbFolder", Kind::Str, Fallback::Required),
        field("strm_folder", "strmFolder", Kind::Str, Fallback::Required),
    ]);
    attrs
}

fn sabnzbd(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(4321));
    attrs.extend([
        url_base(),
        field("api_key", "apiKey", Kind::OptSecret, Fallback::Null),
    ]);
    attrs.extend(optional_credentials());
    attrs.extend([
        category(Fallback::Null),
        client_priority("priority", SABNZBD_PRIORITY, "default"),
        category_mappings(),
    ]);
    attrs
}

fn usenet_blackhole(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.push(field(
        "nzb_folder",
        "nzbFolder",
        Kind::Str,
        Fallback::Required,
    ));
    attrs
}

// ============================================================================
// Torrent
// ============================================================================

fn aria2(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(6800));
    attrs.extend([
        field("rpc_path", "rpcPath", Kind::Str, Fallback::Str("/rpc")),
        field(
            "secret_token",
            "secretToken",
            Kind::Secret,
            Fallback::Required,
        ),
    ]);
    attrs
}

fn deluge(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(8112));
    attrs.extend([
        url_base(),
        field("password", "password", Kind::Secret, Fallback::Required),
        category(Fallback::Str("prowlarr")),
        client_priority("priority", QUEUE_PRIORITY, "last"),
        category_mappings(),
    ]);
    attrs
}

fn flood(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(3000));
    attrs.push(url_base());
    attrs.extend(credentials());
    attrs.extend([
        field("destination", "destination", Kind::OptStr, Fallback::Null),
        field(
            "flood_tags",
            "tags",
            Kind::StrSet,
            Fallback::Strs(&["prowlarr"]),
        ),
        field(
            "additional_tags",
            "additionalTags",
            Kind::ChoiceSet(FLOOD_TAGS),
            Fallback::Empty,
        ),
        flag("add_paused", "addPaused"),
        category_mappings(),
    ]);
    attrs
}

fn freebox(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend([
        field(
            "host",
            "host",
            Kind::Str,
            Fallback::Str("mafreebox.freebox.fr"),
        ),
        field("port", "port", PORT, Fallback::Int(443)),
        field("use_ssl", "useSsl", Kind::Bool, Fallback::Bool(true)),
        field("api_url", "apiUrl", Kind::Str, Fallback::Str("/api/v1")),
        field("app_id", "appId", Kind::Str, Fallback::Required),
        field("app_token", "appToken", Kind::Secret, Fallback::Required),
        field(
            "destination_directory",
            "destinationDirectory",
            Kind::OptStr,
            Fallback::Null,
        ),
        category(Fallback::Null),
        client_priority("priority", QUEUE_PRIORITY, "last"),
        flag("add_paused", "addPaused"),
        category_mappings(),
    ]);
    attrs
}

fn hadouken(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(7070));
    attrs.push(url_base());
    attrs.extend(credentials());
    attrs.extend([
        field("category", "category", Kind::Str, Fallback::Str("prowlarr")),
        category_mappings(),
    ]);
    attrs
}

fn qbittorrent(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(8080));
    attrs.push(url_base());
    attrs.extend(credentials());
    attrs.extend([
        category(Fallback::Str("prowlarr")),
        client_priority("priority", QUEUE_PRIORITY, "last"),
        field(
            "initial_state",
            "initialState",
            Kind::Choice(QBITTORRENT_STATE),
            Fallback::Str("start"),
        ),
        category_mappings(),
    ]);
    attrs
}

fn rtorrent(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(8080));
    attrs.push(field(
        "url_base",
        "urlBase",
        Kind::Str,
        Fallback::Str("RPC2"),
    ));
    attrs.extend(credentials());
    attrs.extend([
        category(Fallback::Str("prowlarr")),
        field("directory", "directory", Kind::OptStr, Fallback::Null),
        client_priority("recentTvPriority", RTORRENT_PRIORITY, "normal"),
        flag("add_stopped", "addStopped"),
        category_mappings(),
    ]);
    attrs
}

fn torrent_blackhole(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend([
        field(
            "torrent_folder",
            "torrentFolder",
            Kind::Str,
            Fallback::Required,
        ),
        flag("save_magnet_files", "saveMagnetFiles"),
        field(
            "magnet_file_extension",
            "magnetFileExtension",
            Kind::Str,
            Fallback::Str(".magnet"),
        ),
    ]);
    attrs
}

fn transmission(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(9091));
    attrs.push(field(
        "url_base",
        "urlBase",
        Kind::Str,
        Fallback::Str("/transmission/"),
    ));
    attrs.extend(optional_credentials());
    attrs.extend([
        category(Fallback::Null),
        field("directory", "directory", Kind::OptStr, Fallback::Null),
        client_priority("priority", QUEUE_PRIORITY, "last"),
        flag("add_paused", "addPaused"),
    ]);
    attrs
}

fn check_transmission(attrs: &Map<String, Value>) -> Result<(), String> {
    let set = |name: &str| attrs.get(name).is_some_and(|v| !v.is_null());
    if set("category") && set("directory") {
        return Err(
            "'directory' and 'category' are mutually exclusive on a Transmission/Vuze download client"
                .to_string(),
        );
    }
    Ok(())
}

fn utorrent(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend(host(8080));
    attrs.push(url_base());
    attrs.extend(credentials());
    attrs.extend([
        category(Fallback::Str("prowlarr")),
        client_priority("priority", QUEUE_PRIORITY, "last"),
        field(
            "initial_state",
            "initialState",
            Kind::Choice(UTORRENT_STATE),
            Fallback::Str("start"),
        ),
        category_mappings(),
    ]);
    attrs
}

static TYPES: &[TypeSpec] = &[
    TypeSpec {
        name: "downloadstation-usenet",
        aliases: &[],
        implementation: "UsenetDownloadStation",
        attrs: download_station,
        check: None,
    },
    TypeSpec {
        name: "nzbget",
        aliases: &[],
        implementation: "Nzbget",
        attrs: nzbget,
        check: None,
    },
    TypeSpec {
        name: "nzbvortex",
        aliases: &[],
        implementation: "NzbVortex",
        attrs: nzbvortex,
        check: None,
    },
    TypeSpec {
        name: "pneumatic",
        aliases: &[],
        implementation: "Pneumatic",
        attrs: pneumatic,
        check: None,
    },
    TypeSpec {
        name: "sabnzbd",
        aliases: &[],
        implementation: "Sabnzbd",
        attrs: sabnzbd,
        check: None,
    },
    TypeSpec {
        name: "usenet-blackhole",
        aliases: &[],
        implementation: "UsenetBlackhole",
        attrs: usenet_blackhole,
        check: None,
    },
    TypeSpec {
        name: "aria2",
        aliases: &[],
        implementation: "Aria2",
        attrs: aria2,
        check: None,
    },
    TypeSpec {
        name: "deluge",
        aliases: &[],
        implementation: "Deluge",
        attrs: deluge,
        check: None,
    },
    TypeSpec {
        name: "downloadstation-torrent",
        aliases: &[],
        implementation: "TorrentDownloadStation",
        attrs: download_station,
        check: None,
    },
    TypeSpec {
        name: "flood",
        aliases: &[],
        implementation: "Flood",
        attrs: flood,
        check: None,
    },
    TypeSpec {
        name: "freebox",
        aliases: &[],
        implementation: "TorrentFreeboxDownload",
        attrs: freebox,
        check: None,
    },
    TypeSpec {
        name: "hadouken",
        aliases: &[],
        implementation: "Hadouken",
        attrs: hadouken,
        check: None,
    },
    TypeSpec {
        name: "qbittorrent",
        aliases: &[],
        implementation: "QBittorrent",
        attrs: qbittorrent,
        check: None,
    },
    TypeSpec {
        name: "rtorrent",
        aliases: &["rutorrent"],
        implementation: "RTorrent",
        attrs: rtorrent,
        check: None,
    },
    TypeSpec {
        name: "torrent-blackhole",
        aliases: &[],
        implementation: "TorrentBlackhole",
        attrs: torrent_blackhole,
        check: None,
    },
    TypeSpec {
        name: "transmission",
        aliases: &[],
        implementation: "Transmission",
        attrs: transmission,
        check: Some(check_transmission),
    },
    TypeSpec {
        name: "utorrent",
        aliases: &[],
        implementation: "UTorrent",
        attrs: utorrent,
        check: None,
    },
    TypeSpec {
        name: "vuze",
        aliases: &[],
        implementation: "Vuze",
        attrs: transmission,
        check: Some(check_transmission),
    },
];

pub static RESOURCES: Resources = Resources {
    registry: Registry {
        category: "download client",
        types: TYPES,
    },
    path: "/api/v1/downloadclient",
    categories: true,
    schema_lookups: None,
    resolve: None,
};
