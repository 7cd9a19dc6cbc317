//! Notification connections.

use super::definition::Resources;
use declarative::{
    Attr, Choices, Fallback, Kind, Raw, Registry, TypeSpec, Version, field, top,
};
use serde_json::{Map, Value};

const PORT: Kind = Kind::Int { min: 1, max: 65535 };

/// Service version that replaced `requireEncryption` with `useEncryption`.
const USE_ENCRYPTION_SINCE: [u64; 4] = [1, 13, 1, 4243];

const EMAIL_ENCRYPTION: Choices = &[
    ("always", Raw::Int(0)),
    ("preferred", Raw::Int(1)),
    ("never", Raw::Int(2)),
];

const DISCORD_GRAB_FIELDS: Choices = &[
    ("overview", Raw::Int(0)),
    ("rating", Raw::Int(1)),
    ("genres", Raw::Int(2)),
    ("quality", Raw::Int(3)),
    ("group", Raw::Int(4)),
    ("size", Raw::Int(5)),
    ("links", Raw::Int(6)),
    ("release", Raw::Int(7)),
    ("poster", Raw::Int(8)),
    ("fanart", Raw::Int(9)),
];

const DISCORD_IMPORT_FIELDS: Choices = &[
    ("overview", Raw::Int(0)),
    ("rating", Raw::Int(1)),
    ("genres", Raw::Int(2)),
    ("quality", Raw::Int(3)),
    ("codecs", Raw::Int(4)),
    ("group", Raw::Int(5)),
    ("size", Raw::Int(6)),
    ("languages", Raw::Int(7)),
    ("subtitles", Raw::Int(8)),
    ("links", Raw::Int(9)),
    ("release", Raw::Int(10)),
    ("poster", Raw::Int(11)),
    ("fanart", Raw::Int(12)),
];

const GOTIFY_PRIORITY: Choices = &[
    ("min", Raw::Int(0)),
    ("low", Raw::Int(2)),
    ("normal", Raw::Int(5)),
    ("high", Raw::Int(8)),
];

/// Join, Prowl and Pushover share one priority scale.
const PUSH_PRIORITY: Choices = &[
    ("silent", Raw::Int(-2)),
    ("quiet", Raw::Int(-1)),
    ("normal", Raw::Int(0)),
    ("high", Raw::Int(1)),
    ("emergency", Raw::Int(2)),
];

const PROWL_PRIORITY: Choices = &[
    ("verylow", Raw::Int(-2)),
    ("low", Raw::Int(-1)),
    ("normal", Raw::Int(0)),
    ("high", Raw::Int(1)),
    ("emergency", Raw::Int(2)),
];

const NTFY_PRIORITY: Choices = &[
    ("min", Raw::Int(1)),
    ("low", Raw::Int(2)),
    ("default", Raw::Int(3)),
    ("high", Raw::Int(4)),
    ("max", Raw::Int(5)),
];

const WEBHOOK_METHOD: Choices = &[("post", Raw::Int(1)), ("put", Raw::Int(2))];

fn base() -> Vec<Attr> {
    vec![
        top(
            "notification_triggers.on_health_issue",
            "onHealthIssue",
            Kind::Bool,
            Fallback::Bool(false),
        ),
        top(
            "notification_triggers.include_health_warnings",
            "includeHealthWarnings",
            Kind::Bool,
            Fallback::Bool(false),
        ),
        top(
            "notification_triggers.on_application_update",
            "onApplicationUpdate",
            Kind::Bool,
            Fallback::Bool(false),
        ),
        top("tags", "tags", Kind::IdSet("tags"), Fallback::Empty),
    ]
}

fn with(attrs: impl IntoIterator<Item = Attr>) -> Vec<Attr> {
    let mut out = base();
    out.extend(attrs);
    out
}

fn secret(name: &'static str, remote: &'static str) -> Attr {
    field(name, remote, Kind::Secret, Fallback::Required)
}

fn required(name: &'static str, remote: &'static str) -> Attr {
    field(name, remote, Kind::Str, Fallback::Required)
}

fn optional(name: &'static str, remote: &'static str) -> Attr {
    field(name, remote, Kind::OptStr, Fallback::Null)
}

fn recipients(remote: &'static str) -> Attr {
    field("recipient_addresses", remote, Kind::StrSet, Fallback::Required)
}

fn apprise(_: Option<&Version>) -> Vec<Attr> {
    with([
        required("base_url", "baseUrl"),
        field(
            "configuration_key",
            "configurationKey",
            Kind::OptSecret,
            Fallback::Null,
        ),
        field(
            "stateless_urls",
            "statelessUrls",
            Kind::CommaSet,
            Fallback::Empty,
        ),
        field("apprise_tags", "tags", Kind::StrSet, Fallback::Empty),
        optional("auth_username", "authUsername"),
        field(
            "auth_password",
            "authPassword",
            Kind::OptSecret,
            Fallback::Null,
        ),
    ])
}

fn boxcar(_: Option<&Version>) -> Vec<Attr> {
    with([secret("access_token", "token")])
}

fn customscript(_: Option<&Version>) -> Vec<Attr> {
    with([required("path", "path")])
}

fn discord(_: Option<&Version>) -> Vec<Attr> {
    with([
        required("webhook_url", "webHookUrl"),
        optional("username", "username"),
        optional("avatar", "avatar"),
        optional("host", "host"),
        field(
            "on_grab_fields",
            "grabFields",
            Kind::ChoiceSet(DISCORD_GRAB_FIELDS),
            Fallback::Strs(&[
                "overview", "rating", "genres", "quality", "size", "links", "release", "poster",
                "fanart",
            ]),
        ),
        field(
            "on_import_fields",
            "importFields",
            Kind::ChoiceSet(DISCORD_IMPORT_FIELDS),
            Fallback::Strs(&[
                "overview",
                "rating",
                "genres",
                "quality",
                "codecs",
                "group",
                "size",
                "languages",
                "subtitles",
                "links",
                "release",
                "poster",
                "fanart",
            ]),
        ),
    ])
}

fn email(version: Option<&Version>) -> Vec<Attr> {
    let use_encryption = version.is_none_or(|v| *v >= Version::new(USE_ENCRYPTION_SINCE));
    let encryption = if use_encryption {
        field(
            "use_encryption",
            "useEncryption",
            Kind::Choice(EMAIL_ENCRYPTION),
            Fallback::Str("always"),
        )
    } else {
        field(
            "use_encryption",
            "requireEncryption",
            Kind::ChoiceFlag {
                on: "always",
                off: "preferred",
                choices: EMAIL_ENCRYPTION,
            },
            Fallback::Str("always"),
        )
    };
    with([
        required("server", "server"),
        field("port", "port", PORT, Fallback::Int(587)),
        encryption,
        required("username", "username"),
        secret("password", "password"),
        required("from_address", "from"),
        recipients("to"),
        field("cc_addresses", "cc", Kind::StrSet, Fallback::Empty),
        field("bcc_addresses", "bcc", Kind::StrSet, Fallback::Empty),
    ])
}

/// At least one recipient, each an address.
fn check_recipients(attrs: &Map<String, Value>) -> Result<(), String> {
    let recipients = attrs
        .get("recipient_addresses")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if recipients.is_empty() {
        return Err("'recipient_addresses' must contain at least one address".to_string());
    }
    let invalid = attrs
        .get("from_address")
        .into_iter()
        .chain(recipients)
        .filter_map(Value::as_str)
        .find(|address| !address.contains('@'));
    match invalid {
        Some(address) => Err(format!("'{address}' is not an email address")),
        None => Ok(()),
    }
}

fn gotify(_: Option<&Version>) -> Vec<Attr> {
    with([
        required("server", "server"),
        secret("app_token", "appToken"),
        field(
            "priority",
            "priority",
            Kind::Choice(GOTIFY_PRIORITY),
            Fallback::Str("normal"),
        ),
    ])
}

fn join(_: Option<&Version>) -> Vec<Attr> {
    with([
        secret("api_key", "apiKey"),
        field(
            "device_names",
            "deviceNames",
            Kind::CommaSet,
            Fallback::Empty,
        ),
        field(
            "priority",
            "priority",
            Kind::Choice(PUSH_PRIORITY),
            Fallback::Str("normal"),
        ),
    ])
}

fn mailgun(_: Option<&Version>) -> Vec<Attr> {
    with([
        secret("api_key", "apiKey"),
        field(
            "use_eu_endpoint",
            "useEuEndpoint",
            Kind::Bool,
            Fallback::Bool(false),
        ),
        required("from_address", "from"),
        required("sender_domain", "senderDomain"),
        recipients("recipients"),
    ])
}

fn notifiarr(_: Option<&Version>) -> Vec<Attr> {
    with([secret("api_key", "apiKey")])
}

fn ntfy(_: Option<&Version>) -> Vec<Attr> {
    with([
        optional("server_url", "serverUrl"),
        optional("username", "userName"),
        field("password", "password", Kind::OptSecret, Fallback::Null),
        field(
            "priority",
            "priority",
            Kind::Choice(NTFY_PRIORITY),
            Fallback::Str("default"),
        ),
        field("topics", "topics", Kind::StrSet, Fallback::Empty),
        field("ntfy_tags", "tags", Kind::StrSet, Fallback::Empty),
        optional("click_url", "clickUrl"),
    ])
}

fn prowl(_: Option<&Version>) -> Vec<Attr> {
    with([
        secret("api_key", "apiKey"),
        field(
            "priority",
            "priority",
            Kind::Choice(PROWL_PRIORITY),
            Fallback::Str("normal"),
        ),
    ])
}

fn pushbullet(_: Option<&Version>) -> Vec<Attr> {
    with([
        secret("api_key", "apiKey"),
        field("device_ids", "deviceIds", Kind::StrList, Fallback::Empty),
        field("channel_tags", "channelTags", Kind::StrList, Fallback::Empty),
        optional("sender_id", "senderId"),
    ])
}

fn pushover(_: Option<&Version>) -> Vec<Attr> {
    with([
        secret("user_key", "userKey"),
        secret("api_key", "apiKey"),
        field("devices", "devices", Kind::StrSet, Fallback::Empty),
        field(
            "priority",
            "priority",
            Kind::Choice(PUSH_PRIORITY),
            Fallback::Str("normal"),
        ),
        field(
            "retry",
            "retry",
            Kind::Int { min: 0, max: i64::MAX },
            Fallback::Int(0),
        ),
        field(
            "expire",
            "expire",
            Kind::Int { min: 0, max: 86400 },
            Fallback::Int(0),
        ),
        optional("sound", "sound"),
    ])
}

fn check_pushover(attrs: &Map<String, Value>) -> Result<(), String> {
    match attrs.get("retry").and_then(Value::as_i64) {
        Some(retry) if retry != 0 && retry < 30 => Err(format!(
            "'retry' must be 0 or at least 30 seconds, got {retry}"
        )),
        _ => Ok(()),
    }
}

fn sendgrid(_: Option<&Version>) -> Vec<Attr> {
    with([
        secret("api_key", "apiKey"),
        required("from_address", "from"),
        recipients("recipients"),
    ])
}

fn slack(_: Option<&Version>) -> Vec<Attr> {
    with([
        required("webhook_url", "webHookUrl"),
        required("username", "username"),
        optional("icon", "icon"),
        optional("channel", "channel"),
    ])
}

fn telegram(_: Option<&Version>) -> Vec<Attr> {
    with([
        secret("bot_token", "botToken"),
        required("chat_id", "chatId"),
        field(
            "send_silently",
            "sendSilently",
            Kind::Bool,
            Fallback::Bool(false),
        ),
    ])
}

fn twitter(_: Option<&Version>) -> Vec<Attr> {
    with([
        secret("consumer_key", "consumerKey"),
        secret("consumer_secret", "consumerSecret"),
        secret("access_token", "accessToken"),
        secret("access_token_secret", "accessTokenSecret"),
        required("mention", "mention"),
        field(
            "direct_message",
            "directMessage",
            Kind::Bool,
            Fallback::Bool(true),
        ),
    ])
}

fn webhook(_: Option<&Version>) -> Vec<Attr> {
    with([
        required("url", "url"),
        field(
            "method",
            "method",
            Kind::Choice(WEBHOOK_METHOD),
            Fallback::Str("post"),
        ),
        required("username", "username"),
        secret("password", "password"),
    ])
}

const fn spec(
    name: &'static str,
    implementation: &'static str,
    attrs: fn(Option<&Version>) -> Vec<Attr>,
) -> TypeSpec {
    TypeSpec {
        name,
        aliases: &[],
        implementation,
        attrs,
        check: None,
    }
}

static TYPES: &[TypeSpec] = &[
    spec("apprise", "Apprise", apprise),
    spec("boxcar", "Boxcar", boxcar),
    spec("customscript", "CustomScript", customscript),
    spec("discord", "Discord", discord),
    TypeSpec {
        check: Some(check_recipients),
        ..spec("email", "Email", email)
    },
    spec("gotify", "Gotify", gotify),
    spec("join", "Join", join),
    TypeSpec {
        check: Some(check_recipients),
        ..spec("mailgun", "Mailgun", mailgun)
    },
    spec("notifiarr", "Notifiarr", notifiarr),
    spec("ntfy", "Ntfy", ntfy),
    spec("prowl", "Prowl", prowl),
    spec("pushbullet", "Pushbullet", pushbullet),
    TypeSpec {
        check: Some(check_pushover),
        ..spec("pushover", "Pushover", pushover)
    },
    TypeSpec {
        check: Some(check_recipients),
        ..spec("sendgrid", "SendGrid", sendgrid)
    },
    spec("slack", "Slack", slack),
    spec("telegram", "Telegram", telegram),
    spec("twitter", "Twitter", twitter),
    spec("webhook", "Webhook", webhook),
];

pub static RESOURCES: Resources = Resources {
    registry: Registry {
        category: "notification",
        types: TYPES,
    },
    path: "/api/v1/notification",
    categories: false,
    schema_lookups: None,
    resolve: None,
};
