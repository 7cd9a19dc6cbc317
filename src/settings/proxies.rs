//! Indexer proxies.

use super::definition::Resources;
use declarative::{Attr, Fallback, Kind, Registry, TypeSpec, Version, field, top};

const PORT: Kind = Kind::Int { min: 1, max: 65535 };

fn base() -> Vec<Attr> {
    vec![top("tags", "tags", Kind::IdSet("tags"), Fallback::Empty)]
}

fn flaresolverr(_: Option<&Version>) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend([
        field("host_url", "host", Kind::Str, Fallback::Required),
        field(
            "request_timeout",
            "requestTimeout",
            Kind::Int { min: 1, max: i64::MAX },
            Fallback::Int(60),
        ),
    ]);
    attrs
}

fn socket(default_port: i64) -> Vec<Attr> {
    let mut attrs = base();
    attrs.extend([
        field("hostname", "host", Kind::Str, Fallback::Required),
        field("port", "port", PORT, Fallback::Int(default_port)),
        field("username", "username", Kind::OptStr, Fallback::Null),
        field("password", "password", Kind::OptSecret, Fallback::Null),
    ]);
    attrs
}

fn http(_: Option<&Version>) -> Vec<Attr> {
    socket(8080)
}

fn socks(_: Option<&Version>) -> Vec<Attr> {
    socket(1080)
}

static TYPES: &[TypeSpec] = &[
    TypeSpec {
        name: "flaresolverr",
        aliases: &[],
        implementation: "FlareSolverr",
        attrs: flaresolverr,
        check: None,
    },
    TypeSpec {
        name: "http",
        aliases: &[],
        implementation: "Http",
        attrs: http,
        check: None,
    },
    TypeSpec {
        name: "socks4",
        aliases: &[],
        implementation: "Socks4",
        attrs: socks,
        check: None,
    },
    TypeSpec {
        name: "socks5",
        aliases: &[],
        implementation: "Socks5",
        attrs: socks,
        check: None,
    },
];

pub static RESOURCES: Resources = Resources {
    registry: Registry {
        category: "indexer proxy",
        types: TYPES,
    },
    path: "/api/v1/indexerproxy",
    categories: false,
    schema_lookups: None,
    resolve: None,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::definition::{
        Definition, delete_remote, from_remote, normalize_collection, update_remote,
    };
    use crate::settings::testing::{self, client, context, writes};
    use crate::settings::{TAG_PATH, tree};
    use declarative::{Collection, Error as MappingError};
    use serde_json::{Value, json};

    const PATH: &str = "/api/v1/indexerproxy";

    fn text(name: &str, value: Value) -> Value {
        json!({"name": name, "type": "textbox", "value": value})
    }

    fn http_schema() -> Value {
        json!({
            "id": 0,
            "name": "",
            "implementation": "Http",
            "configContract": "HttpSettings",
            "tags": [],
            "fields": [
                text("host", json!("")),
                json!({"name": "port", "type": "number", "value": 8080}),
                text("username", json!("")),
                json!({"name": "password", "type": "password", "value": ""}),
                json!({"name": "help", "type": "info", "value": "Proxy help"}),
            ],
        })
    }

    fn socks5_schema() -> Value {
        let mut schema = http_schema();
        schema["implementation"] = json!("Socks5");
        schema["configContract"] = json!("Socks5Settings");
        schema["fields"][1]["value"] = json!(1080);
        schema
    }

    fn remote_http(id: i64, name: &str, host: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "implementation": "Http",
            "configContract": "HttpSettings",
            "tags": [1],
            "fields": [
                text("host", json!(host)),
                json!({"name": "port", "type": "number", "value": 8080}),
                text("username", json!("")),
                json!({"name": "password", "type": "password", "value": ""}),
            ],
        })
    }

    fn instance(remote: &[Value]) -> prowlarr::MockTransport {
        let schema_path = format!("{PATH}/schema");
        testing::instance(&[
            (PATH, Value::Array(remote.to_vec())),
            (schema_path.as_str(), json!([http_schema(), socks5_schema()])),
            (TAG_PATH, json!([{"id": 1, "label": "private"}])),
        ])
    }

    fn local(entries: Value) -> Collection<Definition> {
        let mut collection: Collection<Definition> = serde_json::from_value(entries).unwrap();
        normalize_collection(&mut collection, &RESOURCES.registry, &tree("indexers.proxies")).unwrap();
        collection
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let collection = local(json!({"definitions": {"Proxy": {"type": "SOCKS5", "hostname": "vpn"}}}));
        let proxy = &collection.definitions["Proxy"];
        assert_eq!(proxy.kind, "socks5");
        assert_eq!(proxy.attrs["port"], json!(1080));
        assert_eq!(proxy.attrs["tags"], json!([]));
        assert_eq!(proxy.attrs["password"], Value::Null);
    }

    #[test]
    fn test_normalize_rejects_unknown_type_and_attribute() {
        let mut collection: Collection<Definition> =
            serde_json::from_value(json!({"definitions": {"P": {"type": "socks6", "hostname": "vpn"}}}))
                .unwrap();
        let err = normalize_collection(&mut collection, &RESOURCES.registry, "t").unwrap_err();
        assert!(matches!(err, MappingError::UnsupportedType { .. }));

        let mut collection: Collection<Definition> = serde_json::from_value(
            json!({"definitions": {"P": {"type": "http", "hostname": "vpn", "hostnme": "x"}}}),
        )
        .unwrap();
        let err = normalize_collection(&mut collection, &RESOURCES.registry, "t").unwrap_err();
        assert_eq!(err.to_string(), "t.definitions['P'].hostnme: unknown attribute");
    }

    #[test]
    fn test_from_remote() {
        let mock = instance(&[remote_http(3, "Proxy", "vpn")]);
        let client = client(&mock);
        let remote = from_remote(&context(&client), &RESOURCES, "t").unwrap();

        let proxy = &remote.definitions["Proxy"];
        assert_eq!(proxy.kind, "http");
        assert_eq!(proxy.attrs["hostname"], json!("vpn"));
        assert_eq!(proxy.attrs["port"], json!(8080));
        assert_eq!(proxy.attrs["username"], Value::Null);
        assert_eq!(proxy.attrs["tags"], json!(["private"]));
    }

    #[test]
    fn test_from_remote_skips_unsupported_implementation() {
        let mut unknown = remote_http(4, "Other", "vpn");
        unknown["implementation"] = json!("Tor");
        let mock = instance(&[unknown]);
        let client = client(&mock);
        let remote = from_remote(&context(&client), &RESOURCES, "t").unwrap();
        assert!(remote.is_empty());
    }

    #[test]
    fn test_create_overlays_schema_template() {
        let mock = instance(&[]);
        let client = client(&mock);
        let ctx = context(&client);
        let local = local(json!({"definitions": {"Proxy": {"type": "http", "hostname": "vpn", "tags": ["private"]}}}));

        let summary = update_remote(&ctx, &RESOURCES, "t", &local, &Collection::default()).unwrap();

        assert_eq!(summary.created, 1);
        let body = mock.writes()[0].body.clone().unwrap();
        assert_eq!(body["name"], json!("Proxy"));
        assert_eq!(body["configContract"], json!("HttpSettings"));
        assert_eq!(body["tags"], json!([1]));
        assert!(body.get("id").is_none());
        let fields = body["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 4, "info fields are dropped");
        assert_eq!(fields[0]["value"], json!("vpn"));
        assert_eq!(fields[2]["value"], json!(""));
    }

    #[test]
    fn test_update_without_changes_makes_no_call() {
        let mock = instance(&[remote_http(3, "Proxy", "vpn")]);
        let client = client(&mock);
        let ctx = context(&client);
        let remote = from_remote(&ctx, &RESOURCES, "t").unwrap();
        let local = local(json!({"definitions": {"Proxy": {"type": "http", "hostname": "vpn", "tags": ["private"]}}}));

        let summary = update_remote(&ctx, &RESOURCES, "t", &local, &remote).unwrap();

        assert_eq!(summary.unchanged, 1);
        assert!(writes(&mock).is_empty());
    }

    #[test]
    fn test_update_sends_only_the_changed_field() {
        let mock = instance(&[remote_http(3, "Proxy", "vpn")]);
        let client = client(&mock);
        let ctx = context(&client);
        let remote = from_remote(&ctx, &RESOURCES, "t").unwrap();
        let local = local(json!({"definitions": {"Proxy": {"type": "http", "hostname": "vpn2", "tags": ["private"]}}}));

        let summary = update_remote(&ctx, &RESOURCES, "t", &local, &remote).unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(writes(&mock), vec![format!("PUT {PATH}/3")]);
        let body = mock.writes()[0].body.clone().unwrap();
        assert_eq!(body, remote_http(3, "Proxy", "vpn2"));
    }

    #[test]
    fn test_type_change_is_an_update() {
        let mock = instance(&[remote_http(3, "Proxy", "vpn")]);
        let client = client(&mock);
        let ctx = context(&client);
        let remote = from_remote(&ctx, &RESOURCES, "t").unwrap();
        let local = local(json!({"definitions": {"Proxy": {"type": "socks5", "hostname": "vpn"}}}));

        let summary = update_remote(&ctx, &RESOURCES, "t", &local, &remote).unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(writes(&mock), vec![format!("PUT {PATH}/3")]);
        let body = mock.writes()[0].body.clone().unwrap();
        assert_eq!(body["id"], json!(3));
        assert_eq!(body["implementation"], json!("Socks5"));
        assert_eq!(body["fields"][1]["value"], json!(1080));
    }

    #[test]
    fn test_type_without_remote_schema_fails_before_writing() {
        let schema_path = format!("{PATH}/schema");
        let mock = testing::instance(&[(schema_path.as_str(), json!([http_schema()]))]);
        let client = client(&mock);
        let ctx = context(&client);
        let local = local(json!({"definitions": {"Proxy": {"type": "socks4", "hostname": "vpn"}}}));

        let err = update_remote(&ctx, &RESOURCES, "t", &local, &Collection::default()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MappingError>(),
            Some(MappingError::SchemaMismatch { .. })
        ));
        assert!(writes(&mock).is_empty());
    }

    #[test]
    fn test_delete_is_gated_by_delete_unmanaged() {
        let mock = instance(&[remote_http(3, "Old", "vpn"), remote_http(4, "Older", "vpn")]);
        let client = client(&mock);
        let ctx = context(&client);
        let remote = from_remote(&ctx, &RESOURCES, "t").unwrap();

        let mut local = Collection::<Definition>::default();
        let summary = delete_remote(&ctx, &RESOURCES, "t", &local, &remote).unwrap();
        assert_eq!(summary.unmanaged, 2);
        assert!(!summary.has_changes());
        assert!(writes(&mock).is_empty());

        local.delete_unmanaged = true;
        let summary = delete_remote(&ctx, &RESOURCES, "t", &local, &remote).unwrap();
        assert_eq!(summary.deleted, 2);
        assert_eq!(
            writes(&mock),
            vec![format!("DELETE {PATH}/3"), format!("DELETE {PATH}/4")]
        );
    }
}
