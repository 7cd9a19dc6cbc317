//! Codec for schema-driven dynamic fields.
//!
//! Remote resources carry a `fields` array whose entries describe themselves:
//! a `name`, a `type` (`textbox`, `checkbox`, `select`, `info`, ...), the
//! current `value`, and for selects either a `selectOptions` table or a
//! `selectOptionsProviderAction` naming where the options come from.
//!
//! [`Field`] is a borrowed view over one such entry. Locally, select values
//! are written as option names; remotely they are option values. The codec
//! translates between the two and compares select names case-insensitively.

use crate::error::{Error, Result, quoted_list};
use serde_json::{Map, Value};

/// Provider action whose options are the resource's `indexerUrls` list.
const URL_PROVIDER: &str = "getUrls";

/// Borrowed view over a single dynamic field entry.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    raw: &'a Map<String, Value>,
}

/// A `(value, name)` pair of a select field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectOption<'a> {
    pub value: &'a Value,
    pub name: &'a str,
}

impl<'a> Field<'a> {
    /// View a JSON value as a field, if it is an object.
    pub fn new(raw: &'a Value) -> Option<Self> {
        raw.as_object().map(|raw| Self { raw })
    }

    pub fn name(&self) -> &'a str {
        self.raw.get("name").and_then(Value::as_str).unwrap_or("")
    }

    /// Field type as reported by the remote (`textbox`, `select`, ...).
    pub fn kind(&self) -> &'a str {
        self.raw.get("type").and_then(Value::as_str).unwrap_or("")
    }

    pub fn value(&self) -> &'a Value {
        self.raw.get("value").unwrap_or(&Value::Null)
    }

    /// Informational fields carry no configurable value.
    pub fn is_info(&self) -> bool {
        self.kind() == "info"
    }

    pub fn is_select(&self) -> bool {
        self.kind() == "select"
    }

    /// Whether the options of this select are the resource's indexer URLs.
    pub fn uses_indexer_urls(&self) -> bool {
        self.raw
            .get("selectOptionsProviderAction")
            .and_then(Value::as_str)
            == Some(URL_PROVIDER)
    }

    /// Whether this field has an inline option table.
    pub fn has_options(&self) -> bool {
        self.raw.get("selectOptions").is_some_and(Value::is_array)
    }

    pub fn options(&self) -> Vec<SelectOption<'a>> {
        self.raw
            .get("selectOptions")
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|option| {
                        Some(SelectOption {
                            value: option.get("value")?,
                            name: option.get("name")?.as_str()?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Text fields whose name suggests a credential.
    pub fn looks_secret(&self) -> bool {
        let name = self.name().to_lowercase();
        self.kind() == "textbox" && (name.contains("key") || name.contains("pass"))
    }

    /// Copy of the raw entry with `value` replaced.
    pub fn with_value(&self, value: Value) -> Value {
        let mut raw = self.raw.clone();
        raw.insert("value".to_string(), value);
        Value::Object(raw)
    }

    /// Translate a remote value into its local form.
    ///
    /// Select values become option names. A value that matches no option is
    /// an error.
    pub fn decode(&self, raw: &Value, indexer_urls: &[Value]) -> Result<Value> {
        if !self.is_select() || raw.is_null() {
            return Ok(raw.clone());
        }
        if self.uses_indexer_urls() {
            return raw
                .as_u64()
                .and_then(|i| indexer_urls.get(usize::try_from(i).ok()?))
                .cloned()
                .ok_or_else(|| {
                    self.invalid_index(raw, || {
                        (0..indexer_urls.len()).map(|i| i.to_string()).collect()
                    })
                });
        }
        if !self.has_options() {
            return Ok(raw.clone());
        }
        let options = self.options();
        options
            .iter()
            .find(|option| option.value == raw)
            .map(|option| Value::from(option.name))
            .ok_or_else(|| {
                self.invalid_index(raw, || {
                    options.iter().map(|o| o.value.to_string()).collect()
                })
            })
    }

    /// Translate a local value into its remote form.
    ///
    /// Select names are matched case-insensitively. Integer selections are
    /// kept as-is after checking they are one of the field's values.
    pub fn encode(&self, local: &Value, indexer_urls: &[Value]) -> Result<Value> {
        if !self.is_select() || local.is_null() {
            return Ok(local.clone());
        }
        if self.uses_indexer_urls() {
            return match local {
                Value::String(url) => indexer_urls
                    .iter()
                    .position(|u| u.as_str() == Some(url.as_str()))
                    .map(Value::from)
                    .ok_or_else(|| Error::InvalidFieldValue {
                        value: url.clone(),
                        expected: quoted_list(indexer_urls.iter().filter_map(Value::as_str)),
                    }),
                other => match other.as_u64() {
                    Some(i) if usize::try_from(i).is_ok_and(|i| i < indexer_urls.len()) => {
                        Ok(other.clone())
                    }
                    _ => Err(self.invalid_index(other, || {
                        (0..indexer_urls.len()).map(|i| i.to_string()).collect()
                    })),
                },
            };
        }
        if !self.has_options() {
            return Ok(local.clone());
        }
        let options = self.options();
        match local {
            Value::String(name) => options
                .iter()
                .find(|option| option.name.eq_ignore_ascii_case(name))
                .map(|option| option.value.clone())
                .ok_or_else(|| Error::InvalidFieldValue {
                    value: name.clone(),
                    expected: quoted_list(options.iter().map(|o| o.name)),
                }),
            other => {
                if options.iter().any(|option| option.value == other) {
                    Ok(other.clone())
                } else {
                    Err(self.invalid_index(other, || {
                        options.iter().map(|o| o.value.to_string()).collect()
                    }))
                }
            }
        }
    }

    /// Compare two local values of this field.
    pub fn same(&self, a: &Value, b: &Value) -> bool {
        if self.is_select() && self.has_options() {
            if let (Some(a), Some(b)) = (a.as_str(), b.as_str()) {
                return a.eq_ignore_ascii_case(b);
            }
        }
        a == b
    }

    fn invalid_index(&self, value: &Value, expected: impl FnOnce() -> Vec<String>) -> Error {
        match value.as_i64() {
            Some(index) => Error::InvalidSelectIndex {
                index,
                expected: expected().join(", "),
            },
            None => Error::validation(
                self.name(),
                format!("unsupported select value {value}"),
            ),
        }
    }
}

/// All dynamic fields of a remote resource, in order.
pub fn fields_of(resource: &Value) -> Vec<Field<'_>> {
    resource
        .get("fields")
        .and_then(Value::as_array)
        .map(|fields| fields.iter().filter_map(Field::new).collect())
        .unwrap_or_default()
}

/// Find a dynamic field by its exact name.
pub fn find_field<'a>(resource: &'a Value, name: &str) -> Option<Field<'a>> {
    fields_of(resource).into_iter().find(|f| f.name() == name)
}

/// The `indexerUrls` list of a resource, empty if absent.
pub fn indexer_urls(resource: &Value) -> &[Value] {
    resource
        .get("indexerUrls")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sort_field() -> Value {
        json!({
            "name": "sort",
            "type": "select",
            "value": 0,
            "selectOptions": [
                {"value": 0, "name": "created"},
                {"value": 1, "name": "seeders"},
                {"value": 2, "name": "size"},
            ],
        })
    }

    fn url_field() -> Value {
        json!({
            "name": "baseUrl",
            "type": "select",
            "value": 0,
            "selectOptionsProviderAction": "getUrls",
        })
    }

    #[test]
    fn test_field_accessors() {
        let raw = sort_field();
        let field = Field::new(&raw).unwrap();
        assert_eq!(field.name(), "sort");
        assert_eq!(field.kind(), "select");
        assert_eq!(field.value(), &json!(0));
        assert!(field.is_select());
        assert!(!field.is_info());
        assert!(!field.uses_indexer_urls());
        assert_eq!(field.options().len(), 3);
    }

    #[test]
    fn test_field_new_rejects_non_objects() {
        assert!(Field::new(&json!("sort")).is_none());
    }

    #[test]
    fn test_decode_select() {
        let raw = sort_field();
        let field = Field::new(&raw).unwrap();
        assert_eq!(field.decode(&json!(1), &[]).unwrap(), json!("seeders"));
        assert_eq!(field.decode(&Value::Null, &[]).unwrap(), Value::Null);

        let err = field.decode(&json!(9), &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid field select option index 9 (expected values: 0, 1, 2)"
        );
        assert!(field.decode(&json!("newest"), &[]).is_err());
    }

    #[test]
    fn test_decode_non_select_passthrough() {
        let raw = json!({"name": "apiKey", "type": "textbox", "value": "abc"});
        let field = Field::new(&raw).unwrap();
        assert_eq!(field.decode(&json!("abc"), &[]).unwrap(), json!("abc"));
    }

    #[test]
    fn test_decode_indexer_urls() {
        let raw = url_field();
        let field = Field::new(&raw).unwrap();
        let urls = [json!("https://a.example/"), json!("https://b.example/")];
        assert_eq!(field.decode(&json!(1), &urls).unwrap(), json!("https://b.example/"));

        let err = field.decode(&json!(5), &urls[..1]).unwrap_err();
        assert!(matches!(err, Error::InvalidSelectIndex { index: 5, .. }));
    }

    #[test]
    fn test_encode_select_case_insensitive() {
        let raw = sort_field();
        let field = Field::new(&raw).unwrap();
        assert_eq!(field.encode(&json!("SEEDERS"), &[]).unwrap(), json!(1));
        assert_eq!(field.encode(&json!("size"), &[]).unwrap(), json!(2));
    }

    #[test]
    fn test_encode_select_invalid_name() {
        let raw = sort_field();
        let field = Field::new(&raw).unwrap();
        let err = field.encode(&json!("invalid"), &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid field value 'invalid' (expected values: 'created', 'seeders', 'size')"
        );
    }

    #[test]
    fn test_encode_select_index() {
        let raw = sort_field();
        let field = Field::new(&raw).unwrap();
        assert_eq!(field.encode(&json!(2), &[]).unwrap(), json!(2));

        let err = field.encode(&json!(7), &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid field select option index 7 (expected values: 0, 1, 2)"
        );
    }

    #[test]
    fn test_encode_indexer_urls() {
        let raw = url_field();
        let field = Field::new(&raw).unwrap();
        let urls = [json!("https://a.example/"), json!("https://b.example/")];
        assert_eq!(field.encode(&json!("https://b.example/"), &urls).unwrap(), json!(1));
        assert!(field.encode(&json!("https://c.example/"), &urls).is_err());
        assert!(field.encode(&json!(5), &urls).is_err());
    }

    #[test]
    fn test_same_select_case_insensitive() {
        let raw = sort_field();
        let field = Field::new(&raw).unwrap();
        assert!(field.same(&json!("Created"), &json!("created")));
        assert!(!field.same(&json!("size"), &json!("created")));
    }

    #[test]
    fn test_same_textbox_case_sensitive() {
        let raw = json!({"name": "cookie", "type": "textbox", "value": "a"});
        let field = Field::new(&raw).unwrap();
        assert!(!field.same(&json!("A"), &json!("a")));
    }

    #[test]
    fn test_looks_secret() {
        let key = json!({"name": "apiKey", "type": "textbox"});
        let pass = json!({"name": "Password", "type": "textbox"});
        let check = json!({"name": "passkeyEnabled", "type": "checkbox"});
        let plain = json!({"name": "username", "type": "textbox"});
        assert!(Field::new(&key).unwrap().looks_secret());
        assert!(Field::new(&pass).unwrap().looks_secret());
        assert!(!Field::new(&check).unwrap().looks_secret());
        assert!(!Field::new(&plain).unwrap().looks_secret());
    }

    #[test]
    fn test_with_value_keeps_metadata() {
        let raw = sort_field();
        let field = Field::new(&raw).unwrap();
        let updated = field.with_value(json!(2));
        assert_eq!(updated["value"], json!(2));
        assert_eq!(updated["selectOptions"], raw["selectOptions"]);
    }

    #[test]
    fn test_fields_of_and_find() {
        let resource = json!({
            "fields": [
                {"name": "info", "type": "info"},
                sort_field(),
            ],
            "indexerUrls": ["https://a.example/"],
        });
        assert_eq!(fields_of(&resource).len(), 2);
        assert_eq!(find_field(&resource, "sort").unwrap().kind(), "select");
        assert!(find_field(&resource, "missing").is_none());
        assert_eq!(indexer_urls(&resource).len(), 1);
        assert!(indexer_urls(&json!({})).is_empty());
    }
}
