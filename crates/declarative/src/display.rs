//! Log formatting for attribute values.

use serde_json::Value;

/// Placeholder shown instead of a secret value.
pub const MASK: &str = "'**********'";

/// Format a value for a log line: strings quoted, containers expanded.
pub fn repr(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => format!("'{s}'"),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(repr).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let items: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{k}': {}", repr(v)))
                .collect();
            format!("{{{}}}", items.join(", "))
        }
        other => other.to_string(),
    }
}

/// Like [`repr`], but hides set secrets.
pub fn masked(value: &Value, secret: bool) -> String {
    if secret && !value.is_null() {
        MASK.to_string()
    } else {
        repr(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repr_scalars() {
        assert_eq!(repr(&json!("created")), "'created'");
        assert_eq!(repr(&json!(3)), "3");
        assert_eq!(repr(&json!(true)), "true");
        assert_eq!(repr(&Value::Null), "null");
    }

    #[test]
    fn test_repr_containers() {
        assert_eq!(repr(&json!(["anime", "shows"])), "['anime', 'shows']");
        assert_eq!(repr(&json!({"tv": ["tv/hd"]})), "{'tv': ['tv/hd']}");
    }

    #[test]
    fn test_masked() {
        assert_eq!(masked(&json!("hunter2"), true), MASK);
        assert_eq!(masked(&json!("hunter2"), false), "'hunter2'");
        assert_eq!(masked(&Value::Null, true), "null");
    }
}
