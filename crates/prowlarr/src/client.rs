//! API client for a single Prowlarr instance.
//!
//! [`Client`] joins paths onto the instance URL, attaches the API key, checks
//! the response status and decodes JSON. Any unexpected status is turned into
//! an [`Error::Api`] carrying the error details Prowlarr sent back.

use crate::error::{Error, Result};
use crate::transport::http::UreqTransport;
use crate::transport::{Method, Request, Response, Transport};
use log::debug;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Blocking client for the Prowlarr v1 API.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    host_url: String,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host_url", &self.host_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "**********"))
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client over HTTP.
    #[must_use]
    pub fn new(host_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self::with_transport(Arc::new(UreqTransport::new()), host_url, api_key)
    }

    /// Create a client over a custom transport (for testing).
    #[must_use]
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        host_url: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Self {
        Self {
            transport,
            host_url: host_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Same instance and transport, different API key.
    #[must_use]
    pub fn with_api_key(&self, api_key: Option<SecretString>) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            host_url: self.host_url.clone(),
            api_key,
        }
    }

    #[must_use]
    pub fn host_url(&self) -> &str {
        &self.host_url
    }

    /// Build the full URL of an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.host_url, path.trim_start_matches('/'))
    }

    /// Send a request and return the raw response, whatever its status.
    pub fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response> {
        let url = self.url(path);
        debug!("{method} {url}");
        let mut request = Request::new(method, url).api_key(self.api_key.clone());
        if let Some(body) = body {
            request = request.body(body);
        }
        self.transport.send(&request)
    }

    /// Send a request and decode the JSON response, failing on any status
    /// not in `expected`.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        expected: &[u16],
    ) -> Result<Value> {
        let response = self.send(method, path, body)?;
        if !expected.contains(&response.status) {
            return Err(api_error(method, &self.url(path), &response));
        }
        response.json()
    }

    pub fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::Get, path, None, &[200])
    }

    /// `GET` a path returning a JSON list.
    pub fn get_list(&self, path: &str) -> Result<Vec<Value>> {
        match self.get(path)? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(Error::InvalidResponse(format!(
                "expected a list from '{path}', got {other}"
            ))),
        }
    }

    /// `GET` a path and deserialize it.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(serde_json::from_value(self.get(path)?)?)
    }

    /// Create a resource.
    pub fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.request(Method::Post, path, Some(body), &[200, 201])
    }

    /// Replace a resource.
    pub fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.request(Method::Put, path, Some(body), &[200, 202])
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        self.request(Method::Delete, path, None, &[200, 204])
            .map(|_| ())
    }
}

// =============================================================================
// Error responses
// =============================================================================

/// Build an API error from an unexpected response.
pub fn api_error(method: Method, url: &str, response: &Response) -> Error {
    debug!(
        "{method} {url} -> status_code={} res={}",
        response.status, response.body
    );
    let message = match serde_json::from_str::<Value>(&response.body) {
        Ok(Value::Array(errors)) => errors
            .iter()
            .map(|error| format!("\n{}", error_detail(error)))
            .collect(),
        Ok(error) => format!(" {}", error_detail(&error)),
        Err(_) if response.body.trim().is_empty() => String::new(),
        Err(_) => format!(" {}", response.body.trim()),
    };
    Error::Api {
        method: method.to_string(),
        url: url.to_string(),
        status: response.status,
        message,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render one error object in the formats Prowlarr uses.
fn error_detail(error: &Value) -> String {
    if let (Some(property), Some(message)) = (error.get("propertyName"), error.get("errorMessage")) {
        let mut detail = format!("{}: {}", text(property), text(message));
        if let Some(attempted) = error.get("attemptedValue") {
            detail.push_str(&format!(" (attempted value: {})", text(attempted)));
        }
        return detail;
    }
    match (error.get("message"), error.get("description")) {
        (Some(message), Some(description)) => {
            format!("{}\n{}", text(message), text(description))
        }
        (Some(message), None) => text(message),
        _ => format!("(Unsupported error JSON format) {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn client(mock: &MockTransport) -> Client {
        Client::with_transport(
            Arc::new(mock.clone()),
            "http://localhost:9696/",
            Some(SecretString::from("abc")),
        )
    }

    #[test]
    fn test_url_join() {
        let client = client(&MockTransport::new());
        assert_eq!(client.host_url(), "http://localhost:9696");
        assert_eq!(client.url("/api/v1/tag"), "http://localhost:9696/api/v1/tag");
        assert_eq!(client.url("api/v1/tag"), "http://localhost:9696/api/v1/tag");
    }

    #[test]
    fn test_get_list() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "/api/v1/tag", 200, r#"[{"id": 1, "label": "anime"}]"#);
        let tags = client(&mock).get_list("/api/v1/tag").unwrap();
        assert_eq!(tags, vec![json!({"id": 1, "label": "anime"})]);
        assert!(mock.requests()[0].has_api_key);
    }

    #[test]
    fn test_get_list_rejects_object() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "/api/v1/tag", 200, "{}");
        assert!(matches!(
            client(&mock).get_list("/api/v1/tag"),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_unexpected_status_validation_errors() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Post,
            "/api/v1/indexer",
            400,
            r#"[
                {"propertyName": "Name", "errorMessage": "Should be unique", "attemptedValue": "Nyaa"},
                {"propertyName": "BaseUrl", "errorMessage": "Invalid Url"}
            ]"#,
        );
        let err = client(&mock).post("/api/v1/indexer", json!({})).unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(
            err.to_string(),
            "Unexpected response with status code 400 from 'POST http://localhost:9696/api/v1/indexer':\n\
             Name: Should be unique (attempted value: Nyaa)\n\
             BaseUrl: Invalid Url"
        );
    }

    #[test]
    fn test_unexpected_status_message_and_description() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Put,
            "/api/v1/indexer/3",
            500,
            r#"{"message": "Boom", "description": "Stack trace"}"#,
        );
        let err = client(&mock).put("/api/v1/indexer/3", json!({})).unwrap_err();
        assert!(err.to_string().ends_with(": Boom\nStack trace"));
    }

    #[test]
    fn test_unexpected_status_message_only() {
        let mock = MockTransport::new();
        mock.respond(Method::Delete, "/api/v1/tag/1", 404, r#"{"message": "NotFound"}"#);
        let err = client(&mock).delete("/api/v1/tag/1").unwrap_err();
        assert!(err.to_string().ends_with("'DELETE http://localhost:9696/api/v1/tag/1': NotFound"));
    }

    #[test]
    fn test_unexpected_status_unsupported_format() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "/api/v1/tag", 500, r#"{"error": "nope"}"#);
        let err = client(&mock).get("/api/v1/tag").unwrap_err();
        assert!(err.to_string().contains("(Unsupported error JSON format)"));
    }

    #[test]
    fn test_unexpected_status_plain_body() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "/api/v1/tag", 502, "Bad Gateway");
        let err = client(&mock).get("/api/v1/tag").unwrap_err();
        assert!(err.to_string().ends_with(": Bad Gateway"));
    }

    #[test]
    fn test_post_put_delete_accepted_statuses() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, "/api/v1/tag", 201, r#"{"id": 4, "label": "new"}"#);
        mock.respond(Method::Put, "/api/v1/tag/4", 202, r#"{"id": 4}"#);
        mock.respond(Method::Delete, "/api/v1/tag/4", 200, "");

        let client = client(&mock);
        assert_eq!(client.post("/api/v1/tag", json!({"label": "new"})).unwrap()["id"], 4);
        assert!(client.put("/api/v1/tag/4", json!({"id": 4})).is_ok());
        assert!(client.delete("/api/v1/tag/4").is_ok());
        assert_eq!(mock.writes().len(), 3);
    }

    #[test]
    fn test_with_api_key_shares_transport() {
        let mock = MockTransport::new();
        let anonymous = client(&mock).with_api_key(None);
        anonymous.get("/initialize.json").unwrap_err();
        assert!(!mock.requests()[0].has_api_key);
    }

    #[test]
    fn test_debug_hides_api_key() {
        let debug = format!("{:?}", client(&MockTransport::new()));
        assert!(!debug.contains("abc"));
    }
}
