//! Transport seam between the API client and the network.
//!
//! The [`Transport`] trait sends one request and returns the raw status and
//! body, without interpreting either. [`http::UreqTransport`] is the real
//! implementation; [`MockTransport`] serves canned responses for tests.
//!
//! # Testing
//!
//! ```
//! use prowlarr::transport::{Method, MockTransport, Request, Transport};
//!
//! let mock = MockTransport::new();
//! mock.respond(Method::Get, "/api/v1/tag", 200, r#"[{"id": 1, "label": "anime"}]"#);
//!
//! let response = mock
//!     .send(&Request::new(Method::Get, "http://localhost:9696/api/v1/tag"))
//!     .unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(mock.requests().len(), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use secrecy::SecretString;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// HTTP methods used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single API request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// Sent as the `X-Api-Key` header when set.
    pub api_key: Option<SecretString>,
    /// JSON body for `POST` and `PUT`.
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            api_key: None,
            body: None,
        }
    }

    #[must_use]
    pub fn api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path component of the URL, without query.
    pub fn path(&self) -> String {
        url::Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| self.url.clone())
    }
}

/// Raw response: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Parse the body as JSON. An empty body is `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Sends requests to a Prowlarr instance.
///
/// Implementations must not follow redirects and must return non-2xx
/// responses as `Ok`, leaving status interpretation to the caller.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response>;
}

/// A request as seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub has_api_key: bool,
}

#[derive(Debug, Default)]
struct MockState {
    routes: Vec<(Method, String, VecDeque<Response>)>,
    requests: Vec<Recorded>,
    unreachable: bool,
    accept_writes: bool,
}

/// Mock transport for testing without network access.
///
/// Responses are registered per method and path. When several responses are
/// registered for the same route they are served in order, and the last one
/// repeats. Unregistered routes answer `404`, unless [`accept_writes`] was
/// called, in which case unregistered writes answer `200` with their own body.
///
/// [`accept_writes`]: MockTransport::accept_writes
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new mock transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a response for a route.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: impl Into<String>) {
        let response = Response::new(status, body);
        let mut state = self.state();
        if let Some((_, _, queue)) = state
            .routes
            .iter_mut()
            .find(|(m, p, _)| *m == method && p == path)
        {
            queue.push_back(response);
        } else {
            state
                .routes
                .push((method, path.to_string(), VecDeque::from([response])));
        }
    }

    /// Register a JSON response for a route.
    pub fn respond_json(&self, method: Method, path: &str, status: u16, body: &Value) {
        self.respond(method, path, status, body.to_string());
    }

    /// Make every request fail at the transport level.
    pub fn set_unreachable(&self) {
        self.state().unreachable = true;
    }

    /// Answer writes to unregistered routes with their own body.
    pub fn accept_writes(&self) {
        self.state().accept_writes = true;
    }

    /// All requests sent so far.
    pub fn requests(&self) -> Vec<Recorded> {
        self.state().requests.clone()
    }

    /// Requests sent so far with any method other than `GET`.
    pub fn writes(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::Get)
            .collect()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let path = request.path();
        let mut state = self.state();
        state.requests.push(Recorded {
            method: request.method,
            path: path.clone(),
            body: request.body.clone(),
            has_api_key: request.api_key.is_some(),
        });
        if state.unreachable {
            return Err(Error::transport(&request.url, "connection refused"));
        }
        let response = state
            .routes
            .iter_mut()
            .find(|(m, p, _)| *m == request.method && *p == path)
            .and_then(|(_, _, queue)| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            });
        Ok(response.unwrap_or_else(|| {
            if state.accept_writes && request.method != Method::Get {
                let body = request.body.as_ref().map(Value::to_string);
                Response::new(200, body.unwrap_or_default())
            } else {
                Response::new(404, "")
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }

    #[test]
    fn test_request_path() {
        let request = Request::new(Method::Get, "http://localhost:9696/prowlarr/api/v1/tag?x=1");
        assert_eq!(request.path(), "/prowlarr/api/v1/tag");
    }

    #[test]
    fn test_response_json() {
        assert_eq!(Response::new(200, "").json().unwrap(), Value::Null);
        assert_eq!(Response::new(200, "[1]").json().unwrap(), json!([1]));
        assert!(Response::new(200, "<html>").json().is_err());
    }

    #[test]
    fn test_mock_unregistered_route() {
        let mock = MockTransport::new();
        let response = mock
            .send(&Request::new(Method::Get, "http://h:1/api/v1/missing"))
            .unwrap();
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_mock_sequence_last_repeats() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "/a", 200, "1");
        mock.respond(Method::Get, "/a", 200, "2");
        let request = Request::new(Method::Get, "http://h:1/a");
        assert_eq!(mock.send(&request).unwrap().body, "1");
        assert_eq!(mock.send(&request).unwrap().body, "2");
        assert_eq!(mock.send(&request).unwrap().body, "2");
    }

    #[test]
    fn test_mock_records_requests() {
        let mock = MockTransport::new();
        let request = Request::new(Method::Post, "http://h:1/api/v1/tag")
            .api_key(Some(SecretString::from("key")))
            .body(json!({"label": "anime"}));
        mock.send(&request).unwrap();
        mock.send(&Request::new(Method::Get, "http://h:1/api/v1/tag")).unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].path, "/api/v1/tag");
        assert_eq!(writes[0].body, Some(json!({"label": "anime"})));
        assert!(writes[0].has_api_key);
        assert_eq!(mock.requests().len(), 2);
    }

    #[test]
    fn test_mock_accept_writes() {
        let mock = MockTransport::new();
        mock.accept_writes();
        let put = Request::new(Method::Put, "http://h:1/api/v1/tag/1").body(json!({"id": 1}));
        let response = mock.send(&put).unwrap();
        assert_eq!((response.status, response.body.as_str()), (200, r#"{"id":1}"#));
        let delete = Request::new(Method::Delete, "http://h:1/api/v1/tag/1");
        assert_eq!(mock.send(&delete).unwrap().status, 200);
        let get = Request::new(Method::Get, "http://h:1/api/v1/tag/1");
        assert_eq!(mock.send(&get).unwrap().status, 404);
    }

    #[test]
    fn test_mock_unreachable() {
        let mock = MockTransport::new();
        mock.set_unreachable();
        let err = mock
            .send(&Request::new(Method::Get, "http://h:1/api/v1/tag"))
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
