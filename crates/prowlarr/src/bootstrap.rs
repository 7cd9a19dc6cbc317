//! Session bootstrap documents.
//!
//! The Prowlarr web UI loads its session metadata, including the API key,
//! from `/initialize.json` (newer releases) or `/initialize.js` (older ones,
//! a JavaScript assignment wrapping a JSON5 object). When authentication is
//! enabled for the requesting address, both answer `401` or redirect to the
//! login page instead.

use crate::client::{Client, api_error};
use crate::error::{Error, Result};
use crate::transport::Method;
use regex::Regex;
use serde_json::Value;

const INITIALIZE_JS: &str = r"(?s)^window\.Prowlarr = (\{.*\});$";

/// Outcome of fetching a bootstrap document.
#[derive(Debug, Clone, PartialEq)]
pub enum Bootstrap {
    /// Session metadata.
    Found(Value),
    /// The document does not exist on this version.
    NotFound,
    /// Authentication is required to read it.
    Unauthorized,
}

/// Fetch `/initialize.json`.
pub fn initialize_json(client: &Client) -> Result<Bootstrap> {
    fetch(client, "/initialize.json", |body| Ok(serde_json::from_str(body)?))
}

/// Fetch and parse `/initialize.js`.
pub fn initialize_js(client: &Client) -> Result<Bootstrap> {
    fetch(client, "/initialize.js", parse_initialize_js)
}

fn fetch(client: &Client, path: &str, parse: fn(&str) -> Result<Value>) -> Result<Bootstrap> {
    let response = client.send(Method::Get, path, None)?;
    match response.status {
        200 => parse(&response.body).map(Bootstrap::Found),
        401 | 302 => Ok(Bootstrap::Unauthorized),
        404 => Ok(Bootstrap::NotFound),
        _ => Err(api_error(Method::Get, &client.url(path), &response)),
    }
}

/// Extract the session object from an `initialize.js` body.
pub fn parse_initialize_js(body: &str) -> Result<Value> {
    let body = body.trim();
    let pattern = Regex::new(INITIALIZE_JS).map_err(|e| Error::Bootstrap(e.to_string()))?;
    let object = pattern
        .captures(body)
        .and_then(|captures| captures.get(1))
        .ok_or_else(|| Error::Bootstrap(body.to_string()))?;
    json5::from_str(object.as_str()).map_err(|e| Error::Bootstrap(e.to_string()))
}

/// The `apiKey` entry of a session object.
pub fn api_key(session: &Value) -> Result<String> {
    session
        .get("apiKey")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidResponse("session metadata has no 'apiKey'".to_string()))
}
