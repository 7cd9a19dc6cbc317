//! Blocking HTTP transport backed by `ureq`.

use super::{Method, Request, Response, Transport};
use crate::error::{Error, Result};
use log::debug;
use secrecy::ExposeSecret;
use std::time::Duration;

/// Default timeout for a whole request, connect to last body byte.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// HTTP transport for a Prowlarr instance.
///
/// Redirects are not followed: Prowlarr answers unauthenticated requests for
/// its UI documents with a redirect to the login page, which callers need to
/// see as such.
pub struct UreqTransport {
    /// HTTP agent for requests.
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom per-request timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .max_redirects(0)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let url = request.url.as_str();
        let api_key = request.api_key.as_ref().map(|key| key.expose_secret());
        let failed = |e: ureq::Error| Error::transport(url, e);

        let result = match request.method {
            Method::Get => with_key(self.agent.get(url), api_key).call(),
            Method::Delete => with_key(self.agent.delete(url), api_key).call(),
            Method::Post => {
                let body = request.body.clone().unwrap_or_default();
                with_key(self.agent.post(url), api_key).send_json(&body)
            }
            Method::Put => {
                let body = request.body.clone().unwrap_or_default();
                with_key(self.agent.put(url), api_key).send_json(&body)
            }
        };

        let mut response = result.map_err(failed)?;
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string().map_err(failed)?;
        debug!("{} {url} -> status_code={status}", request.method);
        Ok(Response { status, body })
    }
}

fn with_key<B>(builder: ureq::RequestBuilder<B>, api_key: Option<&str>) -> ureq::RequestBuilder<B> {
    match api_key {
        Some(key) => builder.header(API_KEY_HEADER, key),
        None => builder,
    }
}
