//! Instance connection details and API key resolution.
//!
//! A [`Connection`] is what the user configures: where the instance lives and,
//! optionally, its API key. Resolving it yields [`Credentials`]: the same
//! location plus a verified API key and the instance version.
//!
//! When no API key is configured it is discovered from the session bootstrap
//! documents, which works as long as authentication is disabled for the
//! address the request comes from.

use crate::bootstrap::{self, Bootstrap};
use crate::client::Client;
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::transport::http::UreqTransport;
use crate::types::{Protocol, SystemStatus};
use log::debug;
use secrecy::SecretString;
use std::sync::Arc;

/// Path of the status endpoint used to verify the API key.
pub const STATUS_PATH: &str = "/api/v1/system/status";

/// Normalize a URL base to `/segment` form, or `None` when empty.
pub fn normalize_url_base(url_base: Option<&str>) -> Option<String> {
    url_base
        .map(|base| base.trim_matches('/'))
        .filter(|base| !base.is_empty())
        .map(|base| format!("/{base}"))
}

/// Location of an instance, with an optional API key.
#[derive(Debug, Clone)]
pub struct Connection {
    pub hostname: String,
    pub port: u16,
    pub protocol: Protocol,
    pub url_base: Option<String>,
    pub api_key: Option<SecretString>,
}

impl Connection {
    /// Parse a connection from an instance URL such as
    /// `https://prowlarr.example.com/prowlarr`.
    ///
    /// The port defaults to the scheme's, and the path becomes the URL base.
    pub fn from_url(url: &str, api_key: Option<SecretString>) -> Result<Self> {
        let invalid = |message: String| Error::InvalidUrl {
            url: url.to_string(),
            message,
        };
        let parsed = url::Url::parse(url).map_err(|e| invalid(e.to_string()))?;
        let protocol: Protocol = parsed.scheme().parse().map_err(invalid)?;
        let hostname = parsed
            .host_str()
            .ok_or_else(|| invalid("no hostname".to_string()))?
            .to_string();
        Ok(Self {
            hostname,
            port: parsed.port().unwrap_or_else(|| protocol.default_port()),
            protocol,
            url_base: normalize_url_base(Some(parsed.path())),
            api_key,
        })
    }

    /// Base URL of the instance, e.g. `http://localhost:9696/prowlarr`.
    pub fn host_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.protocol,
            self.hostname,
            self.port,
            normalize_url_base(self.url_base.as_deref()).unwrap_or_default()
        )
    }

    /// Resolve over HTTP.
    pub fn resolve(&self) -> Result<Credentials> {
        self.resolve_with(Arc::new(UreqTransport::new()))
    }

    /// Resolve the API key and verify it against the instance.
    pub fn resolve_with(&self, transport: Arc<dyn Transport>) -> Result<Credentials> {
        let host_url = self.host_url();
        let anonymous = Client::with_transport(transport, host_url.clone(), None);

        let api_key = match &self.api_key {
            Some(api_key) => api_key.clone(),
            None => SecretString::from(discover_api_key(&anonymous)?),
        };

        let client = anonymous.with_api_key(Some(api_key.clone()));
        let status: SystemStatus = match client.get_as(STATUS_PATH) {
            Ok(status) => status,
            Err(err) if err.status() == Some(401) => {
                return Err(Error::Unauthorized(format!(
                    "Incorrect API key for the Prowlarr instance at '{host_url}'. \
                     Please check that the API key is set correctly in the configuration, \
                     and that it is set to the value as shown in \
                     'Settings -> General -> API Key' on the Prowlarr instance."
                )));
            }
            Err(err) => return Err(err),
        };
        debug!("Connected to Prowlarr {} at {host_url}", status.version);

        Ok(Credentials {
            hostname: self.hostname.clone(),
            port: self.port,
            protocol: self.protocol,
            url_base: normalize_url_base(self.url_base.as_deref()),
            api_key,
            version: status.version,
            client,
        })
    }
}

/// Read the API key from `initialize.json`, falling back to `initialize.js`.
fn discover_api_key(client: &Client) -> Result<String> {
    let unauthorized = || {
        Error::Unauthorized(format!(
            "Unable to retrieve the API key for the Prowlarr instance at '{}': \
             Authentication is enabled. Please try manually setting the \
             'Settings -> General -> Authentication Required' attribute to \
             'Disabled for Local Addresses', or if that does not work, \
             explicitly define the API key in the configuration.",
            client.host_url()
        ))
    };
    let session = match bootstrap::initialize_json(client)? {
        Bootstrap::Found(session) => session,
        Bootstrap::Unauthorized => return Err(unauthorized()),
        Bootstrap::NotFound => match bootstrap::initialize_js(client)? {
            Bootstrap::Found(session) => session,
            Bootstrap::Unauthorized => return Err(unauthorized()),
            Bootstrap::NotFound => {
                return Err(Error::InvalidResponse(format!(
                    "neither 'initialize.json' nor 'initialize.js' exist at '{}'",
                    client.host_url()
                )));
            }
        },
    };
    bootstrap::api_key(&session)
}

/// Verified connection details of an instance.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub hostname: String,
    pub port: u16,
    pub protocol: Protocol,
    pub url_base: Option<String>,
    pub api_key: SecretString,
    /// Version reported by the instance.
    pub version: String,
    client: Client,
}

impl Credentials {
    pub fn host_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.protocol,
            self.hostname,
            self.port,
            self.url_base.as_deref().unwrap_or_default()
        )
    }

    /// Authenticated client for this instance.
    pub fn client(&self) -> &Client {
        &self.client
    }
}
