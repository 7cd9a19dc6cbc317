//! # prowlarr
//!
//! Blocking client for the Prowlarr v1 REST API.
//!
//! This crate provides:
//! - An API client that checks statuses and renders Prowlarr's error bodies
//! - API key discovery through the web UI's session bootstrap documents
//! - A transport seam with a mock implementation for tests
//!
//! ## Example
//!
//! ```no_run
//! use prowlarr::{Connection, Protocol};
//!
//! let connection = Connection {
//!     hostname: "localhost".to_string(),
//!     port: 9696,
//!     protocol: Protocol::Http,
//!     url_base: None,
//!     api_key: None,
//! };
//!
//! // Discovers the API key and checks it against the instance
//! let credentials = connection.resolve().expect("unable to connect");
//! println!("Prowlarr {} at {}", credentials.version, credentials.host_url());
//!
//! let tags = credentials.client().get_list("/api/v1/tag").expect("request failed");
//! println!("{} tags", tags.len());
//! ```

pub mod bootstrap;
pub mod client;
pub mod error;
pub mod secrets;
pub mod transport;
pub mod types;

pub use client::Client;
pub use error::{Error, ErrorCategory, Result};
pub use secrets::{Connection, Credentials, normalize_url_base};
pub use transport::{Method, MockTransport, Transport};
pub use types::{Protocol, SystemStatus};
