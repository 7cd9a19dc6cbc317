//! Error types for Prowlarr API operations.
//!
//! Errors are categorized so callers can tell a misconfigured instance from
//! an unreachable one, and give the user matching advice.

use std::fmt;

/// Result type alias for Prowlarr API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The instance could not be reached (transient, retryable).
    Network,
    /// Credentials are missing or wrong.
    Auth,
    /// The instance rejected a request.
    Rejected,
    /// The instance answered with something unparseable.
    Format,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::Rejected => "Request rejected by Prowlarr",
            Self::Format => "Invalid response format",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the instance is running and the hostname and port are correct",
            Self::Auth => "Check the API key set in the configuration",
            Self::Rejected => "Check the configuration values named in the error",
            Self::Format => "The instance may be running an unsupported version",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to a Prowlarr instance.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The instance answered with an unexpected status code.
    #[error("Unexpected response with status code {status} from '{method} {url}':{message}")]
    Api {
        /// HTTP method.
        method: String,
        /// Full request URL.
        url: String,
        /// Status code received.
        status: u16,
        /// Parsed error details, each prefixed by a space or newline.
        message: String,
    },

    /// The API key could not be obtained or was rejected.
    #[error("{0}")]
    Unauthorized(String),

    /// The request did not complete.
    #[error("Unable to reach '{url}': {message}")]
    Transport {
        /// Full request URL.
        url: String,
        /// Underlying transport error.
        message: String,
    },

    /// The response body could not be parsed.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The session bootstrap document could not be parsed.
    #[error("No matches for 'initialize.js' parsing: {0}")]
    Bootstrap(String),

    /// An instance URL could not be parsed.
    #[error("invalid instance URL '{url}': {message}")]
    InvalidUrl {
        /// URL given.
        url: String,
        /// Parse error.
        message: String,
    },
}

impl Error {
    /// Create a transport error for a URL.
    pub fn transport(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Status code of an API error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Api { status: 401, .. } | Error::Unauthorized(_) => ErrorCategory::Auth,
            Error::Api { .. } => ErrorCategory::Rejected,
            Error::Transport { .. } => ErrorCategory::Network,
            Error::InvalidResponse(_) | Error::Bootstrap(_) | Error::InvalidUrl { .. } => {
                ErrorCategory::Format
            }
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
