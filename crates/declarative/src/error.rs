//! Error types for mapping and reconciliation.
//!
//! These errors are raised while translating between local definitions and
//! remote resource representations. They are all deterministic: retrying the
//! same operation against the same data fails the same way.

use std::fmt;

/// Result type alias for mapping operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of mapping errors, used to shape user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The local configuration holds a value the remote side cannot accept.
    Config,
    /// The remote side returned data that does not fit the known shape.
    Remote,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Invalid configuration value",
            Self::Remote => "Unexpected remote data",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => "Check the configuration against the values listed in the error",
            Self::Remote => "The remote instance may be running an unsupported version",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while mapping definitions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A select field was given a name that is not one of its options.
    #[error("Invalid field value '{value}' (expected values: {expected})")]
    InvalidFieldValue {
        /// Value given.
        value: String,
        /// Quoted, comma-separated option names.
        expected: String,
    },

    /// A select field was given an integer that is not one of its options.
    #[error("Invalid field select option index {index} (expected values: {expected})")]
    InvalidSelectIndex {
        /// Index given.
        index: i64,
        /// Comma-separated option values.
        expected: String,
    },

    /// A remote select field holds a value with no matching option.
    #[error("field '{field}' has value {value} which is not one of its select options")]
    UnknownSelectValue {
        /// Field name.
        field: String,
        /// Raw remote value.
        value: String,
    },

    /// No remote schema matched the requested type.
    #[error("Invalid 'type' value for {what} '{value}' (expected one of: {expected})")]
    SchemaMismatch {
        /// What kind of resource was being looked up.
        what: String,
        /// Requested type.
        value: String,
        /// Quoted, comma-separated identifiers the remote offers.
        expected: String,
    },

    /// No local type mapping exists for the requested type name.
    #[error("Invalid {category} type '{value}' (expected one of: {expected})")]
    UnsupportedType {
        /// Category of the definition.
        category: String,
        /// Requested type.
        value: String,
        /// Quoted, comma-separated supported type names.
        expected: String,
    },

    /// A name could not be resolved to a remote ID.
    #[error("Unable to find {table} '{name}' on the remote instance")]
    UnknownName {
        /// Lookup table consulted.
        table: String,
        /// Name that was not found.
        name: String,
    },

    /// A remote ID could not be resolved to a name.
    #[error("Unable to find {table} with ID {id} on the remote instance")]
    UnknownId {
        /// Lookup table consulted.
        table: String,
        /// ID that was not found.
        id: i64,
    },

    /// A mapped field is absent from the remote field list.
    #[error("Unable to find field '{0}' in common attrs")]
    MissingField(String),

    /// A local value failed validation.
    #[error("{path}: {message}")]
    Validation {
        /// Dotted path of the offending value.
        path: String,
        /// What is wrong with it.
        message: String,
    },
}

impl Error {
    /// Create a validation error at a configuration path.
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Get the error category for user feedback.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnknownSelectValue { .. }
            | Error::UnknownId { .. }
            | Error::MissingField(_) => ErrorCategory::Remote,
            Error::InvalidFieldValue { .. }
            | Error::InvalidSelectIndex { .. }
            | Error::SchemaMismatch { .. }
            | Error::UnsupportedType { .. }
            | Error::UnknownName { .. }
            | Error::Validation { .. } => ErrorCategory::Config,
        }
    }
}

/// Join values as `'a', 'b', 'c'`.
pub fn quoted_list<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: fmt::Display,
{
    values
        .into_iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
