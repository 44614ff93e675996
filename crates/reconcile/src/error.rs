//! Error types for reconciliation.
//!
//! Errors are categorized so callers can tell "couldn't reach the system"
//! apart from "the system's data is unexpected", and both apart from
//! broken invariants inside the engine itself.

use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bus unreachable, file unreadable, command failed (transient, retryable)
    Transport,
    /// Live data has an unexpected shape (bad address family, malformed line)
    Decode,
    /// Input rejected before anything was written (duplicate key, incomplete entity)
    Validation,
    /// An edit refers to an entity that does not exist
    Inconsistency,
    /// A programming invariant was violated
    Invariant,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport)
    }

    /// Whether this error means the engine's own state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transport => "Could not reach the system",
            Self::Decode => "Unexpected data from the system",
            Self::Validation => "Invalid configuration",
            Self::Inconsistency => "Edit does not match current state",
            Self::Invariant => "Internal invariant violated",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transport => "Check that the resolver daemon is running and the files are accessible",
            Self::Decode => "Inspect the live configuration for entries this tool cannot represent",
            Self::Validation => "Fix the configuration document and try again",
            Self::Inconsistency => "Reload the running datastore and resubmit the edit",
            Self::Invariant => "Restart the process; this is a bug",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while reconciling configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// The live system could not be reached
    #[error("transport error: {message}")]
    Transport {
        /// Detailed error message from the failed operation
        message: String,
    },

    /// The live system returned data that could not be decoded
    #[error("decode error: {message}")]
    Decode {
        /// Description of what could not be decoded
        message: String,
    },

    /// An entity with the same key already exists in the collection
    #[error("duplicate {kind} '{key}'")]
    Duplicate {
        /// Entity kind (e.g. "ntp server")
        kind: &'static str,
        /// The clashing key
        key: String,
    },

    /// An edit referred to an entity that is not in the working collection
    #[error("{kind} '{key}' does not exist")]
    MissingEntity {
        /// Entity kind
        kind: &'static str,
        /// The key that was looked up
        key: String,
    },

    /// An entity is missing a required field and cannot be stored
    #[error("{kind} '{key}' is incomplete: {field} is not set")]
    Incomplete {
        /// Entity kind
        kind: &'static str,
        /// Key of the incomplete entity
        key: String,
        /// The field that is missing
        field: &'static str,
    },

    /// A field value could not be interpreted
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Field that received the value
        field: String,
        /// Why the value was rejected
        message: String,
    },

    /// An edit path could not be parsed or addressed an unknown node
    #[error("invalid path '{path}': {message}")]
    InvalidPath {
        /// The offending path
        path: String,
        /// Why it was rejected
        message: String,
    },

    /// A batch started while the previous one for the same kind was still open
    #[error("a {kind} batch is already in progress")]
    Reentrant {
        /// Entity kind whose batch was still open
        kind: &'static str,
    },

    /// The configuration datastore failed
    #[error("datastore error: {message}")]
    Datastore {
        /// Details from the datastore implementation
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport { .. } | Error::Io(_) => ErrorCategory::Transport,
            Error::Decode { .. } => ErrorCategory::Decode,
            Error::Duplicate { .. }
            | Error::Incomplete { .. }
            | Error::InvalidValue { .. }
            | Error::InvalidPath { .. } => ErrorCategory::Validation,
            Error::MissingEntity { .. } => ErrorCategory::Inconsistency,
            Error::Reentrant { .. } => ErrorCategory::Invariant,
            Error::Datastore { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error is an unrecoverable invariant violation.
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    pub(crate) fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_retryable() {
        let err = Error::Transport {
            message: "bus unreachable".to_string(),
        };
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_io_maps_to_transport() {
        let err = Error::from(std::io::Error::other("disk gone"));
        assert_eq!(err.category(), ErrorCategory::Transport);
    }

    #[test]
    fn test_reentrant_is_fatal() {
        let err = Error::Reentrant { kind: "ntp server" };
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_decode_is_distinct_from_transport() {
        let err = Error::Decode {
            message: "unknown address family 7".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Decode);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_entity_message() {
        let err = Error::MissingEntity {
            kind: "ntp server",
            key: "ntp1".to_string(),
        };
        assert_eq!(err.to_string(), "ntp server 'ntp1' does not exist");
        assert_eq!(err.category(), ErrorCategory::Inconsistency);
    }
}
