//! Error types for live-system operations.
//!
//! Transport failures (the bus or a file could not be reached) are kept
//! apart from decode failures (the data came back in a shape we can't
//! represent), and both convert into the matching [`reconcile::Error`].

use std::path::PathBuf;
use thiserror::Error;

/// Categories of live-system errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bus or command unreachable (transient, retryable)
    Transport,
    /// Output or file content could not be understood
    Decode,
    /// Permission denied (needs root)
    Permission,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transport => "System service unreachable",
            Self::Decode => "Unexpected system data",
            Self::Permission => "Permission denied",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transport => "Check that systemd-resolved is running and the bus is reachable",
            Self::Decode => "Inspect the file or bus property for entries outside the supported grammar",
            Self::Permission => "Run as root",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to the live system.
#[derive(Debug, Error)]
pub enum Error {
    /// The bus could not be reached or a call failed in transit
    #[error("bus error: {message}")]
    Bus {
        /// Details from the bus tool
        message: String,
    },

    /// A bus reply had an unexpected shape
    #[error("unexpected bus reply: {message}")]
    BusReply {
        /// What was wrong with the reply
        message: String,
    },

    /// A config file line could not be parsed
    #[error("{path}:{line}: {message}")]
    Parse {
        /// File being parsed
        path: PathBuf,
        /// Line number (1-indexed)
        line: usize,
        /// Description of the syntax error
        message: String,
    },

    /// A value cannot be written in the target format
    #[error("cannot encode {what}: {message}")]
    Encode {
        /// What was being encoded
        what: String,
        /// Why it was rejected
        message: String,
    },

    /// Permission denied
    #[error("permission denied: {message}")]
    Permission {
        /// Details about what permission was denied
        message: String,
    },

    /// Replacing a file failed; `restored` tells whether the original is back
    #[error("failed to replace {path}: {source} ({})", swap_outcome(.restored))]
    Swap {
        /// File being replaced
        path: PathBuf,
        /// Underlying failure
        source: std::io::Error,
        /// Whether the backup was put back in place
        restored: bool,
    },

    /// No free UID/GID in the managed range
    #[error("no free id between {min} and {max}")]
    IdsExhausted {
        /// Lowest managed id
        min: u32,
        /// Highest managed id
        max: u32,
    },

    /// A desired account exists with a uid outside the managed range
    #[error("account '{name}' has uid {uid}, outside the managed range")]
    Unmanaged {
        /// Account name
        name: String,
        /// Its current uid
        uid: u32,
    },

    /// Command execution failed
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn swap_outcome(restored: &bool) -> &'static str {
    if *restored {
        "original restored"
    } else {
        "original left in .bak"
    }
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Bus { .. } | Error::CommandFailed { .. } => ErrorCategory::Transport,
            Error::BusReply { .. } | Error::Parse { .. } | Error::Json(_) => ErrorCategory::Decode,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorCategory::Permission
            }
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Create an error from busctl stderr.
    pub fn from_busctl_output(stderr: &str) -> Self {
        let stderr_lower = stderr.to_lowercase();

        if stderr_lower.contains("access denied")
            || stderr_lower.contains("permission denied")
            || stderr_lower.contains("interactive authentication required")
        {
            return Error::Permission {
                message: stderr.trim().to_string(),
            };
        }

        if stderr_lower.contains("failed to connect")
            || stderr_lower.contains("connection refused")
            || stderr_lower.contains("no such file or directory")
            || stderr_lower.contains("timed out")
            || stderr_lower.contains("was not provided by any .service files")
        {
            return Error::Bus {
                message: stderr.trim().to_string(),
            };
        }

        Error::CommandFailed {
            message: "busctl call failed".to_string(),
            stderr: stderr.trim().to_string(),
        }
    }
}

impl From<Error> for reconcile::Error {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::Io(io) => reconcile::Error::Io(io),
            Error::Encode { what, message } => reconcile::Error::InvalidValue {
                field: what,
                message,
            },
            Error::Unmanaged { .. } => reconcile::Error::InvalidValue {
                field: "name".to_string(),
                message,
            },
            other => match other.category() {
                ErrorCategory::Decode => reconcile::Error::Decode { message },
                _ => reconcile::Error::Transport { message },
            },
        }
    }
}

/// Result type for live-system operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_busctl_output_unreachable() {
        let err = Error::from_busctl_output(
            "Failed to connect to bus: No such file or directory",
        );
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_busctl_output_permission() {
        let err = Error::from_busctl_output("Call failed: Access denied");
        assert_eq!(err.category(), ErrorCategory::Permission);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_error_maps_to_decode() {
        let err = Error::Parse {
            path: PathBuf::from("/etc/ntp.conf"),
            line: 3,
            message: "bad option".to_string(),
        };
        assert_eq!(err.to_string(), "/etc/ntp.conf:3: bad option");
        let converted: reconcile::Error = err.into();
        assert_eq!(converted.category(), reconcile::ErrorCategory::Decode);
    }

    #[test]
    fn test_bus_error_maps_to_transport() {
        let converted: reconcile::Error = Error::Bus {
            message: "timed out".to_string(),
        }
        .into();
        assert!(converted.is_retryable());
    }

    #[test]
    fn test_swap_message_mentions_backup() {
        let err = Error::Swap {
            path: PathBuf::from("/etc/ntp.conf"),
            source: std::io::Error::other("rename failed"),
            restored: false,
        };
        assert!(err.to_string().contains("left in .bak"));
    }
}
