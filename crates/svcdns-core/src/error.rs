//! Error types for svcdns
//!
//! Every failure surfaces to the caller unchanged. Nothing in the core
//! retries, so the variants describe where the failure came from rather
//! than whether it is worth trying again.

use thiserror::Error;

/// Result type alias for svcdns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for svcdns
#[derive(Error, Debug)]
pub enum Error {
    /// Failure enumerating namespaces, services or instances
    #[error("Directory error: {0}")]
    Directory(String),

    /// Network or timeout failure talking to a remote API
    #[error("Transport error: {0}")]
    Transport(String),

    /// The zone store answered with an unexpected status
    #[error("Zone store rejected {name}: status {status}: {message}")]
    StoreRejected {
        /// Record name (or request target) the store rejected
        name: String,
        /// HTTP status returned by the store
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// A response body did not match the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A pass under the `continue` failure policy finished with failures
    #[error("Reconciliation incomplete: {} name(s) failed: {}", failed.len(), failed.join(", "))]
    Incomplete {
        /// Service names whose records could not be reconciled
        failed: Vec<String>,
    },
}

impl Error {
    /// Create a directory error
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a store rejection error
    pub fn store_rejected(name: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::StoreRejected {
            name: name.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_rejected_names_record() {
        let err = Error::store_rejected("web.example.com", 400, "failure: bad address");
        let msg = err.to_string();
        assert!(msg.contains("web.example.com"));
        assert!(msg.contains("400"));
    }

    #[test]
    fn test_config_and_transport_render_distinctly() {
        assert_eq!(
            Error::config("bad tag").to_string(),
            "Configuration error: bad tag"
        );
        assert_eq!(
            Error::transport("timed out").to_string(),
            "Transport error: timed out"
        );
    }

    #[test]
    fn test_incomplete_lists_names() {
        let err = Error::Incomplete {
            failed: vec!["api".to_string(), "web".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Reconciliation incomplete: 2 name(s) failed: api, web"
        );
    }
}
