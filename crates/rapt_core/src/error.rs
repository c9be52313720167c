//! Errors reported by the orchestration platform.

/// Result of a platform call
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Failure of a single remote call
///
/// Every variant carries strings only, so errors can be cloned into
/// several reporting paths (log line, terminal message, test assertions).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// Object does not exist
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Object kind (Tool, Job, ConfigMap, Pod)
        kind: String,
        /// Object name
        name: String,
    },

    /// Object with the same name already exists
    #[error("{kind} already exists: {name}")]
    AlreadyExists {
        /// Object kind
        kind: String,
        /// Object name
        name: String,
    },

    /// API server refused the request
    #[error("Rejected by API server ({code}): {reason}")]
    Rejected {
        /// HTTP status code
        code: u16,
        /// Server-provided message
        reason: String,
    },

    /// Connection, TLS or kubeconfig problem
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Change-event stream reported an error
    #[error("Watch error: {0}")]
    Watch(String),
}

impl PlatformError {
    /// Shorthand for a not-found error
    #[must_use]
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    /// Check if the error means the object does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
