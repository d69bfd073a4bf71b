//! Error types for the VoiceCast application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire VoiceCast application.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. The enum is serializable so
/// errors can cross an IPC boundary to a desktop shell unchanged.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CastingError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A versioned commit was rejected because the caller's expected version
    /// no longer matches the store's current version
    #[error("Version conflict: store is at version {current_version}")]
    VersionConflict { current_version: u64 },

    /// The remote store rejected a commit as invalid
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Transient network/transport error
    #[error("Network error: {message}")]
    Network { message: String },

    /// The document (or a response body) could not be parsed
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An in-flight operation was cancelled by the caller
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CastingError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a VersionConflict error
    pub fn version_conflict(current_version: u64) -> Self {
        Self::VersionConflict { current_version }
    }

    /// Creates a Validation error from one or more messages
    pub fn validation(messages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Validation(messages.into_iter().map(Into::into).collect())
    }

    /// Creates a Network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Cancelled error
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a VersionConflict error
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Check if this is a Validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a Network error
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Check if this is a Parse error
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Check if this is a Cancelled error
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Check if retrying the same request could possibly succeed.
    ///
    /// Returns true only for transient `Network` errors. `VersionConflict`
    /// deliberately returns false: it requires an explicit refetch by the
    /// caller before any retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for CastingError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for CastingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for CastingError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for CastingError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, CastingError>`.
pub type Result<T> = std::result::Result<T, CastingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_is_not_transient() {
        let err = CastingError::version_conflict(7);
        assert!(err.is_version_conflict());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_network_is_transient() {
        let err = CastingError::network("connection reset");
        assert!(err.is_network());
        assert!(err.is_transient());
    }

    #[test]
    fn test_validation_message_joins() {
        let err = CastingError::validation(["ALICE: missing provider", "BOB: bad config"]);
        assert_eq!(
            err.to_string(),
            "Validation failed: ALICE: missing provider; BOB: bad config"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CastingError = io_err.into();
        assert!(matches!(err, CastingError::Io { .. }));
    }
}
