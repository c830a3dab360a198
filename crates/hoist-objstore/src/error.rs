//! # Design
//!
//! - Constant error messages with structured context fields.
//! - Connection-time failures are separated from per-object failures so callers
//!   can treat the former as fatal and the latter as count-and-continue.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for object-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by the object-store client and its backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The service configuration file could not be read.
    #[error("object store config unreadable")]
    ConfigRead {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The service configuration file could not be parsed.
    #[error("object store config invalid")]
    ConfigParse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
    /// A required session setting was empty.
    #[error("object store setting missing")]
    MissingSetting {
        /// Setting that was missing.
        field: &'static str,
    },
    /// The service refused the presented identity.
    #[error("object store identity rejected")]
    IdentityRejected {
        /// Identity presented by the client.
        identity: String,
    },
    /// The requested pool does not exist.
    #[error("object store pool not found")]
    PoolNotFound {
        /// Pool requested by the client.
        pool: String,
    },
    /// The object does not exist.
    #[error("object not found")]
    ObjectNotFound {
        /// Object identifier.
        oid: String,
    },
    /// The object exists but carries no attribute with the requested name.
    #[error("object attribute not found")]
    AttributeNotFound {
        /// Object identifier.
        oid: String,
        /// Attribute name.
        name: String,
    },
    /// The stored attribute value could not be decoded.
    #[error("object attribute malformed")]
    AttributeEncoding {
        /// Object identifier.
        oid: String,
        /// Attribute name.
        name: String,
    },
    /// Reading the source stream failed mid-transfer.
    #[error("source read failed")]
    SourceRead {
        /// Object identifier being written.
        oid: String,
        /// Offset reached before the failure.
        offset: u64,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A backend IO operation failed.
    #[error("object store io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Object metadata could not be encoded or decoded.
    #[error("object metadata invalid")]
    Metadata {
        /// Path of the metadata record.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The backend is unavailable for a reason it reported itself.
    #[error("object store unavailable")]
    Unavailable {
        /// Operation that was attempted.
        operation: &'static str,
        /// Backend supplied detail.
        detail: String,
    },
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the error happened while establishing a session rather than
    /// while handling a single object.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigRead { .. }
                | Self::ConfigParse { .. }
                | Self::MissingSetting { .. }
                | Self::IdentityRejected { .. }
                | Self::PoolNotFound { .. }
        )
    }
}
