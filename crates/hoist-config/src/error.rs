//! Error types for configuration assembly.

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid value for '{key}': {reason}")]
    InvalidField {
        /// Dotted configuration key that failed validation.
        key: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Key is not part of the recognised configuration surface.
    #[error("unknown configuration key '{key}'")]
    UnknownField {
        /// Key supplied by the caller.
        key: String,
    },
    /// Override was not in `key=value` form.
    #[error("malformed override '{value}', expected key=value")]
    MalformedOverride {
        /// Raw override text.
        value: String,
    },
    /// Validation strategy name was not recognised.
    #[error("invalid validation strategy '{value}'")]
    InvalidStrategy {
        /// Strategy payload provided by the caller.
        value: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: &str, reason: &'static str) -> Self {
        Self::InvalidField {
            key,
            value: Some(value.to_string()),
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
