//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers assembled once at startup and passed by reference.
//! - No ambient globals: every component receives the section it needs.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ConfigError;

/// Complete runtime configuration for a copy or validate run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HoistConfig {
    /// Object-store session parameters.
    pub object_store: ObjectStoreConfig,
    /// Streaming transfer parameters.
    pub transfer: TransferConfig,
    /// Job framework parameters.
    pub job: JobConfig,
    /// Validation pass parameters.
    pub validate: ValidateConfig,
}

/// Connection parameters for the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Path to the service configuration file.
    pub config_file: PathBuf,
    /// Identity presented when connecting.
    pub identity: String,
    /// Pool that copy jobs write into.
    pub pool: String,
    /// Pool validated against; falls back to `pool` when unset.
    pub validate_pool: Option<String>,
}

impl ObjectStoreConfig {
    /// Pool name the validation pass should read from.
    #[must_use]
    pub fn validation_pool(&self) -> &str {
        self.validate_pool.as_deref().unwrap_or(&self.pool)
    }
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(defaults::OBJECT_STORE_CONFIG_FILE),
            identity: defaults::OBJECT_STORE_IDENTITY.to_string(),
            pool: defaults::OBJECT_STORE_POOL.to_string(),
            validate_pool: None,
        }
    }
}

/// Streaming transfer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Bytes read from the source per chunk.
    pub buffer_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            buffer_size: defaults::TRANSFER_BUFFER_SIZE,
        }
    }
}

/// Parameters handed to the job framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Upper bound on manifest bytes per split; the job kind default applies when unset.
    pub split_max_size: Option<u64>,
    /// Lower bound on manifest bytes per split.
    pub split_min_size: u64,
    /// Per-task timeout; `None` means unbounded.
    pub task_timeout: Option<Duration>,
    /// Number of tasks allowed to run at once.
    pub max_concurrent_tasks: usize,
    /// Directory that receives the transient manifest.
    pub scratch_dir: PathBuf,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            split_max_size: None,
            split_min_size: defaults::SPLIT_MIN_SIZE,
            task_timeout: None,
            max_concurrent_tasks: std::thread::available_parallelism().map_or(1, usize::from),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Validation pass parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidateConfig {
    /// Comparison applied to each object.
    pub strategy: ValidateStrategy,
}

/// How the validate worker decides whether an object matches its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidateStrategy {
    /// Compare the stored object length with the source length.
    #[default]
    Size,
    /// Recompute the source digest and compare it with the stored attribute.
    Digest,
}

impl ValidateStrategy {
    /// Render the strategy as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Digest => "digest",
        }
    }
}

impl FromStr for ValidateStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "size" => Ok(Self::Size),
            "digest" | "md5" => Ok(Self::Digest),
            other => Err(ConfigError::InvalidStrategy {
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_surface() {
        let config = HoistConfig::default();
        assert_eq!(
            config.object_store.config_file,
            PathBuf::from("/etc/hoist/hoist.conf")
        );
        assert_eq!(config.object_store.identity, "admin");
        assert_eq!(config.object_store.pool, "data");
        assert_eq!(config.transfer.buffer_size, 4 * 1024 * 1024);
        assert!(config.job.task_timeout.is_none());
        assert!(config.job.max_concurrent_tasks >= 1);
        assert_eq!(config.validate.strategy, ValidateStrategy::Size);
    }

    #[test]
    fn validation_pool_falls_back_to_copy_pool() {
        let mut store = ObjectStoreConfig::default();
        assert_eq!(store.validation_pool(), "data");
        store.validate_pool = Some("primo".to_string());
        assert_eq!(store.validation_pool(), "primo");
    }

    #[test]
    fn strategy_parses_and_formats() {
        assert_eq!(
            "size".parse::<ValidateStrategy>().ok(),
            Some(ValidateStrategy::Size)
        );
        assert_eq!(
            "Digest".parse::<ValidateStrategy>().ok(),
            Some(ValidateStrategy::Digest)
        );
        assert!("sha1".parse::<ValidateStrategy>().is_err());
        assert_eq!(ValidateStrategy::Digest.as_str(), "digest");
    }
}
