//! Seams between the client and a concrete object service.
//!
//! # Design
//! - [`StoreConnector`] is shared across tasks and opens one session per call.
//! - [`ObjectBackend`] is the session itself: owned, `Send`, never shared.
//! - Backends expose the primitive operations only; chunking, digesting and
//!   validation live in [`crate::ObjectStoreClient`].

use std::path::PathBuf;

use hoist_config::ObjectStoreConfig;

use crate::error::{StoreError, StoreResult};

/// Parameters needed to open a session against one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Service configuration file.
    pub config_file: PathBuf,
    /// Identity presented to the service.
    pub identity: String,
    /// Pool the session is bound to.
    pub pool: String,
}

impl SessionSettings {
    /// Build settings from explicit values.
    #[must_use]
    pub fn new(
        config_file: impl Into<PathBuf>,
        identity: impl Into<String>,
        pool: impl Into<String>,
    ) -> Self {
        Self {
            config_file: config_file.into(),
            identity: identity.into(),
            pool: pool.into(),
        }
    }

    /// Settings for a copy session, bound to the copy pool.
    #[must_use]
    pub fn for_copy(config: &ObjectStoreConfig) -> Self {
        Self::new(&config.config_file, &config.identity, &config.pool)
    }

    /// Settings for a validation session, bound to the validation pool.
    #[must_use]
    pub fn for_validation(config: &ObjectStoreConfig) -> Self {
        Self::new(
            &config.config_file,
            &config.identity,
            config.validation_pool(),
        )
    }

    pub(crate) fn check(&self) -> StoreResult<()> {
        if self.config_file.as_os_str().is_empty() {
            return Err(StoreError::MissingSetting {
                field: "config_file",
            });
        }
        if self.identity.trim().is_empty() {
            return Err(StoreError::MissingSetting { field: "identity" });
        }
        if self.pool.trim().is_empty() {
            return Err(StoreError::MissingSetting { field: "pool" });
        }
        Ok(())
    }
}

/// Identifier and length of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    /// Identifier reported by the service.
    pub oid: String,
    /// Object length in bytes.
    pub size: u64,
}

/// Opens sessions against an object service.
pub trait StoreConnector: Send + Sync {
    /// Establish a session bound to `settings.pool`.
    ///
    /// # Errors
    ///
    /// Returns a connection error when the configuration is unreadable, the
    /// identity is refused or the pool does not exist.
    fn connect(&self, settings: &SessionSettings) -> StoreResult<Box<dyn ObjectBackend>>;
}

/// One open session bound to a single pool.
pub trait ObjectBackend: Send {
    /// Pool the session writes into.
    fn pool(&self) -> &str;

    /// Resize `oid` to `size` bytes, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the service rejects the operation.
    fn truncate(&mut self, oid: &str, size: u64) -> StoreResult<()>;

    /// Write `data` into `oid` starting at `offset`, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the service rejects the operation.
    fn write_at(&mut self, oid: &str, data: &[u8], offset: u64) -> StoreResult<()>;

    /// Set extended attribute `name` on an existing object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ObjectNotFound`] when `oid` does not exist.
    fn set_xattr(&mut self, oid: &str, name: &str, value: &[u8]) -> StoreResult<()>;

    /// Read extended attribute `name` from an existing object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ObjectNotFound`] or
    /// [`StoreError::AttributeNotFound`] when either is missing.
    fn get_xattr(&mut self, oid: &str, name: &str) -> StoreResult<Vec<u8>>;

    /// Stat `oid`; `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the service cannot answer.
    fn stat(&mut self, oid: &str) -> StoreResult<Option<ObjectStat>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_pool_selection() {
        let mut config = ObjectStoreConfig::default();
        config.validate_pool = Some("audit".to_string());
        assert_eq!(SessionSettings::for_copy(&config).pool, "data");
        assert_eq!(SessionSettings::for_validation(&config).pool, "audit");
    }

    #[test]
    fn check_rejects_blank_fields() {
        let settings = SessionSettings::new("/etc/hoist/hoist.conf", " ", "data");
        assert!(matches!(
            settings.check(),
            Err(StoreError::MissingSetting { field: "identity" })
        ));
        let settings = SessionSettings::new("", "admin", "data");
        assert!(matches!(
            settings.check(),
            Err(StoreError::MissingSetting {
                field: "config_file"
            })
        ));
        let settings = SessionSettings::new("/etc/hoist/hoist.conf", "admin", "");
        assert!(matches!(
            settings.check(),
            Err(StoreError::MissingSetting { field: "pool" })
        ));
        assert!(
            SessionSettings::new("/etc/hoist/hoist.conf", "admin", "data")
                .check()
                .is_ok()
        );
    }
}
