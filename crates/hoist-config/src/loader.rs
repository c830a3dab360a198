//! Layered configuration assembly.
//!
//! # Design
//! - Start from compiled defaults, then apply environment lookups, then explicit
//!   `key=value` overrides; later layers win.
//! - The environment is an injected lookup function so tests never mutate process state.
//! - The result is validated once and handed out by value.

use std::path::PathBuf;

use tracing::debug;

use crate::defaults::ENV_PREFIX;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{HoistConfig, ValidateStrategy};
use crate::validate::{non_empty, parse_positive, parse_size, parse_timeout};

/// Every configuration key understood by the loader.
pub const KNOWN_KEYS: &[&str] = &[
    "object-store.config-file",
    "object-store.identity",
    "object-store.pool",
    "object-store.validate-pool",
    "transfer.buffer-size",
    "job.split.max-size",
    "job.split.min-size",
    "job.task-timeout",
    "job.max-concurrent-tasks",
    "job.scratch-dir",
    "validate.strategy",
];

/// Environment variable consulted for a dotted key, e.g.
/// `object-store.pool` -> `HOIST_OBJECT_STORE_POOL`.
#[must_use]
pub fn env_var_name(key: &str) -> String {
    let suffix: String = key
        .chars()
        .map(|ch| match ch {
            '.' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect();
    format!("{ENV_PREFIX}{suffix}")
}

/// Builder that layers defaults, environment values, and overrides.
pub struct ConfigLoader<F> {
    env: F,
    overrides: Vec<(String, String)>,
}

impl ConfigLoader<fn(&str) -> Option<String>> {
    /// Loader that reads the process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        fn lookup(name: &str) -> Option<String> {
            std::env::var(name).ok()
        }
        Self::with_env(lookup as fn(&str) -> Option<String>)
    }
}

impl<F> ConfigLoader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Loader backed by a custom environment lookup.
    pub const fn with_env(env: F) -> Self {
        Self {
            env,
            overrides: Vec::new(),
        }
    }

    /// Record an explicit override for `key`.
    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Record an override written as `key=value`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedOverride`] when the text has no `=`.
    pub fn with_override_pair(self, pair: &str) -> ConfigResult<Self> {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ConfigError::MalformedOverride {
                value: pair.to_string(),
            });
        };
        Ok(self.with_override(key.trim(), value))
    }

    /// Assemble and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when an override names an unknown key or any layer
    /// supplies a value that fails validation.
    pub fn load(&self) -> ConfigResult<HoistConfig> {
        let mut config = HoistConfig::default();

        for key in KNOWN_KEYS {
            if let Some(value) = (self.env)(&env_var_name(key)) {
                debug!(key, "applying configuration from environment");
                apply(&mut config, key, &value)?;
            }
        }

        for (key, value) in &self.overrides {
            apply(&mut config, key, value)?;
        }

        check(&config)?;
        Ok(config)
    }
}

fn apply(config: &mut HoistConfig, key: &str, value: &str) -> ConfigResult<()> {
    match key {
        "object-store.config-file" => {
            config.object_store.config_file =
                PathBuf::from(non_empty("object-store.config-file", value)?);
        }
        "object-store.identity" => {
            config.object_store.identity = non_empty("object-store.identity", value)?;
        }
        "object-store.pool" => {
            config.object_store.pool = non_empty("object-store.pool", value)?;
        }
        "object-store.validate-pool" => {
            config.object_store.validate_pool =
                Some(non_empty("object-store.validate-pool", value)?);
        }
        "transfer.buffer-size" => {
            let size = parse_size("transfer.buffer-size", value)?;
            config.transfer.buffer_size = usize::try_from(size)
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| {
                    ConfigError::invalid("transfer.buffer-size", value, "must be positive")
                })?;
        }
        "job.split.max-size" => {
            config.job.split_max_size = Some(parse_size("job.split.max-size", value)?);
        }
        "job.split.min-size" => {
            config.job.split_min_size = parse_size("job.split.min-size", value)?;
        }
        "job.task-timeout" => {
            config.job.task_timeout = parse_timeout("job.task-timeout", value)?;
        }
        "job.max-concurrent-tasks" => {
            config.job.max_concurrent_tasks = parse_positive("job.max-concurrent-tasks", value)?;
        }
        "job.scratch-dir" => {
            config.job.scratch_dir = PathBuf::from(non_empty("job.scratch-dir", value)?);
        }
        "validate.strategy" => {
            config.validate.strategy = value.parse::<ValidateStrategy>()?;
        }
        other => {
            return Err(ConfigError::UnknownField {
                key: other.to_string(),
            });
        }
    }
    Ok(())
}

fn check(config: &HoistConfig) -> ConfigResult<()> {
    if let Some(max) = config.job.split_max_size {
        if max == 0 {
            return Err(ConfigError::invalid(
                "job.split.max-size",
                "0",
                "must be positive",
            ));
        }
        if config.job.split_min_size > max {
            return Err(ConfigError::invalid(
                "job.split.min-size",
                &config.job.split_min_size.to_string(),
                "must not exceed job.split.max-size",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn env_var_name_maps_dots_and_dashes() {
        assert_eq!(
            env_var_name("object-store.config-file"),
            "HOIST_OBJECT_STORE_CONFIG_FILE"
        );
        assert_eq!(env_var_name("job.split.max-size"), "HOIST_JOB_SPLIT_MAX_SIZE");
    }

    #[test]
    fn load_without_layers_returns_defaults() -> anyhow::Result<()> {
        let config = ConfigLoader::with_env(no_env).load()?;
        assert_eq!(config, HoistConfig::default());
        Ok(())
    }

    #[test]
    fn overrides_win_over_environment() -> anyhow::Result<()> {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HOIST_OBJECT_STORE_POOL", "from-env"),
            ("HOIST_TRANSFER_BUFFER_SIZE", "1MiB"),
        ]);
        let config = ConfigLoader::with_env(|name: &str| env.get(name).map(ToString::to_string))
            .with_override("object-store.pool", "from-override")
            .with_override_pair("job.task-timeout=unbounded")?
            .with_override_pair("validate.strategy=digest")?
            .load()?;

        assert_eq!(config.object_store.pool, "from-override");
        assert_eq!(config.transfer.buffer_size, 1024 * 1024);
        assert_eq!(config.job.task_timeout, None);
        assert_eq!(config.validate.strategy, ValidateStrategy::Digest);
        Ok(())
    }

    #[test]
    fn split_bounds_and_timeouts_parse() -> anyhow::Result<()> {
        let config = ConfigLoader::with_env(no_env)
            .with_override("job.split.max-size", "3000")
            .with_override("job.split.min-size", "10")
            .with_override("job.task-timeout", "90")
            .with_override("job.max-concurrent-tasks", "3")
            .load()?;
        assert_eq!(config.job.split_max_size, Some(3000));
        assert_eq!(config.job.split_min_size, 10);
        assert_eq!(config.job.task_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.job.max_concurrent_tasks, 3);
        Ok(())
    }

    #[test]
    fn unknown_keys_and_malformed_pairs_are_rejected() {
        let err = ConfigLoader::with_env(no_env)
            .with_override("ceph.pool", "data")
            .load()
            .err();
        assert!(matches!(err, Some(ConfigError::UnknownField { .. })));

        let err = ConfigLoader::with_env(no_env)
            .with_override_pair("object-store.pool")
            .err();
        assert!(matches!(err, Some(ConfigError::MalformedOverride { .. })));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (key, value) in [
            ("transfer.buffer-size", "0"),
            ("object-store.identity", " "),
            ("job.max-concurrent-tasks", "0"),
            ("job.split.max-size", "0"),
        ] {
            let result = ConfigLoader::with_env(no_env)
                .with_override(key, value)
                .load();
            assert!(
                matches!(result, Err(ConfigError::InvalidField { .. })),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn min_split_must_not_exceed_max_split() {
        let result = ConfigLoader::with_env(no_env)
            .with_override("job.split.max-size", "100")
            .with_override("job.split.min-size", "200")
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidField { .. })));
    }

    #[test]
    fn invalid_environment_values_surface_errors() {
        let result = ConfigLoader::with_env(|name: &str| {
            (name == "HOIST_VALIDATE_STRATEGY").then(|| "crc".to_string())
        })
        .load();
        assert!(matches!(result, Err(ConfigError::InvalidStrategy { .. })));
    }
}
