//! Parsing helpers for configuration values supplied as text.

use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Parse a byte size such as `4194304`, `4MiB`, `512KB`, or `1GiB`.
///
/// Suffixes are binary multiples regardless of the `i`.
pub(crate) fn parse_size(key: &'static str, raw: &str) -> ConfigResult<u64> {
    let text = raw.trim().to_ascii_uppercase();
    let (digits, multiplier) = [
        ("GIB", 1024_u64 * 1024 * 1024),
        ("GB", 1024 * 1024 * 1024),
        ("MIB", 1024 * 1024),
        ("MB", 1024 * 1024),
        ("KIB", 1024),
        ("KB", 1024),
        ("B", 1),
    ]
    .iter()
    .find_map(|(suffix, multiplier)| {
        text.strip_suffix(suffix)
            .map(|digits| (digits.trim().to_string(), *multiplier))
    })
    .unwrap_or((text.clone(), 1));

    let value = digits
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(key, raw, "must be a byte size"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| ConfigError::invalid(key, raw, "byte size overflows"))
}

/// Parse a positive `usize`, rejecting zero.
pub(crate) fn parse_positive(key: &'static str, raw: &str) -> ConfigResult<usize> {
    let value = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::invalid(key, raw, "must be an integer"))?;
    if value == 0 {
        return Err(ConfigError::invalid(key, raw, "must be positive"));
    }
    Ok(value)
}

/// Parse a task timeout in seconds; `0`, `none`, and `unbounded` disable it.
pub(crate) fn parse_timeout(key: &'static str, raw: &str) -> ConfigResult<Option<Duration>> {
    let text = raw.trim().to_ascii_lowercase();
    if matches!(text.as_str(), "0" | "none" | "unbounded") {
        return Ok(None);
    }
    let seconds = text
        .strip_suffix('s')
        .unwrap_or(&text)
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(key, raw, "must be seconds or 'unbounded'"))?;
    Ok(Some(Duration::from_secs(seconds)))
}

/// Trim a string value and reject it when empty.
pub(crate) fn non_empty(key: &'static str, raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(key, raw, "must not be empty"));
    }
    Ok(trimmed.to_string())
}
