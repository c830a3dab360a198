//! Prometheus-backed job counters and snapshot helpers.
//!
//! # Design
//! - One registry per job run; counters start at zero for every job.
//! - Workers receive an increment-only [`CounterHandle`]; only the owner of
//!   [`JobCounters`] can read a snapshot or render the registry.

use std::path::Path;
use std::sync::Arc;

use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Outcome counters maintained across every worker in a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    /// Files copied and stamped with a digest.
    CopySucceeded,
    /// Files whose copy failed.
    CopyFailed,
    /// Objects matching their source.
    ValidateMatched,
    /// Objects missing or differing from their source.
    ValidateMismatched,
}

impl CounterKind {
    /// Metric name registered for the counter.
    #[must_use]
    pub const fn metric_name(self) -> &'static str {
        match self {
            Self::CopySucceeded => "hoist_copy_succeeded_total",
            Self::CopyFailed => "hoist_copy_failed_total",
            Self::ValidateMatched => "hoist_validate_matched_total",
            Self::ValidateMismatched => "hoist_validate_mismatched_total",
        }
    }

    const fn help(self) -> &'static str {
        match self {
            Self::CopySucceeded => "Files copied into the object store",
            Self::CopyFailed => "Files that failed to copy",
            Self::ValidateMatched => "Objects matching their source file",
            Self::ValidateMismatched => "Objects missing or differing from their source file",
        }
    }
}

struct CountersInner {
    registry: Registry,
    copy_succeeded: IntCounter,
    copy_failed: IntCounter,
    validate_matched: IntCounter,
    validate_mismatched: IntCounter,
    bytes_copied: IntCounter,
}

impl CountersInner {
    const fn counter(&self, kind: CounterKind) -> &IntCounter {
        match kind {
            CounterKind::CopySucceeded => &self.copy_succeeded,
            CounterKind::CopyFailed => &self.copy_failed,
            CounterKind::ValidateMatched => &self.validate_matched,
            CounterKind::ValidateMismatched => &self.validate_mismatched,
        }
    }
}

/// Per-job counter registry owned by the orchestrator.
#[derive(Clone)]
pub struct JobCounters {
    inner: Arc<CountersInner>,
}

/// Increment-only view handed to workers.
#[derive(Clone)]
pub struct CounterHandle {
    inner: Arc<CountersInner>,
}

/// Point-in-time copy of every job counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Files copied successfully.
    pub copy_succeeded: u64,
    /// Files that failed to copy.
    pub copy_failed: u64,
    /// Objects that matched their source.
    pub validate_matched: u64,
    /// Objects that did not match their source.
    pub validate_mismatched: u64,
    /// Bytes streamed into the object store.
    pub bytes_copied: u64,
}

impl CounterSnapshot {
    /// Read a single outcome counter from the snapshot.
    #[must_use]
    pub const fn get(&self, kind: CounterKind) -> u64 {
        match kind {
            CounterKind::CopySucceeded => self.copy_succeeded,
            CounterKind::CopyFailed => self.copy_failed,
            CounterKind::ValidateMatched => self.validate_matched,
            CounterKind::ValidateMismatched => self.validate_mismatched,
        }
    }
}

impl JobCounters {
    /// Construct a fresh registry with every job counter registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let build = |kind: CounterKind| {
            counter(&registry, kind.metric_name(), kind.help())
        };

        let copy_succeeded = build(CounterKind::CopySucceeded)?;
        let copy_failed = build(CounterKind::CopyFailed)?;
        let validate_matched = build(CounterKind::ValidateMatched)?;
        let validate_mismatched = build(CounterKind::ValidateMismatched)?;
        let bytes_copied = counter(
            &registry,
            "hoist_bytes_copied_total",
            "Bytes streamed into the object store",
        )?;

        Ok(Self {
            inner: Arc::new(CountersInner {
                registry,
                copy_succeeded,
                copy_failed,
                validate_matched,
                validate_mismatched,
                bytes_copied,
            }),
        })
    }

    /// Increment-only handle for a worker.
    #[must_use]
    pub fn handle(&self) -> CounterHandle {
        CounterHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Take a point-in-time snapshot of every counter.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            copy_succeeded: self.inner.copy_succeeded.get(),
            copy_failed: self.inner.copy_failed.get(),
            validate_matched: self.inner.validate_matched.get(),
            validate_mismatched: self.inner.validate_mismatched.get(),
            bytes_copied: self.inner.bytes_copied.get(),
        }
    }

    /// Render the registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Render the registry and write it to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails or the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let rendered = self.render()?;
        std::fs::write(path, rendered).map_err(|source| TelemetryError::MetricsWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl CounterHandle {
    /// Increment one outcome counter by one.
    pub fn increment(&self, kind: CounterKind) {
        self.inner.counter(kind).inc();
    }

    /// Add transferred bytes to the running total.
    pub fn add_bytes_copied(&self, bytes: u64) {
        self.inner.bytes_copied.inc_by(bytes);
    }
}

fn counter(registry: &Registry, name: &'static str, help: &'static str) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(counter)
}
