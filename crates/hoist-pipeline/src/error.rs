//! # Design
//!
//! - Structured, constant-message errors for the copy/validate pipeline.
//! - [`PipelineError`] is fatal for a task or a job; [`RecordError`] covers a
//!   single manifest record and never escapes the task loop.
//! - Source errors are preserved, never interpolated into messages.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use hoist_objstore::StoreError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that abort a task, a job, or the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// IO failures while interacting with the local filesystem.
    #[error("pipeline io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Listing a source directory failed while building the manifest.
    #[error("source listing failed")]
    Listing {
        /// Directory that could not be listed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Opening an object store session failed during task setup.
    #[error("object store session failed")]
    Session {
        /// Task whose setup failed.
        task: usize,
        /// Underlying store error.
        source: StoreError,
    },
    /// A regular file's path is not UTF-8 or contains a line break, so it
    /// cannot be written as one manifest line.
    #[error("source path cannot be recorded in the manifest")]
    UnrepresentablePath {
        /// Offending path.
        path: PathBuf,
    },
    /// Input validation failures.
    #[error("pipeline invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The job output directory already exists.
    #[error("job output directory already exists")]
    OutputExists {
        /// Output directory requested for the job.
        path: PathBuf,
    },
    /// A blocking task panicked or was cancelled.
    #[error("task did not complete")]
    TaskJoin {
        /// Task index, when the failure can be attributed to one.
        task: Option<usize>,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
    /// The task limiter was closed while tasks were still queued.
    #[error("task limiter closed")]
    LimiterClosed,
    /// A task exceeded the configured timeout.
    #[error("task timed out")]
    TaskTimeout {
        /// Task index.
        task: usize,
        /// Timeout that elapsed.
        timeout: Duration,
    },
}

impl PipelineError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: Option<String>) -> Self {
        Self::InvalidInput {
            field,
            reason,
            value,
        }
    }
}

/// Render `err` and every source beneath it as `outer: inner: ...`.
#[must_use]
pub fn display_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        rendered.push_str(": ");
        rendered.push_str(&source.to_string());
        current = source.source();
    }
    rendered
}

/// Failure handling one manifest record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The source path could not be inspected or read.
    #[error("source unavailable")]
    Source {
        /// Operation that failed.
        operation: &'static str,
        /// Source path from the manifest.
        path: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The object store rejected the transfer.
    #[error("object store transfer failed")]
    Store {
        /// Source path from the manifest.
        path: String,
        /// Underlying store error.
        source: StoreError,
    },
}

impl RecordError {
    pub(crate) fn unreadable(operation: &'static str, path: &str, source: io::Error) -> Self {
        Self::Source {
            operation,
            path: path.to_string(),
            source,
        }
    }

    /// Manifest path the failure belongs to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Source { path, .. } | Self::Store { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn helpers_build_variants_with_sources() {
        let err = PipelineError::io("create_manifest", "/tmp/m", io::Error::other("io"));
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(err.source().is_some());

        let err = PipelineError::invalid("output_dir", "must not be empty", None);
        assert!(matches!(
            err,
            PipelineError::InvalidInput {
                field: "output_dir",
                ..
            }
        ));
    }

    #[test]
    fn record_error_exposes_path() {
        let err = RecordError::unreadable("open", "/data/a.txt", io::Error::other("gone"));
        assert_eq!(err.path(), "/data/a.txt");
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "source unavailable");
        assert_eq!(display_chain(&err), "source unavailable: gone");
    }
}
