//! Records flowing between the manifest, the workers and the collector.

use std::fmt;

use hoist_telemetry::CounterKind;
use serde::Serialize;

/// One manifest line: byte offset of the line plus the source path on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceRecord {
    /// Byte offset of the line in the manifest.
    pub key: u64,
    /// Source path.
    pub path: String,
}

impl SourceRecord {
    /// Build a record.
    #[must_use]
    pub fn new(key: u64, path: impl Into<String>) -> Self {
        Self {
            key,
            path: path.into(),
        }
    }
}

/// A record that failed validation, re-emitted unchanged into the report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MismatchRecord {
    /// Manifest offset of the record.
    pub key: u64,
    /// Source path.
    pub path: String,
}

impl From<&SourceRecord> for MismatchRecord {
    fn from(record: &SourceRecord) -> Self {
        Self {
            key: record.key,
            path: record.path.clone(),
        }
    }
}

impl fmt::Display for MismatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.path)
    }
}

/// What a worker did with one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The source was streamed into the object store.
    Copied {
        /// Bytes written.
        bytes: u64,
    },
    /// The copy failed; the worker moved on.
    CopyFailed,
    /// The object matches its source.
    Matched,
    /// The object is missing or differs from its source.
    Mismatched,
    /// The record was not a regular file and was not processed.
    Skipped,
}

impl RecordOutcome {
    /// Counter incremented for this outcome, if any.
    #[must_use]
    pub const fn counter(&self) -> Option<CounterKind> {
        match self {
            Self::Copied { .. } => Some(CounterKind::CopySucceeded),
            Self::CopyFailed => Some(CounterKind::CopyFailed),
            Self::Matched => Some(CounterKind::ValidateMatched),
            Self::Mismatched => Some(CounterKind::ValidateMismatched),
            Self::Skipped => None,
        }
    }

    /// Whether the record must be forwarded to the mismatch collector.
    #[must_use]
    pub const fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatched)
    }
}
