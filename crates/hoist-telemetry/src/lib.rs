#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, unused)]

//! Telemetry primitives shared across the hoist workspace.
//!
//! This crate centralises logging setup, job/task spans, and the per-job outcome
//! counters that workers increment and the orchestrator reports.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{GlobalContextGuard, job_span, record_stage, task_span};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
pub use metrics::{CounterHandle, CounterKind, CounterSnapshot, JobCounters};
