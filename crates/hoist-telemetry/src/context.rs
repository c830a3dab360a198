//! Span helpers for process, job, and task context.
//!
//! # Design
//! - A process-level span carries the CLI command for the lifetime of the guard.
//! - Job and task spans are plain `Span` values so async code can `instrument` them
//!   instead of holding an entered guard across `.await` points.

use tracing::{Span, span::Entered};

/// Guard that keeps the process-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the process-level tracing span for the lifetime of the guard.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "hoist",
            command = %command,
            version = env!("CARGO_PKG_VERSION")
        )));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Span covering one job run; `stage` is recorded as the orchestrator advances.
#[must_use]
pub fn job_span(kind: &str, job_id: &str) -> Span {
    tracing::info_span!("job", kind = %kind, job_id = %job_id, stage = tracing::field::Empty)
}

/// Record the orchestrator stage on a job span.
pub fn record_stage(span: &Span, stage: &str) {
    span.record("stage", tracing::field::display(stage));
}

/// Span covering one task (one split) inside a job.
#[must_use]
pub fn task_span(parent: &Span, task: usize) -> Span {
    tracing::info_span!(parent: parent, "task", task)
}
