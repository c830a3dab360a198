//! In-process job runner: splits, bounded blocking tasks, reduce, status.
//!
//! # Design
//! - One task per manifest split. Each task runs on a blocking thread, opens
//!   its own mapper (and therefore its own object store session) through
//!   [`MapperFactory::setup`], and drops it when the split is exhausted.
//! - The task loop owns the count-and-continue contract: a record error is
//!   logged, accounted with the mapper's failure outcome, and the loop moves on.
//! - A job succeeds only when every task succeeds. The `_SUCCESS` marker and
//!   the reduce output are written only on success.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hoist_telemetry::{CounterHandle, task_span};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Span, debug, error, info, warn};

use crate::collector::{MismatchCollector, run_reduce, write_report};
use crate::error::{PipelineError, PipelineResult, RecordError, display_chain};
use crate::manifest::{ManifestSplit, SplitReader, plan_splits};
use crate::record::{MismatchRecord, RecordOutcome, SourceRecord};

/// Marker file written into the output directory of a successful job.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Per-task record handler.
pub trait Mapper: Send {
    /// Handle one record.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] when the record could not be processed; the
    /// task loop accounts it with [`Mapper::failure_outcome`].
    fn map(&mut self, record: &SourceRecord) -> Result<RecordOutcome, RecordError>;

    /// Outcome recorded for a record whose processing failed.
    fn failure_outcome(&self) -> RecordOutcome;
}

/// Builds one [`Mapper`] per task.
pub trait MapperFactory: Send + Sync + 'static {
    /// Mapper produced for each task.
    type Mapper: Mapper + 'static;

    /// Task setup. A failure here fails the task.
    ///
    /// # Errors
    ///
    /// Returns the setup error, typically a rejected object store session.
    fn setup(&self, task: usize) -> PipelineResult<Self::Mapper>;
}

/// Everything the runner needs to execute one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Human-readable job name.
    pub name: String,
    /// Manifest to split.
    pub manifest: PathBuf,
    /// Output directory; must not exist yet.
    pub output_dir: PathBuf,
    /// Lower bound on split size in manifest bytes.
    pub split_min_size: u64,
    /// Upper bound on split size in manifest bytes.
    pub split_max_size: u64,
    /// Per-task timeout; `None` means unbounded.
    pub task_timeout: Option<Duration>,
    /// Tasks allowed to run at once.
    pub max_concurrent_tasks: usize,
    /// Whether emitted mismatches go through the reduce step.
    pub reduce: bool,
}

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Every task completed.
    Succeeded,
    /// At least one task failed.
    Failed {
        /// Lowest failing task index, when known.
        task: Option<usize>,
        /// Rendered failure.
        reason: String,
    },
}

impl JobStatus {
    /// Whether the job succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// Terminal status.
    pub status: JobStatus,
    /// Number of tasks (splits) run.
    pub tasks: usize,
    /// Reduced mismatch records, keys ascending. Empty for map-only jobs.
    pub mismatches: Vec<MismatchRecord>,
}

/// Runs jobs on the current tokio runtime.
#[derive(Debug, Clone)]
pub struct LocalRunner {
    span: Span,
}

impl LocalRunner {
    /// Runner whose task spans nest under `span`.
    #[must_use]
    pub const fn new(span: Span) -> Self {
        Self { span }
    }

    /// Execute `spec`, one task per split, and wait for every task.
    ///
    /// # Errors
    ///
    /// Returns an error when the output directory already exists, the manifest
    /// cannot be split, or the job output cannot be written. Task failures are
    /// reported through [`JobStatus::Failed`] instead.
    pub async fn run<F: MapperFactory>(
        &self,
        spec: &JobSpec,
        factory: Arc<F>,
        counters: &CounterHandle,
    ) -> PipelineResult<JobOutcome> {
        if fs::symlink_metadata(&spec.output_dir).is_ok() {
            return Err(PipelineError::OutputExists {
                path: spec.output_dir.clone(),
            });
        }
        let splits = plan_splits(&spec.manifest, spec.split_min_size, spec.split_max_size)?;
        fs::create_dir_all(&spec.output_dir)
            .map_err(|source| PipelineError::io("create_output", &spec.output_dir, source))?;

        let tasks = splits.len();
        info!(job = %spec.name, tasks, "job submitted");

        let limiter = Arc::new(Semaphore::new(spec.max_concurrent_tasks.max(1)));
        let mut running = JoinSet::new();
        for split in splits {
            let permit = Arc::clone(&limiter)
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::LimiterClosed)?;
            let factory = Arc::clone(&factory);
            let counters = counters.clone();
            let span = task_span(&self.span, split.index);
            let timeout = spec.task_timeout;
            running.spawn(async move {
                let task = split.index;
                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let _entered = span.enter();
                    run_task(factory.as_ref(), &split, &counters)
                });
                let joined = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, handle).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            return (
                                task,
                                Err(PipelineError::TaskTimeout {
                                    task,
                                    timeout: limit,
                                }),
                            );
                        }
                    },
                    None => handle.await,
                };
                let result = joined
                    .map_err(|source| PipelineError::TaskJoin {
                        task: Some(task),
                        source,
                    })
                    .and_then(|result| result);
                (task, result)
            });
        }

        let mut failure: Option<(Option<usize>, String)> = None;
        let mut emitted = Vec::new();
        while let Some(joined) = running.join_next().await {
            let (task, result) = match joined {
                Ok((task, result)) => (Some(task), result),
                Err(source) => (None, Err(PipelineError::TaskJoin { task: None, source })),
            };
            match result {
                Ok(mut records) => emitted.append(&mut records),
                Err(err) => {
                    error!(task = ?task, error = ?err, "task failed");
                    let reason = display_chain(&err);
                    if failure
                        .as_ref()
                        .is_none_or(|(current, _)| task < *current)
                    {
                        failure = Some((task, reason));
                    }
                }
            }
        }

        if let Some((task, reason)) = failure {
            warn!(job = %spec.name, "job failed");
            return Ok(JobOutcome {
                status: JobStatus::Failed { task, reason },
                tasks,
                mismatches: Vec::new(),
            });
        }

        let mismatches = if spec.reduce {
            let reduced = run_reduce(&mut MismatchCollector, emitted);
            write_report(&spec.output_dir, &reduced)?;
            reduced
        } else {
            Vec::new()
        };
        let marker = spec.output_dir.join(SUCCESS_MARKER);
        fs::write(&marker, b"").map_err(|source| PipelineError::io("write_marker", &marker, source))?;
        info!(job = %spec.name, tasks, "job succeeded");

        Ok(JobOutcome {
            status: JobStatus::Succeeded,
            tasks,
            mismatches,
        })
    }
}

fn run_task<F: MapperFactory>(
    factory: &F,
    split: &ManifestSplit,
    counters: &CounterHandle,
) -> PipelineResult<Vec<MismatchRecord>> {
    let mut mapper = factory.setup(split.index)?;
    let mut emitted = Vec::new();
    let mut records = 0_u64;

    for record in SplitReader::open(split)? {
        let record =
            record.map_err(|source| PipelineError::io("read_split", &split.manifest, source))?;
        records += 1;
        let outcome = match mapper.map(&record) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(path = %err.path(), error = ?err, "record failed");
                mapper.failure_outcome()
            }
        };
        if let Some(kind) = outcome.counter() {
            counters.increment(kind);
        }
        if let RecordOutcome::Copied { bytes } = outcome {
            counters.add_bytes_copied(bytes);
        }
        if outcome.is_mismatch() {
            emitted.push(MismatchRecord::from(&record));
        }
    }

    debug!(
        task = split.index,
        records,
        start = split.start,
        end = split.end,
        "task finished"
    );
    Ok(emitted)
}
