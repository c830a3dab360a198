//! Pipeline orchestrator: configure, build the manifest, run the job, report,
//! clean up.
//!
//! # Design
//! - Stages run in a fixed order and are recorded on the job span:
//!   `configure -> build_manifest -> submit -> await_completion -> report -> cleanup`.
//! - A manifest the orchestrator built is removed on every exit path. A
//!   manifest supplied by the caller is never touched.
//! - Task failures produce a report with a failed status; only setup problems
//!   (bad input, unlistable source, unwritable output) surface as errors.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hoist_config::HoistConfig;
use hoist_objstore::{SessionSettings, StoreConnector};
use hoist_telemetry::{CounterSnapshot, JobCounters, job_span, record_stage};
use serde::Serialize;
use tracing::{Instrument, Span, debug, info, warn};
use uuid::Uuid;

use crate::copy::CopyMapperFactory;
use crate::error::{PipelineError, PipelineResult};
use crate::manifest::build_manifest;
use crate::runner::{JobOutcome, JobSpec, JobStatus, LocalRunner, MapperFactory};
use crate::source::SourceFs;
use crate::validate::ValidateMapperFactory;

/// Default split upper bound for copy jobs, in manifest bytes.
pub const COPY_SPLIT_MAX_SIZE: u64 = 3000;
/// Default split upper bound for validate jobs, in manifest bytes.
pub const VALIDATE_SPLIT_MAX_SIZE: u64 = 5000;

/// Which pass to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Map-only copy into the object store.
    Copy,
    /// Map plus pass-through reduce comparing objects with sources.
    Validate,
}

impl JobKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Validate => "validate",
        }
    }

    /// Split upper bound applied when none is configured.
    #[must_use]
    pub const fn default_split_max_size(self) -> u64 {
        match self {
            Self::Copy => COPY_SPLIT_MAX_SIZE,
            Self::Validate => VALIDATE_SPLIT_MAX_SIZE,
        }
    }

    const fn reduces(self) -> bool {
        matches!(self, Self::Validate)
    }
}

/// Where the job's records come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobInput {
    /// Walk this tree into a transient manifest.
    SourceRoot(PathBuf),
    /// Use this existing manifest as is.
    Manifest(PathBuf),
}

/// One copy or validate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Pass to run.
    pub kind: JobKind,
    /// Record source.
    pub input: JobInput,
    /// Job output directory; must not exist yet.
    pub output_dir: PathBuf,
}

/// Orchestrator stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Resolve split bounds and timeouts.
    Configure,
    /// Walk the source tree.
    BuildManifest,
    /// Hand the job to the runner.
    Submit,
    /// Wait for every task.
    AwaitCompletion,
    /// Read and log counters.
    Report,
    /// Remove the transient manifest.
    Cleanup,
}

impl Stage {
    /// Snake-case name recorded on the job span.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::BuildManifest => "build_manifest",
            Self::Submit => "submit",
            Self::AwaitCompletion => "await_completion",
            Self::Report => "report",
            Self::Cleanup => "cleanup",
        }
    }
}

/// Summary of a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    /// Random identifier of the run.
    pub job_id: Uuid,
    /// Pass that ran.
    pub kind: JobKind,
    /// Terminal status reported by the runner.
    pub status: JobStatus,
    /// Tasks run.
    pub tasks: usize,
    /// Counter values at completion.
    pub counters: CounterSnapshot,
    /// Lines written to the mismatch report.
    pub mismatches: usize,
    /// Job output directory.
    pub output_dir: PathBuf,
}

impl JobReport {
    /// Whether the job succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.status.is_success()
    }

    /// Process exit status: 0 on success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }
}

/// Drives copy and validate jobs.
pub struct Pipeline {
    config: HoistConfig,
    fs: Arc<dyn SourceFs>,
    connector: Arc<dyn StoreConnector>,
}

impl Pipeline {
    /// Pipeline over `fs` writing through `connector`.
    #[must_use]
    pub fn new(
        config: HoistConfig,
        fs: Arc<dyn SourceFs>,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        Self {
            config,
            fs,
            connector,
        }
    }

    /// Configuration the pipeline was built with.
    #[must_use]
    pub const fn config(&self) -> &HoistConfig {
        &self.config
    }

    /// Run one job to completion. `counters` must be fresh for this job.
    ///
    /// # Errors
    ///
    /// Returns an error when the request is invalid, the manifest cannot be
    /// built, or the job output cannot be created. Task failures are reported
    /// through the returned [`JobReport`].
    pub async fn run(
        &self,
        request: &JobRequest,
        counters: &JobCounters,
    ) -> PipelineResult<JobReport> {
        let job_id = Uuid::new_v4();
        let span = job_span(request.kind.as_str(), &job_id.to_string());
        self.run_job(job_id, request, counters, &span)
            .instrument(span.clone())
            .await
    }

    async fn run_job(
        &self,
        job_id: Uuid,
        request: &JobRequest,
        counters: &JobCounters,
        span: &Span,
    ) -> PipelineResult<JobReport> {
        enter_stage(span, Stage::Configure);
        let (manifest, transient) = match &request.input {
            JobInput::SourceRoot(_) => (self.config.job.scratch_dir.join(job_id.to_string()), true),
            JobInput::Manifest(path) => (path.clone(), false),
        };
        let spec = self.configure(request, manifest)?;

        let result = self.execute(job_id, request, &spec, counters, span).await;

        if transient {
            enter_stage(span, Stage::Cleanup);
            remove_manifest(&spec.manifest);
        }
        result
    }

    fn configure(&self, request: &JobRequest, manifest: PathBuf) -> PipelineResult<JobSpec> {
        if request.output_dir.as_os_str().is_empty() {
            return Err(PipelineError::invalid("output_dir", "must not be empty", None));
        }
        if let Some(timeout) = self.config.job.task_timeout {
            info!(configured = ?timeout, "task timeout forced to unbounded");
        }
        let job = &self.config.job;
        let spec = JobSpec {
            name: format!("hoist-{}", request.kind.as_str()),
            manifest,
            output_dir: request.output_dir.clone(),
            split_min_size: job.split_min_size,
            split_max_size: job
                .split_max_size
                .unwrap_or_else(|| request.kind.default_split_max_size()),
            task_timeout: None,
            max_concurrent_tasks: job.max_concurrent_tasks,
            reduce: request.kind.reduces(),
        };
        debug!(
            split_min = spec.split_min_size,
            split_max = spec.split_max_size,
            max_concurrent_tasks = spec.max_concurrent_tasks,
            "job configured"
        );
        Ok(spec)
    }

    async fn execute(
        &self,
        job_id: Uuid,
        request: &JobRequest,
        spec: &JobSpec,
        counters: &JobCounters,
        span: &Span,
    ) -> PipelineResult<JobReport> {
        if let JobInput::SourceRoot(root) = &request.input {
            enter_stage(span, Stage::BuildManifest);
            build_manifest(self.fs.as_ref(), root, &spec.manifest)?;
        }

        let store = &self.config.object_store;
        let buffer_size = self.config.transfer.buffer_size;
        let outcome = match request.kind {
            JobKind::Copy => {
                let factory = CopyMapperFactory::new(
                    Arc::clone(&self.fs),
                    Arc::clone(&self.connector),
                    SessionSettings::for_copy(store),
                    buffer_size,
                );
                submit(spec, factory, counters, span).await?
            }
            JobKind::Validate => {
                let factory = ValidateMapperFactory::new(
                    Arc::clone(&self.fs),
                    Arc::clone(&self.connector),
                    SessionSettings::for_validation(store),
                    self.config.validate.strategy,
                    buffer_size,
                );
                submit(spec, factory, counters, span).await?
            }
        };

        enter_stage(span, Stage::Report);
        let snapshot = counters.snapshot();
        info!(
            status = ?outcome.status,
            tasks = outcome.tasks,
            copy_succeeded = snapshot.copy_succeeded,
            copy_failed = snapshot.copy_failed,
            validate_matched = snapshot.validate_matched,
            validate_mismatched = snapshot.validate_mismatched,
            bytes_copied = snapshot.bytes_copied,
            "job finished"
        );
        Ok(JobReport {
            job_id,
            kind: request.kind,
            status: outcome.status,
            tasks: outcome.tasks,
            counters: snapshot,
            mismatches: outcome.mismatches.len(),
            output_dir: spec.output_dir.clone(),
        })
    }
}

async fn submit<F: MapperFactory>(
    spec: &JobSpec,
    factory: F,
    counters: &JobCounters,
    span: &Span,
) -> PipelineResult<JobOutcome> {
    enter_stage(span, Stage::Submit);
    let runner = LocalRunner::new(span.clone());
    let handle = counters.handle();
    let job = runner.run(spec, Arc::new(factory), &handle);
    enter_stage(span, Stage::AwaitCompletion);
    job.await
}

fn enter_stage(span: &Span, stage: Stage) {
    record_stage(span, stage.as_str());
    debug!(stage = stage.as_str(), "stage entered");
}

fn remove_manifest(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(manifest = %path.display(), "transient manifest removed"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            manifest = %path.display(),
            error = ?err,
            "failed to remove transient manifest"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LocalFs;
    use anyhow::Result;
    use hoist_objstore::MemoryCluster;
    use std::time::Duration;

    fn pipeline(scratch: &Path, cluster: &MemoryCluster) -> Pipeline {
        let mut config = HoistConfig::default();
        config.job.scratch_dir = scratch.to_path_buf();
        config.job.task_timeout = Some(Duration::from_secs(1));
        Pipeline::new(config, Arc::new(LocalFs), Arc::new(cluster.connector()))
    }

    fn scratch_entries(scratch: &Path) -> Result<usize> {
        Ok(fs::read_dir(scratch)?.count())
    }

    #[test]
    fn configure_applies_kind_defaults_and_forces_timeout() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let cluster = MemoryCluster::with_pools(["data"]);
        let pipeline = pipeline(temp.path(), &cluster);
        let request = JobRequest {
            kind: JobKind::Validate,
            input: JobInput::Manifest(temp.path().join("m")),
            output_dir: temp.path().join("out"),
        };
        let spec = pipeline.configure(&request, temp.path().join("m"))?;
        assert_eq!(spec.split_max_size, VALIDATE_SPLIT_MAX_SIZE);
        assert_eq!(spec.split_min_size, 0);
        assert!(spec.task_timeout.is_none());
        assert!(spec.reduce);

        let copy = JobRequest {
            kind: JobKind::Copy,
            ..request
        };
        let spec = pipeline.configure(&copy, temp.path().join("m"))?;
        assert_eq!(spec.split_max_size, COPY_SPLIT_MAX_SIZE);
        assert!(!spec.reduce);
        Ok(())
    }

    #[tokio::test]
    async fn transient_manifest_is_removed_after_success_and_failure() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let scratch = temp.path().join("scratch");
        fs::create_dir_all(&scratch)?;
        let source = temp.path().join("src");
        fs::create_dir_all(&source)?;
        fs::write(source.join("a.txt"), b"abc")?;
        let cluster = MemoryCluster::with_pools(["data"]);
        let pipeline = pipeline(&scratch, &cluster);

        let ok = JobRequest {
            kind: JobKind::Copy,
            input: JobInput::SourceRoot(source.clone()),
            output_dir: temp.path().join("out-1"),
        };
        let report = pipeline.run(&ok, &JobCounters::new()?).await?;
        assert!(report.succeeded());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(scratch_entries(&scratch)?, 0);

        let existing = temp.path().join("out-1");
        let clash = JobRequest {
            output_dir: existing,
            ..ok
        };
        let result = pipeline.run(&clash, &JobCounters::new()?).await;
        assert!(matches!(result, Err(PipelineError::OutputExists { .. })));
        assert_eq!(scratch_entries(&scratch)?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn unlistable_root_aborts_before_submission() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let cluster = MemoryCluster::with_pools(["data"]);
        let pipeline = pipeline(temp.path(), &cluster);
        let request = JobRequest {
            kind: JobKind::Copy,
            input: JobInput::SourceRoot(temp.path().join("missing")),
            output_dir: temp.path().join("out"),
        };
        let result = pipeline.run(&request, &JobCounters::new()?).await;
        assert!(matches!(result, Err(PipelineError::Listing { .. })));
        assert!(!temp.path().join("out").exists());
        assert_eq!(scratch_entries(temp.path())?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn caller_manifest_is_kept_and_session_failure_fails_job() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let manifest = temp.path().join("manifest.txt");
        fs::write(&manifest, "/nowhere/a\n")?;
        let cluster = MemoryCluster::with_pools(["elsewhere"]);
        let pipeline = pipeline(temp.path(), &cluster);
        let request = JobRequest {
            kind: JobKind::Copy,
            input: JobInput::Manifest(manifest.clone()),
            output_dir: temp.path().join("out"),
        };
        let report = pipeline.run(&request, &JobCounters::new()?).await?;
        assert!(!report.succeeded());
        assert_eq!(report.exit_code(), 1);
        assert!(manifest.is_file());
        Ok(())
    }
}
