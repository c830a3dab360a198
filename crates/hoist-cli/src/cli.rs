//! Argument parsing and job dispatch for the `hoist` binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use hoist_config::{ConfigError, ConfigLoader, HoistConfig};
use hoist_objstore::DirectoryConnector;
use hoist_pipeline::{JobInput, JobKind, JobReport, JobRequest, LocalFs, Pipeline};
use hoist_telemetry::{
    DEFAULT_LOG_LEVEL, GlobalContextGuard, JobCounters, LogFormat, LoggingConfig, init_logging,
};
use tracing::{info, warn};

const EXIT_FAILURE: i32 = 1;

/// Parses CLI arguments, runs the requested job, and prints its report.
/// Returns the process exit code.
pub async fn run() -> i32 {
    execute(Cli::parse()).await
}

async fn execute(cli: Cli) -> i32 {
    let format = cli.log_format.map_or_else(LogFormat::infer, LogFormat::from);
    if let Err(err) = init_logging(&LoggingConfig {
        level: &cli.log_level,
        format,
    }) {
        eprintln!("warning: logging disabled: {err}");
    }
    let _context = GlobalContextGuard::new(cli.command.label());

    match dispatch(cli).await {
        Ok(report) => report.exit_code(),
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            EXIT_FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<JobReport> {
    let config = load_config(&cli.overrides())?;
    let (kind, args) = cli.command.into_parts();
    let request = args.request(kind);

    let counters = JobCounters::new().map_err(CliError::failure)?;
    let pipeline = Pipeline::new(config, Arc::new(LocalFs), Arc::new(DirectoryConnector));
    let report = pipeline
        .run(&request, &counters)
        .await
        .map_err(CliError::failure)?;

    if let Some(path) = &args.metrics_out {
        counters
            .write_to(path)
            .with_context(|| format!("failed to write metrics to {}", path.display()))
            .map_err(CliError::failure)?;
    }

    let line = serde_json::to_string(&report)
        .context("failed to encode job report")
        .map_err(CliError::failure)?;
    println!("{line}");
    if report.succeeded() {
        info!(job_id = %report.job_id, "report written");
    } else {
        warn!(job_id = %report.job_id, status = ?report.status, "job failed");
    }
    Ok(report)
}

fn load_config(defines: &[String]) -> CliResult<HoistConfig> {
    let mut loader = ConfigLoader::from_process_env();
    for pair in defines {
        loader = loader.with_override_pair(pair).map_err(CliError::config)?;
    }
    loader.load().map_err(CliError::config)
}

#[derive(Parser, Debug)]
#[command(
    name = "hoist",
    about = "Copy a file tree into an object store and verify the copy"
)]
struct Cli {
    #[arg(
        short = 'D',
        value_name = "KEY=VALUE",
        help = "Override a configuration key (repeatable)"
    )]
    defines: Vec<String>,
    #[arg(long, global = true, env = "HOIST_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
    #[arg(long, global = true, value_enum)]
    log_format: Option<FormatArg>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy every regular file under the input into the object store.
    Copy(JobArgs),
    /// Compare every file under the input against its stored object.
    Validate(JobArgs),
}

impl Cli {
    /// Overrides in command-line order: those before the subcommand, then
    /// those after it. Later entries win.
    fn overrides(&self) -> Vec<String> {
        let mut overrides = self.defines.clone();
        overrides.extend(self.command.args().defines.iter().cloned());
        overrides
    }
}

impl Command {
    const fn args(&self) -> &JobArgs {
        match self {
            Self::Copy(args) | Self::Validate(args) => args,
        }
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Copy(_) => "copy",
            Self::Validate(_) => "validate",
        }
    }

    fn into_parts(self) -> (JobKind, JobArgs) {
        match self {
            Self::Copy(args) => (JobKind::Copy, args),
            Self::Validate(args) => (JobKind::Validate, args),
        }
    }
}

#[derive(Args, Debug)]
struct JobArgs {
    #[arg(
        short = 'D',
        value_name = "KEY=VALUE",
        help = "Override a configuration key (repeatable)"
    )]
    defines: Vec<String>,
    #[arg(long, help = "Treat the input as an existing manifest instead of a source root")]
    manifest: bool,
    #[arg(long, value_name = "FILE", help = "Write job counters in Prometheus text format")]
    metrics_out: Option<PathBuf>,
    /// Source root, or manifest file with `--manifest`.
    input: PathBuf,
    /// Job output directory; must not exist yet.
    output_dir: PathBuf,
}

impl JobArgs {
    fn request(&self, kind: JobKind) -> JobRequest {
        let input = if self.manifest {
            JobInput::Manifest(self.input.clone())
        } else {
            JobInput::SourceRoot(self.input.clone())
        };
        JobRequest {
            kind,
            input,
            output_dir: self.output_dir.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Json,
    Pretty,
}

impl From<FormatArg> for LogFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Json => Self::Json,
            FormatArg::Pretty => Self::Pretty,
        }
    }
}

#[derive(Debug)]
enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

type CliResult<T> = Result<T, CliError>;

impl CliError {
    fn config(error: ConfigError) -> Self {
        Self::Validation(format!("invalid configuration: {error}"))
    }

    fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}
