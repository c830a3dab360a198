//! Copy-and-verify pipeline: manifest construction, copy and validate workers,
//! the mismatch collector, a local job runner, and the orchestrator that ties
//! them together.
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
#![allow(clippy::module_name_repetitions)]

pub mod collector;
pub mod copy;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod record;
pub mod runner;
pub mod source;
pub mod validate;

pub use collector::{MismatchCollector, REPORT_FILE_NAME, Reducer, run_reduce, write_report};
pub use copy::{CopyMapper, CopyMapperFactory};
pub use error::{PipelineError, PipelineResult, RecordError, display_chain};
pub use manifest::{ManifestSplit, ManifestSummary, SplitReader, build_manifest, plan_splits};
pub use orchestrator::{
    COPY_SPLIT_MAX_SIZE, JobInput, JobKind, JobReport, JobRequest, Pipeline, Stage,
    VALIDATE_SPLIT_MAX_SIZE,
};
pub use record::{MismatchRecord, RecordOutcome, SourceRecord};
pub use runner::{JobOutcome, JobSpec, JobStatus, LocalRunner, Mapper, MapperFactory, SUCCESS_MARKER};
pub use source::{EntryKind, LocalFs, SourceEntry, SourceFs, SourceMetadata};
pub use validate::{ValidateMapper, ValidateMapperFactory};
