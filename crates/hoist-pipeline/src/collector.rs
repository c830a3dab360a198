//! Pass-through reducer for validation mismatches.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::record::MismatchRecord;

/// Name of the reduce output file inside the job output directory.
pub const REPORT_FILE_NAME: &str = "part-r-00000";

/// Reduce step applied to every key group, keys ascending.
pub trait Reducer {
    /// Handle all values of one key, appending results to `out`.
    fn reduce(&mut self, key: u64, values: Vec<String>, out: &mut Vec<MismatchRecord>);
}

/// Re-emits every value of every key unchanged. No deduplication.
#[derive(Debug, Clone, Copy, Default)]
pub struct MismatchCollector;

impl Reducer for MismatchCollector {
    fn reduce(&mut self, key: u64, values: Vec<String>, out: &mut Vec<MismatchRecord>) {
        out.extend(values.into_iter().map(|path| MismatchRecord { key, path }));
    }
}

/// Sort `records` by key, group them and feed every group to `reducer`.
pub fn run_reduce<R: Reducer + ?Sized>(
    reducer: &mut R,
    mut records: Vec<MismatchRecord>,
) -> Vec<MismatchRecord> {
    records.sort_by_key(|record| record.key);
    let mut output = Vec::with_capacity(records.len());
    let mut records = records.into_iter().peekable();
    while let Some(first) = records.next() {
        let key = first.key;
        let mut group = vec![first.path];
        while let Some(next) = records.next_if(|record| record.key == key) {
            group.push(next.path);
        }
        reducer.reduce(key, group, &mut output);
    }
    output
}

/// Write `records` as `key<TAB>path` lines to `<output_dir>/part-r-00000`.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] when the report cannot be written.
pub fn write_report(output_dir: &Path, records: &[MismatchRecord]) -> PipelineResult<()> {
    let path = output_dir.join(REPORT_FILE_NAME);
    let file = File::create(&path).map_err(|source| PipelineError::io("create_report", &path, source))?;
    let mut out = BufWriter::new(file);
    for record in records {
        writeln!(out, "{record}").map_err(|source| PipelineError::io("write_report", &path, source))?;
    }
    out.flush()
        .map_err(|source| PipelineError::io("flush_report", &path, source))
}
