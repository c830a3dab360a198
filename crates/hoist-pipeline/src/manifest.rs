//! Manifest construction and split reading.
//!
//! # Design
//! - The builder walks breadth-first with an explicit queue and streams every
//!   regular file path to the manifest as soon as its parent is listed.
//! - A listing error, or a regular file whose path cannot be one UTF-8 line,
//!   aborts the build; a half-written manifest is left for the caller to remove.
//! - Splits are byte ranges over the manifest. A line belongs to the split that
//!   holds its first byte, so every line is read by exactly one split.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::record::SourceRecord;
use crate::source::{EntryKind, SourceFs};

/// Counts gathered while building a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSummary {
    /// Manifest file written.
    pub path: PathBuf,
    /// Regular files written to the manifest.
    pub files: u64,
    /// Directories listed.
    pub directories: u64,
    /// Symlinks and special files left out.
    pub skipped: u64,
}

/// Walk `root` breadth-first and write one regular-file path per line to
/// `manifest`, replacing any file already there.
///
/// # Errors
///
/// Returns [`PipelineError::Listing`] when any directory cannot be listed,
/// [`PipelineError::UnrepresentablePath`] when a regular file's path is not
/// UTF-8 or contains a line break, or [`PipelineError::Io`] when the manifest
/// cannot be written.
pub fn build_manifest(
    fs: &dyn SourceFs,
    root: &Path,
    manifest: &Path,
) -> PipelineResult<ManifestSummary> {
    match fs::remove_file(manifest) {
        Ok(()) => debug!(manifest = %manifest.display(), "removed stale manifest"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(PipelineError::io("remove_manifest", manifest, err)),
    }
    let file = File::create(manifest)
        .map_err(|source| PipelineError::io("create_manifest", manifest, source))?;
    let mut writer = ManifestWriter {
        out: BufWriter::new(file),
        path: manifest,
        summary: ManifestSummary {
            path: manifest.to_path_buf(),
            ..ManifestSummary::default()
        },
    };

    let root_meta = fs.metadata(root).map_err(|source| PipelineError::Listing {
        path: root.to_path_buf(),
        source,
    })?;
    match root_meta.kind {
        EntryKind::File => writer.push(root)?,
        EntryKind::Directory => walk(fs, root, &mut writer)?,
        EntryKind::Other => {
            return Err(PipelineError::invalid(
                "source_root",
                "must be a directory or regular file",
                Some(root.display().to_string()),
            ));
        }
    }

    let ManifestWriter { out, summary, .. } = writer;
    out.into_inner()
        .map_err(|err| PipelineError::io("flush_manifest", manifest, err.into_error()))?
        .sync_all()
        .map_err(|source| PipelineError::io("sync_manifest", manifest, source))?;
    info!(
        manifest = %manifest.display(),
        files = summary.files,
        directories = summary.directories,
        skipped = summary.skipped,
        "manifest built"
    );
    Ok(summary)
}

fn walk(fs: &dyn SourceFs, root: &Path, writer: &mut ManifestWriter<'_>) -> PipelineResult<()> {
    let mut queue = VecDeque::from([root.to_path_buf()]);
    while let Some(dir) = queue.pop_front() {
        let children = fs.list_dir(&dir).map_err(|source| PipelineError::Listing {
            path: dir.clone(),
            source,
        })?;
        writer.summary.directories += 1;
        for child in children {
            match child.kind {
                EntryKind::Directory => queue.push_back(child.path),
                EntryKind::File => writer.push(&child.path)?,
                EntryKind::Other => {
                    debug!(path = %child.path.display(), "skipping non-regular entry");
                    writer.summary.skipped += 1;
                }
            }
        }
    }
    Ok(())
}

struct ManifestWriter<'a> {
    out: BufWriter<File>,
    path: &'a Path,
    summary: ManifestSummary,
}

impl ManifestWriter<'_> {
    fn push(&mut self, file: &Path) -> PipelineResult<()> {
        let Some(line) = file.to_str().filter(|line| !line.contains(['\n', '\r'])) else {
            warn!(path = %file.display(), "path cannot be written to the manifest");
            return Err(PipelineError::UnrepresentablePath {
                path: file.to_path_buf(),
            });
        };
        writeln!(self.out, "{line}")
            .map_err(|source| PipelineError::io("write_manifest", self.path, source))?;
        self.summary.files += 1;
        Ok(())
    }
}

/// Byte range of the manifest handled by one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSplit {
    /// Task index.
    pub index: usize,
    /// Manifest file.
    pub manifest: PathBuf,
    /// First byte of the range.
    pub start: u64,
    /// One past the last byte of the range.
    pub end: u64,
}

/// Cut `manifest` into ranges of `max(min_size, max_size)` bytes (at least 1).
/// An empty manifest yields no splits.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] when the manifest cannot be inspected.
pub fn plan_splits(manifest: &Path, min_size: u64, max_size: u64) -> PipelineResult<Vec<ManifestSplit>> {
    let len = fs::metadata(manifest)
        .map_err(|source| PipelineError::io("stat_manifest", manifest, source))?
        .len();
    let size = max_size.max(min_size).max(1);
    let mut splits = Vec::new();
    let mut start = 0;
    while start < len {
        let end = start.saturating_add(size).min(len);
        splits.push(ManifestSplit {
            index: splits.len(),
            manifest: manifest.to_path_buf(),
            start,
            end,
        });
        start = end;
    }
    Ok(splits)
}

/// Iterator over the records of one split.
pub struct SplitReader {
    reader: BufReader<File>,
    position: u64,
    end: u64,
    line: Vec<u8>,
}

impl SplitReader {
    /// Open `split`, positioned at its first whole line.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] when the manifest cannot be opened or
    /// positioned.
    pub fn open(split: &ManifestSplit) -> PipelineResult<Self> {
        let io_err = |source| PipelineError::io("read_split", &split.manifest, source);
        let file = File::open(&split.manifest).map_err(io_err)?;
        let mut reader = BufReader::new(file);
        let mut position = 0;
        if split.start > 0 {
            position = split.start - 1;
            reader.seek(SeekFrom::Start(position)).map_err(io_err)?;
            let mut partial = Vec::new();
            position += reader.read_until(b'\n', &mut partial).map_err(io_err)? as u64;
        }
        Ok(Self {
            reader,
            position,
            end: split.end,
            line: Vec::new(),
        })
    }
}

impl Iterator for SplitReader {
    type Item = io::Result<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.position >= self.end {
                return None;
            }
            self.line.clear();
            let key = self.position;
            let read = match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(read) => read,
                Err(err) => return Some(Err(err)),
            };
            self.position += read as u64;

            let mut text = self.line.as_slice();
            while let Some((last, rest)) = text.split_last() {
                if *last == b'\n' || *last == b'\r' {
                    text = rest;
                } else {
                    break;
                }
            }
            if text.is_empty() {
                continue;
            }
            return Some(match std::str::from_utf8(text) {
                Ok(path) => Ok(SourceRecord::new(key, path)),
                Err(err) => Err(io::Error::new(io::ErrorKind::InvalidData, err)),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LocalFs;
    use anyhow::Result;

    fn read_all(splits: &[ManifestSplit]) -> Result<Vec<SourceRecord>> {
        let mut records = Vec::new();
        for split in splits {
            for record in SplitReader::open(split)? {
                records.push(record?);
            }
        }
        Ok(records)
    }

    #[test]
    fn builder_walks_breadth_first() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().join("data");
        fs::create_dir_all(root.join("sub/deeper"))?;
        fs::write(root.join("sub/deeper/c.txt"), b"c")?;
        fs::write(root.join("sub/b.txt"), b"")?;
        fs::write(root.join("a.txt"), b"0123456789")?;
        let manifest = temp.path().join("manifest");

        let summary = build_manifest(&LocalFs, &root, &manifest)?;
        assert_eq!(summary.files, 3);
        assert_eq!(summary.directories, 3);

        let lines: Vec<String> = fs::read_to_string(&manifest)?
            .lines()
            .map(str::to_string)
            .collect();
        let expected: Vec<String> = ["a.txt", "sub/b.txt", "sub/deeper/c.txt"]
            .iter()
            .map(|rel| root.join(rel).display().to_string())
            .collect();
        assert_eq!(lines, expected);
        Ok(())
    }

    #[test]
    fn builder_replaces_stale_manifest_and_accepts_file_root() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("single.bin");
        fs::write(&file, b"payload")?;
        let manifest = temp.path().join("manifest");
        fs::write(&manifest, "stale line 1\nstale line 2\nstale line 3\n")?;

        let summary = build_manifest(&LocalFs, &file, &manifest)?;
        assert_eq!(summary.files, 1);
        assert_eq!(fs::read_to_string(&manifest)?, format!("{}\n", file.display()));
        Ok(())
    }

    #[test]
    fn builder_fails_on_missing_root() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let err = build_manifest(&LocalFs, &temp.path().join("nope"), &temp.path().join("m"));
        assert!(matches!(err, Err(PipelineError::Listing { .. })));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn unrepresentable_file_names_abort_the_build() -> Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        for name in [OsStr::from_bytes(b"bad\xff.bin"), OsStr::new("two\nlines.bin")] {
            let temp = tempfile::tempdir()?;
            let root = temp.path().join("data");
            fs::create_dir_all(root.join("sub"))?;
            fs::write(root.join("a.txt"), b"0123456789")?;
            fs::write(root.join("sub").join(name), b"123456789")?;

            let err = build_manifest(&LocalFs, &root, &temp.path().join("manifest"));
            match err {
                Err(PipelineError::UnrepresentablePath { path }) => {
                    assert_eq!(path, root.join("sub").join(name));
                }
                other => anyhow::bail!("expected an unrepresentable path error, got {other:?}"),
            }
        }
        Ok(())
    }

    #[test]
    fn every_line_is_read_exactly_once_for_any_split_size() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let manifest = temp.path().join("manifest");
        let paths: Vec<String> = (0..40).map(|i| format!("/data/dir-{}/file-{i}.bin", i % 7)).collect();
        fs::write(&manifest, paths.join("\n") + "\n")?;

        for size in [1, 2, 13, 37, 64, 100, 4096] {
            let splits = plan_splits(&manifest, 0, size)?;
            let records = read_all(&splits)?;
            let read: Vec<&str> = records.iter().map(|record| record.path.as_str()).collect();
            assert_eq!(read, paths, "split size {size}");
        }
        Ok(())
    }

    #[test]
    fn keys_are_line_offsets_and_blank_lines_are_ignored() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let manifest = temp.path().join("manifest");
        fs::write(&manifest, "/a\n\n/bb\r\n/ccc")?;
        let records = read_all(&plan_splits(&manifest, 0, 3)?)?;
        assert_eq!(
            records,
            vec![
                SourceRecord::new(0, "/a"),
                SourceRecord::new(4, "/bb"),
                SourceRecord::new(9, "/ccc"),
            ]
        );
        Ok(())
    }

    #[test]
    fn split_plan_respects_bounds() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let manifest = temp.path().join("manifest");
        fs::write(&manifest, vec![b'x'; 10_000])?;
        assert_eq!(plan_splits(&manifest, 0, 3000)?.len(), 4);
        assert_eq!(plan_splits(&manifest, 6000, 3000)?.len(), 2);
        assert_eq!(plan_splits(&manifest, 0, 0)?.len(), 10_000);

        fs::write(&manifest, b"")?;
        assert!(plan_splits(&manifest, 0, 3000)?.is_empty());
        Ok(())
    }
}
