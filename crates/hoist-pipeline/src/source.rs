//! Read-only view of the source file system.
//!
//! # Design
//! - [`SourceFs`] is the only way the pipeline touches source data, so tests
//!   can substitute a failing or synthetic tree.
//! - Symbolic links are reported as [`EntryKind::Other`] and never followed.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Kind of a source entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Anything else (symbolic links, devices, sockets).
    Other,
}

impl From<fs::FileType> for EntryKind {
    fn from(file_type: fs::FileType) -> Self {
        if file_type.is_file() {
            Self::File
        } else if file_type.is_dir() {
            Self::Directory
        } else {
            Self::Other
        }
    }
}

/// One child returned by [`SourceFs::list_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Full path of the child.
    pub path: PathBuf,
    /// Kind of the child.
    pub kind: EntryKind,
}

/// Kind and length of a source path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Kind of the entry.
    pub kind: EntryKind,
    /// Length in bytes.
    pub len: u64,
}

/// Directory listing, stat and streaming reads over the source tree.
pub trait SourceFs: Send + Sync {
    /// Kind and length of `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error, including `NotFound`.
    fn metadata(&self, path: &Path) -> io::Result<SourceMetadata>;

    /// Children of `path`, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when `path` cannot be listed.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<SourceEntry>>;

    /// Open `path` for a sequential read.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when `path` cannot be opened.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;
}

/// [`SourceFs`] over the local (or locally mounted) file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl SourceFs for LocalFs {
    fn metadata(&self, path: &Path) -> io::Result<SourceMetadata> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(SourceMetadata {
            kind: metadata.file_type().into(),
            len: metadata.len(),
        })
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<SourceEntry>> {
        let mut entries = fs::read_dir(path)?
            .map(|entry| {
                let entry = entry?;
                Ok(SourceEntry {
                    kind: entry.file_type()?.into(),
                    path: entry.path(),
                })
            })
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort_by(|left, right| left.path.cmp(&right.path));
        Ok(entries)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn local_fs_lists_sorted_children_with_kinds() -> Result<(), Box<dyn Error>> {
        let temp = tempfile::tempdir()?;
        fs::create_dir(temp.path().join("b-dir"))?;
        fs::write(temp.path().join("a.txt"), b"abc")?;
        fs::write(temp.path().join("c.txt"), b"")?;

        let entries = LocalFs.list_dir(temp.path())?;
        let names: Vec<_> = entries
            .iter()
            .filter_map(|entry| entry.path.file_name())
            .filter_map(|name| name.to_str())
            .collect();
        assert_eq!(names, ["a.txt", "b-dir", "c.txt"]);
        assert_eq!(entries[1].kind, EntryKind::Directory);

        let meta = LocalFs.metadata(&temp.path().join("a.txt"))?;
        assert_eq!(meta, SourceMetadata { kind: EntryKind::File, len: 3 });

        let mut contents = String::new();
        LocalFs
            .open(&temp.path().join("a.txt"))?
            .read_to_string(&mut contents)?;
        assert_eq!(contents, "abc");
        Ok(())
    }

    #[test]
    fn missing_paths_surface_not_found() {
        let err = LocalFs.metadata(Path::new("/definitely/not/here"));
        assert!(matches!(err, Err(ref e) if e.kind() == io::ErrorKind::NotFound));
        assert!(LocalFs.list_dir(Path::new("/definitely/not/here")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() -> Result<(), Box<dyn Error>> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join("target"), b"x")?;
        std::os::unix::fs::symlink(temp.path().join("target"), temp.path().join("link"))?;
        let meta = LocalFs.metadata(&temp.path().join("link"))?;
        assert_eq!(meta.kind, EntryKind::Other);
        Ok(())
    }
}
