//! Temporary source trees.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A source tree rooted in a temporary directory, removed on drop.
///
/// Besides the tree itself the fixture owns a `scratch` directory for
/// manifests and an empty slot for job output, both outside the tree.
pub struct SourceTree {
    temp: TempDir,
    root: PathBuf,
}

impl SourceTree {
    /// Create an empty tree at `<tmp>/data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directories cannot be created.
    pub fn new() -> io::Result<Self> {
        let temp = tempfile::Builder::new().prefix("hoist-").tempdir()?;
        let root = temp.path().join("data");
        fs::create_dir_all(&root)?;
        fs::create_dir_all(temp.path().join("scratch"))?;
        Ok(Self { temp, root })
    }

    /// The two-file tree used by the end-to-end scenarios:
    /// `data/a.txt` holding ten bytes and an empty `data/sub/b.txt`.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be written.
    pub fn scenario() -> io::Result<Self> {
        let tree = Self::new()?;
        tree.file("a.txt", b"0123456789")?;
        tree.file("sub/b.txt", b"")?;
        Ok(tree)
    }

    /// Write `contents` to `relative`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn file(&self, relative: &str, contents: &[u8]) -> io::Result<PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Create an (empty) directory at `relative`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn dir(&self, relative: &str) -> io::Result<PathBuf> {
        let path = self.root.join(relative);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Root of the source tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `relative` inside the tree.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Object identifier the pipeline uses for `relative`.
    #[must_use]
    pub fn oid(&self, relative: &str) -> String {
        self.path(relative).display().to_string()
    }

    /// Directory for manifests, outside the tree.
    #[must_use]
    pub fn scratch(&self) -> PathBuf {
        self.temp.path().join("scratch")
    }

    /// Not-yet-existing output directory named `name`, outside the tree.
    #[must_use]
    pub fn output(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }
}

/// Non-empty lines of the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn manifest_lines(path: &Path) -> io::Result<Vec<String>> {
    Ok(fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
