//! Object service backed by a local directory tree.
//!
//! # Design
//! - The service configuration file is YAML: `root`, an optional `identities`
//!   allowlist and `create_pools`.
//! - Each pool is a directory under `root`. An object is stored in a file named
//!   by the MD5 of its identifier, so deep source paths never hit file name
//!   limits. A JSON sidecar next to it records the identifier and the extended
//!   attributes (hex-encoded values).

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{ObjectBackend, ObjectStat, SessionSettings, StoreConnector};
use crate::digest::digest_bytes;
use crate::error::{StoreError, StoreResult};

const SIDECAR_EXTENSION: &str = "xattr";

/// Parsed service configuration for the directory backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryServiceConfig {
    /// Directory that holds one sub-directory per pool.
    pub root: PathBuf,
    /// Identities allowed to connect; any identity when absent.
    #[serde(default)]
    pub identities: Option<Vec<String>>,
    /// Create missing pool directories on connect.
    #[serde(default)]
    pub create_pools: bool,
}

impl DirectoryServiceConfig {
    /// Read and parse the YAML configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConfigRead`] or [`StoreError::ConfigParse`].
    pub fn load(path: &Path) -> StoreResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| StoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| StoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn admits(&self, identity: &str) -> bool {
        self.identities
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|candidate| candidate == identity))
    }
}

/// Connector for the directory backend. Reads the configuration file on every
/// connect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryConnector;

impl StoreConnector for DirectoryConnector {
    fn connect(&self, settings: &SessionSettings) -> StoreResult<Box<dyn ObjectBackend>> {
        let config = DirectoryServiceConfig::load(&settings.config_file)?;
        if !config.admits(&settings.identity) {
            return Err(StoreError::IdentityRejected {
                identity: settings.identity.clone(),
            });
        }

        let dir = config.root.join(&settings.pool);
        if !dir.is_dir() {
            if !config.create_pools {
                return Err(StoreError::PoolNotFound {
                    pool: settings.pool.clone(),
                });
            }
            fs::create_dir_all(&dir).map_err(|source| StoreError::io("create_pool", &dir, source))?;
            debug!(pool = %settings.pool, path = %dir.display(), "pool directory created");
        }

        Ok(Box::new(DirectoryBackend {
            pool: settings.pool.clone(),
            dir,
        }))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    oid: String,
    #[serde(default)]
    xattrs: BTreeMap<String, String>,
}

struct DirectoryBackend {
    pool: String,
    dir: PathBuf,
}

impl DirectoryBackend {
    fn data_path(&self, oid: &str) -> PathBuf {
        self.dir.join(digest_bytes(oid.as_bytes()))
    }

    fn sidecar_path(&self, oid: &str) -> PathBuf {
        self.data_path(oid).with_extension(SIDECAR_EXTENSION)
    }

    fn read_sidecar(&self, oid: &str) -> StoreResult<Option<Sidecar>> {
        let path = self.sidecar_path(oid);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io("read_sidecar", path, err)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| StoreError::Metadata { path, source })
    }

    fn write_sidecar(&self, oid: &str, sidecar: &Sidecar) -> StoreResult<()> {
        let path = self.sidecar_path(oid);
        let encoded = serde_json::to_vec(sidecar).map_err(|source| StoreError::Metadata {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, encoded).map_err(|source| StoreError::io("write_sidecar", path, source))
    }

    /// Sidecar of an object that must already exist under `oid`.
    fn existing_sidecar(&self, oid: &str) -> StoreResult<Sidecar> {
        match self.read_sidecar(oid)? {
            Some(sidecar) if sidecar.oid == oid && self.data_path(oid).is_file() => Ok(sidecar),
            _ => Err(StoreError::ObjectNotFound {
                oid: oid.to_string(),
            }),
        }
    }

    /// Open the data file for writing, registering the object on first use.
    fn open_object(&self, oid: &str) -> StoreResult<File> {
        match self.read_sidecar(oid)? {
            Some(sidecar) if sidecar.oid != oid => {
                return Err(StoreError::Unavailable {
                    operation: "open_object",
                    detail: format!("object name already bound to {}", sidecar.oid),
                });
            }
            Some(_) => {}
            None => self.write_sidecar(
                oid,
                &Sidecar {
                    oid: oid.to_string(),
                    xattrs: BTreeMap::new(),
                },
            )?,
        }
        let path = self.data_path(oid);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| StoreError::io("open_object", path, source))
    }
}

impl ObjectBackend for DirectoryBackend {
    fn pool(&self) -> &str {
        &self.pool
    }

    fn truncate(&mut self, oid: &str, size: u64) -> StoreResult<()> {
        let file = self.open_object(oid)?;
        file.set_len(size)
            .map_err(|source| StoreError::io("truncate", self.data_path(oid), source))
    }

    fn write_at(&mut self, oid: &str, data: &[u8], offset: u64) -> StoreResult<()> {
        let mut file = self.open_object(oid)?;
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(data))
            .map_err(|source| StoreError::io("write_at", self.data_path(oid), source))
    }

    fn set_xattr(&mut self, oid: &str, name: &str, value: &[u8]) -> StoreResult<()> {
        let mut sidecar = self.existing_sidecar(oid)?;
        sidecar.xattrs.insert(name.to_string(), hex::encode(value));
        self.write_sidecar(oid, &sidecar)
    }

    fn get_xattr(&mut self, oid: &str, name: &str) -> StoreResult<Vec<u8>> {
        let sidecar = self.existing_sidecar(oid)?;
        let encoded = sidecar
            .xattrs
            .get(name)
            .ok_or_else(|| StoreError::AttributeNotFound {
                oid: oid.to_string(),
                name: name.to_string(),
            })?;
        hex::decode(encoded).map_err(|_| StoreError::AttributeEncoding {
            oid: oid.to_string(),
            name: name.to_string(),
        })
    }

    fn stat(&mut self, oid: &str) -> StoreResult<Option<ObjectStat>> {
        let path = self.data_path(oid);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io("stat", path, err)),
        };
        let stored_oid = self
            .read_sidecar(oid)?
            .map_or_else(|| oid.to_string(), |sidecar| sidecar.oid);
        Ok(Some(ObjectStat {
            oid: stored_oid,
            size: metadata.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn write_config(dir: &Path, body: &str) -> Result<PathBuf> {
        let path = dir.join("hoist.conf");
        fs::write(&path, body)?;
        Ok(path)
    }

    #[test]
    fn objects_persist_under_hashed_names() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().join("store");
        fs::create_dir_all(root.join("data"))?;
        let config = write_config(temp.path(), &format!("root: {}\n", root.display()))?;

        let mut backend =
            DirectoryConnector.connect(&SessionSettings::new(&config, "admin", "data"))?;
        backend.write_at("/data/a.txt", b"hello", 0)?;
        backend.set_xattr("/data/a.txt", "MD5", b"abc")?;

        let name = digest_bytes(b"/data/a.txt");
        assert_eq!(fs::read(root.join("data").join(&name))?, b"hello");
        assert!(root.join("data").join(format!("{name}.xattr")).is_file());
        assert_eq!(backend.get_xattr("/data/a.txt", "MD5")?, b"abc");
        assert_eq!(
            backend.stat("/data/a.txt")?,
            Some(ObjectStat {
                oid: "/data/a.txt".to_string(),
                size: 5
            })
        );
        assert_eq!(backend.stat("/data/none")?, None);
        Ok(())
    }

    #[test]
    fn truncate_shrinks_existing_object() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = write_config(
            temp.path(),
            &format!("root: {}\ncreate_pools: true\n", temp.path().display()),
        )?;
        let mut backend =
            DirectoryConnector.connect(&SessionSettings::new(&config, "admin", "data"))?;
        backend.write_at("o", b"0123456789", 0)?;
        backend.truncate("o", 4)?;
        backend.write_at("o", b"xy", 4)?;
        assert_eq!(
            fs::read(temp.path().join("data").join(digest_bytes(b"o")))?,
            b"0123xy"
        );
        Ok(())
    }

    #[test]
    fn connect_enforces_config_identity_and_pool() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let missing = SessionSettings::new(temp.path().join("absent.conf"), "admin", "data");
        assert!(matches!(
            DirectoryConnector.connect(&missing),
            Err(StoreError::ConfigRead { .. })
        ));

        let garbage = write_config(temp.path(), "root: [unterminated\n")?;
        assert!(matches!(
            DirectoryConnector.connect(&SessionSettings::new(&garbage, "admin", "data")),
            Err(StoreError::ConfigParse { .. })
        ));

        let config = write_config(
            temp.path(),
            &format!("root: {}\nidentities: [admin]\n", temp.path().display()),
        )?;
        assert!(matches!(
            DirectoryConnector.connect(&SessionSettings::new(&config, "guest", "data")),
            Err(StoreError::IdentityRejected { .. })
        ));
        assert!(matches!(
            DirectoryConnector.connect(&SessionSettings::new(&config, "admin", "data")),
            Err(StoreError::PoolNotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn attributes_require_existing_object() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = write_config(
            temp.path(),
            &format!("root: {}\ncreate_pools: true\n", temp.path().display()),
        )?;
        let mut backend =
            DirectoryConnector.connect(&SessionSettings::new(&config, "admin", "data"))?;
        assert!(matches!(
            backend.set_xattr("ghost", "MD5", b"x"),
            Err(StoreError::ObjectNotFound { .. })
        ));
        backend.truncate("real", 0)?;
        assert!(matches!(
            backend.get_xattr("real", "MD5"),
            Err(StoreError::AttributeNotFound { .. })
        ));
        Ok(())
    }
}
