//! In-process object service shared by every session opened from it.
//!
//! Used by tests and dry runs. The cluster is cheap to clone; all clones see
//! the same pools.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{ObjectBackend, ObjectStat, SessionSettings, StoreConnector};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct MemoryObject {
    data: Vec<u8>,
    xattrs: BTreeMap<String, Vec<u8>>,
}

type Pool = BTreeMap<String, MemoryObject>;

/// Shared in-memory cluster.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    pools: Arc<Mutex<BTreeMap<String, Pool>>>,
}

impl MemoryCluster {
    /// Empty cluster with no pools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cluster with the named pools already created.
    #[must_use]
    pub fn with_pools<I, S>(pools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cluster = Self::new();
        for pool in pools {
            cluster.create_pool(pool);
        }
        cluster
    }

    /// Create `pool` if it does not exist yet.
    pub fn create_pool(&self, pool: impl Into<String>) {
        self.lock().entry(pool.into()).or_default();
    }

    /// Connector opening sessions against this cluster.
    #[must_use]
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            cluster: self.clone(),
        }
    }

    /// Bytes of `oid` in `pool`.
    #[must_use]
    pub fn object(&self, pool: &str, oid: &str) -> Option<Vec<u8>> {
        self.lock()
            .get(pool)
            .and_then(|objects| objects.get(oid))
            .map(|object| object.data.clone())
    }

    /// Raw value of attribute `name` on `oid` in `pool`.
    #[must_use]
    pub fn attribute(&self, pool: &str, oid: &str, name: &str) -> Option<Vec<u8>> {
        self.lock()
            .get(pool)
            .and_then(|objects| objects.get(oid))
            .and_then(|object| object.xattrs.get(name).cloned())
    }

    /// Sorted identifiers of every object in `pool`.
    #[must_use]
    pub fn object_ids(&self, pool: &str) -> Vec<String> {
        self.lock()
            .get(pool)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Cut `oid` down to `len` bytes without touching its attributes.
    ///
    /// Returns `false` when the object does not exist.
    pub fn truncate_object(&self, pool: &str, oid: &str, len: usize) -> bool {
        let mut pools = self.lock();
        let Some(object) = pools.get_mut(pool).and_then(|objects| objects.get_mut(oid)) else {
            return false;
        };
        object.data.truncate(len);
        true
    }

    /// Remove `oid` from `pool`; returns whether it existed.
    pub fn remove_object(&self, pool: &str, oid: &str) -> bool {
        self.lock()
            .get_mut(pool)
            .is_some_and(|objects| objects.remove(oid).is_some())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Pool>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Connector for a [`MemoryCluster`]. The configuration file is not read.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    cluster: MemoryCluster,
}

impl StoreConnector for MemoryConnector {
    fn connect(&self, settings: &SessionSettings) -> StoreResult<Box<dyn ObjectBackend>> {
        if !self.cluster.lock().contains_key(&settings.pool) {
            return Err(StoreError::PoolNotFound {
                pool: settings.pool.clone(),
            });
        }
        Ok(Box::new(MemoryBackend {
            cluster: self.cluster.clone(),
            pool: settings.pool.clone(),
        }))
    }
}

struct MemoryBackend {
    cluster: MemoryCluster,
    pool: String,
}

impl MemoryBackend {
    fn with_pool<T>(&self, op: impl FnOnce(&mut Pool) -> StoreResult<T>) -> StoreResult<T> {
        let mut pools = self.cluster.lock();
        let objects = pools
            .get_mut(&self.pool)
            .ok_or_else(|| StoreError::PoolNotFound {
                pool: self.pool.clone(),
            })?;
        op(objects)
    }
}

fn resize(data: &mut Vec<u8>, len: u64) -> StoreResult<()> {
    let len = usize::try_from(len).map_err(|_| StoreError::Unavailable {
        operation: "truncate",
        detail: format!("length {len} exceeds addressable memory"),
    })?;
    data.resize(len, 0);
    Ok(())
}

fn missing(oid: &str) -> StoreError {
    StoreError::ObjectNotFound {
        oid: oid.to_string(),
    }
}

impl ObjectBackend for MemoryBackend {
    fn pool(&self) -> &str {
        &self.pool
    }

    fn truncate(&mut self, oid: &str, size: u64) -> StoreResult<()> {
        self.with_pool(|objects| resize(&mut objects.entry(oid.to_string()).or_default().data, size))
    }

    fn write_at(&mut self, oid: &str, data: &[u8], offset: u64) -> StoreResult<()> {
        self.with_pool(|objects| {
            let object = objects.entry(oid.to_string()).or_default();
            let end = offset + data.len() as u64;
            if (object.data.len() as u64) < end {
                resize(&mut object.data, end)?;
            }
            let start = usize::try_from(offset).map_err(|_| StoreError::Unavailable {
                operation: "write_at",
                detail: format!("offset {offset} exceeds addressable memory"),
            })?;
            object.data[start..start + data.len()].copy_from_slice(data);
            Ok(())
        })
    }

    fn set_xattr(&mut self, oid: &str, name: &str, value: &[u8]) -> StoreResult<()> {
        self.with_pool(|objects| {
            let object = objects.get_mut(oid).ok_or_else(|| missing(oid))?;
            object.xattrs.insert(name.to_string(), value.to_vec());
            Ok(())
        })
    }

    fn get_xattr(&mut self, oid: &str, name: &str) -> StoreResult<Vec<u8>> {
        self.with_pool(|objects| {
            let object = objects.get(oid).ok_or_else(|| missing(oid))?;
            object
                .xattrs
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::AttributeNotFound {
                    oid: oid.to_string(),
                    name: name.to_string(),
                })
        })
    }

    fn stat(&mut self, oid: &str) -> StoreResult<Option<ObjectStat>> {
        self.with_pool(|objects| {
            Ok(objects.get(oid).map(|object| ObjectStat {
                oid: oid.to_string(),
                size: object.data.len() as u64,
            }))
        })
    }
}
