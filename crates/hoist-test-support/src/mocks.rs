//! Fault-injecting object store connector.
//!
//! Wraps a [`MemoryCluster`] and fails selected operations on demand so tests
//! can exercise interrupted transfers and refused sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use hoist_objstore::{
    MemoryCluster, ObjectBackend, ObjectStat, SessionSettings, StoreConnector, StoreError,
    StoreResult,
};

/// Failure injected by a [`FaultyConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Refuse every session.
    RefuseSessions,
    /// Let this many chunk writes through, then fail every later write.
    FailWritesAfter(usize),
    /// Fail every attribute read.
    FailAttributeReads,
}

#[derive(Debug, Default)]
struct FaultState {
    refuse_sessions: AtomicBool,
    fail_attribute_reads: AtomicBool,
    writes_allowed: AtomicUsize,
    limit_writes: AtomicBool,
}

/// Connector over a [`MemoryCluster`] with switchable faults shared by every
/// session it opens.
#[derive(Debug, Clone)]
pub struct FaultyConnector {
    cluster: MemoryCluster,
    state: Arc<FaultState>,
}

impl FaultyConnector {
    /// Connector with no faults armed.
    #[must_use]
    pub fn new(cluster: MemoryCluster) -> Self {
        Self {
            cluster,
            state: Arc::new(FaultState::default()),
        }
    }

    /// Arm `fault` for every current and future session.
    pub fn arm(&self, fault: Fault) {
        match fault {
            Fault::RefuseSessions => self.state.refuse_sessions.store(true, Ordering::SeqCst),
            Fault::FailWritesAfter(count) => {
                self.state.writes_allowed.store(count, Ordering::SeqCst);
                self.state.limit_writes.store(true, Ordering::SeqCst);
            }
            Fault::FailAttributeReads => {
                self.state.fail_attribute_reads.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Disarm every fault.
    pub fn heal(&self) {
        self.state.refuse_sessions.store(false, Ordering::SeqCst);
        self.state.fail_attribute_reads.store(false, Ordering::SeqCst);
        self.state.limit_writes.store(false, Ordering::SeqCst);
    }

    /// Cluster behind the connector.
    #[must_use]
    pub const fn cluster(&self) -> &MemoryCluster {
        &self.cluster
    }
}

impl StoreConnector for FaultyConnector {
    fn connect(&self, settings: &SessionSettings) -> StoreResult<Box<dyn ObjectBackend>> {
        if self.state.refuse_sessions.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                operation: "connect",
                detail: "sessions refused".to_string(),
            });
        }
        let inner = self.cluster.connector().connect(settings)?;
        Ok(Box::new(FaultyBackend {
            inner,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FaultyBackend {
    inner: Box<dyn ObjectBackend>,
    state: Arc<FaultState>,
}

impl FaultyBackend {
    fn take_write_slot(&self) -> bool {
        if !self.state.limit_writes.load(Ordering::SeqCst) {
            return true;
        }
        self.state
            .writes_allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl ObjectBackend for FaultyBackend {
    fn pool(&self) -> &str {
        self.inner.pool()
    }

    fn truncate(&mut self, oid: &str, size: u64) -> StoreResult<()> {
        self.inner.truncate(oid, size)
    }

    fn write_at(&mut self, oid: &str, data: &[u8], offset: u64) -> StoreResult<()> {
        if !self.take_write_slot() {
            return Err(StoreError::Unavailable {
                operation: "write_at",
                detail: format!("injected failure at offset {offset}"),
            });
        }
        self.inner.write_at(oid, data, offset)
    }

    fn set_xattr(&mut self, oid: &str, name: &str, value: &[u8]) -> StoreResult<()> {
        self.inner.set_xattr(oid, name, value)
    }

    fn get_xattr(&mut self, oid: &str, name: &str) -> StoreResult<Vec<u8>> {
        if self.state.fail_attribute_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                operation: "get_xattr",
                detail: "injected failure".to_string(),
            });
        }
        self.inner.get_xattr(oid, name)
    }

    fn stat(&mut self, oid: &str) -> StoreResult<Option<ObjectStat>> {
        self.inner.stat(oid)
    }
}
