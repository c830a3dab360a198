//! Session-owning object store client.
//!
//! # Design
//! - One client per task; transfer methods take `&mut self` so a session is
//!   never shared between workers.
//! - Every chunk is preceded by a truncate to its own start offset, so a write
//!   over a longer leftover object converges on exactly the source bytes.
//! - Validation helpers answer `bool`; remote errors are logged and reported
//!   as a non-match.

use std::io::Read;

use tracing::{debug, info, warn};

use crate::backend::{ObjectBackend, ObjectStat, SessionSettings, StoreConnector};
use crate::digest::{ContentDigest, DIGEST_ATTRIBUTE, read_chunk};
use crate::error::{StoreError, StoreResult};

/// Result of streaming one source into one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Bytes written.
    pub bytes: u64,
    /// Non-empty chunks written.
    pub chunks: u64,
    /// Lowercase hex MD5 stored in the digest attribute.
    pub digest: String,
}

/// Stateful session to an object service, bound to one pool.
pub struct ObjectStoreClient {
    backend: Box<dyn ObjectBackend>,
}

impl ObjectStoreClient {
    /// Open a session through `connector`.
    ///
    /// # Errors
    ///
    /// Returns a connection error when a setting is blank or the connector
    /// refuses the session.
    pub fn connect(
        connector: &dyn StoreConnector,
        settings: &SessionSettings,
    ) -> StoreResult<Self> {
        settings.check()?;
        let backend = connector.connect(settings)?;
        info!(
            pool = %settings.pool,
            identity = %settings.identity,
            config = %settings.config_file.display(),
            "object store session opened"
        );
        Ok(Self { backend })
    }

    /// Wrap an already open backend session.
    #[must_use]
    pub fn from_backend(backend: Box<dyn ObjectBackend>) -> Self {
        Self { backend }
    }

    /// Pool the session is bound to.
    #[must_use]
    pub fn pool(&self) -> &str {
        self.backend.pool()
    }

    /// Stream `reader` into `oid` in chunks of `chunk_size` bytes and stamp the
    /// object with the MD5 of everything written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SourceRead`] when the reader fails, or the backend
    /// error of the first rejected truncate, write or attribute update.
    pub fn stream_write<R: Read>(
        &mut self,
        oid: &str,
        mut reader: R,
        chunk_size: usize,
    ) -> StoreResult<WriteSummary> {
        let mut buffer = vec![0_u8; chunk_size.max(1)];
        let mut digest = ContentDigest::new();
        let mut offset = 0_u64;
        let mut chunks = 0_u64;

        loop {
            let read = read_chunk(&mut reader, &mut buffer).map_err(|source| {
                StoreError::SourceRead {
                    oid: oid.to_string(),
                    offset,
                    source,
                }
            })?;
            if read == 0 {
                break;
            }
            let chunk = &buffer[..read];
            self.backend.truncate(oid, offset)?;
            self.backend.write_at(oid, chunk, offset)?;
            digest.update(chunk);
            offset += read as u64;
            chunks += 1;
            debug!(oid, offset, chunk = chunks, "chunk written");
        }

        if chunks == 0 {
            self.backend.truncate(oid, 0)?;
        }

        let digest = digest.finish();
        self.backend
            .set_xattr(oid, DIGEST_ATTRIBUTE, digest.as_bytes())?;
        Ok(WriteSummary {
            bytes: offset,
            chunks,
            digest,
        })
    }

    /// Stat `oid`; `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the service cannot answer.
    pub fn stat_object(&mut self, oid: &str) -> StoreResult<Option<ObjectStat>> {
        self.backend.stat(oid)
    }

    /// Read a UTF-8 extended attribute.
    ///
    /// # Errors
    ///
    /// Returns an error when the object or attribute is missing or the value is
    /// not UTF-8.
    pub fn get_attribute(&mut self, oid: &str, name: &str) -> StoreResult<String> {
        let raw = self.backend.get_xattr(oid, name)?;
        String::from_utf8(raw).map_err(|_| StoreError::AttributeEncoding {
            oid: oid.to_string(),
            name: name.to_string(),
        })
    }

    /// Set a UTF-8 extended attribute on an existing object.
    ///
    /// # Errors
    ///
    /// Returns an error when the object is missing or the service rejects the
    /// update.
    pub fn set_attribute(&mut self, oid: &str, name: &str, value: &str) -> StoreResult<()> {
        self.backend.set_xattr(oid, name, value.as_bytes())
    }

    /// True when `oid` exists and holds exactly `expected` bytes.
    pub fn validate_by_size(&mut self, oid: &str, expected: u64) -> bool {
        match self.backend.stat(oid) {
            Ok(Some(stat)) => stat.size == expected,
            Ok(None) => false,
            Err(err) => {
                warn!(oid, error = ?err, "stat failed during validation");
                false
            }
        }
    }

    /// True when `oid` exists under its own identifier and its digest
    /// attribute equals `expected`.
    pub fn validate_by_digest(&mut self, oid: &str, expected: &str) -> bool {
        match self.backend.stat(oid) {
            Ok(Some(stat)) if stat.oid == oid => {}
            Ok(_) => return false,
            Err(err) => {
                warn!(oid, error = ?err, "stat failed during validation");
                return false;
            }
        }
        match self.get_attribute(oid, DIGEST_ATTRIBUTE) {
            Ok(stored) => stored == expected,
            Err(err) => {
                warn!(oid, error = ?err, "digest attribute unreadable");
                false
            }
        }
    }
}
