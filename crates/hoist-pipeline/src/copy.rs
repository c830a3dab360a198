//! Copy worker: streams each source file into the object store.

use std::path::Path;
use std::sync::Arc;

use hoist_objstore::{ObjectStoreClient, SessionSettings, StoreConnector};
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult, RecordError};
use crate::record::{RecordOutcome, SourceRecord};
use crate::runner::{Mapper, MapperFactory};
use crate::source::{EntryKind, SourceFs};

/// Opens one object store session per copy task.
pub struct CopyMapperFactory {
    fs: Arc<dyn SourceFs>,
    connector: Arc<dyn StoreConnector>,
    settings: SessionSettings,
    buffer_size: usize,
}

impl CopyMapperFactory {
    /// Factory writing into the pool named by `settings`.
    #[must_use]
    pub fn new(
        fs: Arc<dyn SourceFs>,
        connector: Arc<dyn StoreConnector>,
        settings: SessionSettings,
        buffer_size: usize,
    ) -> Self {
        Self {
            fs,
            connector,
            settings,
            buffer_size,
        }
    }
}

impl MapperFactory for CopyMapperFactory {
    type Mapper = CopyMapper;

    fn setup(&self, task: usize) -> PipelineResult<CopyMapper> {
        let client = ObjectStoreClient::connect(self.connector.as_ref(), &self.settings)
            .map_err(|source| PipelineError::Session { task, source })?;
        Ok(CopyMapper {
            fs: Arc::clone(&self.fs),
            client,
            buffer_size: self.buffer_size,
        })
    }
}

/// Per-task copy worker owning its session.
pub struct CopyMapper {
    fs: Arc<dyn SourceFs>,
    client: ObjectStoreClient,
    buffer_size: usize,
}

impl Mapper for CopyMapper {
    fn map(&mut self, record: &SourceRecord) -> Result<RecordOutcome, RecordError> {
        let path = Path::new(&record.path);
        let metadata = self
            .fs
            .metadata(path)
            .map_err(|source| RecordError::unreadable("stat", &record.path, source))?;
        if metadata.kind != EntryKind::File {
            info!(path = %record.path, "skipping non-regular source");
            return Ok(RecordOutcome::Skipped);
        }

        let reader = self
            .fs
            .open(path)
            .map_err(|source| RecordError::unreadable("open", &record.path, source))?;
        let summary = self
            .client
            .stream_write(&record.path, reader, self.buffer_size)
            .map_err(|source| RecordError::Store {
                path: record.path.clone(),
                source,
            })?;
        debug!(
            path = %record.path,
            bytes = summary.bytes,
            chunks = summary.chunks,
            digest = %summary.digest,
            "copied"
        );
        Ok(RecordOutcome::Copied {
            bytes: summary.bytes,
        })
    }

    fn failure_outcome(&self) -> RecordOutcome {
        RecordOutcome::CopyFailed
    }
}
