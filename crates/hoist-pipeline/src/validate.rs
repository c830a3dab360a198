//! Validate worker: compares each object with its source file.
//!
//! # Design
//! - Read-only against the object store.
//! - `size` compares lengths; `digest` re-reads the source and compares its MD5
//!   with the stored attribute.
//! - Source read failures surface as record errors, which the task loop counts
//!   as mismatches.

use std::path::Path;
use std::sync::Arc;

use hoist_config::ValidateStrategy;
use hoist_objstore::{ObjectStoreClient, SessionSettings, StoreConnector, digest_reader};
use tracing::info;

use crate::error::{PipelineError, PipelineResult, RecordError};
use crate::record::{RecordOutcome, SourceRecord};
use crate::runner::{Mapper, MapperFactory};
use crate::source::{EntryKind, SourceFs};

/// Opens one object store session per validate task.
pub struct ValidateMapperFactory {
    fs: Arc<dyn SourceFs>,
    connector: Arc<dyn StoreConnector>,
    settings: SessionSettings,
    strategy: ValidateStrategy,
    buffer_size: usize,
}

impl ValidateMapperFactory {
    /// Factory reading from the pool named by `settings`.
    #[must_use]
    pub fn new(
        fs: Arc<dyn SourceFs>,
        connector: Arc<dyn StoreConnector>,
        settings: SessionSettings,
        strategy: ValidateStrategy,
        buffer_size: usize,
    ) -> Self {
        Self {
            fs,
            connector,
            settings,
            strategy,
            buffer_size,
        }
    }
}

impl MapperFactory for ValidateMapperFactory {
    type Mapper = ValidateMapper;

    fn setup(&self, task: usize) -> PipelineResult<ValidateMapper> {
        let client = ObjectStoreClient::connect(self.connector.as_ref(), &self.settings)
            .map_err(|source| PipelineError::Session { task, source })?;
        Ok(ValidateMapper {
            fs: Arc::clone(&self.fs),
            client,
            strategy: self.strategy,
            buffer_size: self.buffer_size,
        })
    }
}

/// Per-task validate worker owning its session.
pub struct ValidateMapper {
    fs: Arc<dyn SourceFs>,
    client: ObjectStoreClient,
    strategy: ValidateStrategy,
    buffer_size: usize,
}

impl Mapper for ValidateMapper {
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

        let matched = match self.strategy {
            ValidateStrategy::Size => self.client.validate_by_size(&record.path, metadata.len),
            ValidateStrategy::Digest => {
                let reader = self
                    .fs
                    .open(path)
                    .map_err(|source| RecordError::unreadable("open", &record.path, source))?;
                let (digest, _) = digest_reader(reader, self.buffer_size)
                    .map_err(|source| RecordError::unreadable("read", &record.path, source))?;
                self.client.validate_by_digest(&record.path, &digest)
            }
        };

        if matched {
            Ok(RecordOutcome::Matched)
        } else {
            info!(
                path = %record.path,
                strategy = self.strategy.as_str(),
                "object does not match source"
            );
            Ok(RecordOutcome::Mismatched)
        }
    }

    fn failure_outcome(&self) -> RecordOutcome {
        RecordOutcome::Mismatched
    }
}
