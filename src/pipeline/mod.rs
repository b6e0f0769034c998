//! Per-message processing
//!
//! One inbound message is one unit of work: parse the payload, then run two
//! independent branches concurrently:
//!
//! - persist: look up the schema, map every record, then write each one
//!   through the [`PersistenceWriter`]
//! - archive: store the raw payload through the [`ArchiveWriter`]
//!
//! Neither branch waits on or inspects the other, so a payload that parses is
//! archived even when its schema id is unknown. Every step is safe to repeat
//! on redelivery.

pub mod message;

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::database::{PersistenceWriter, RecordStore, WriteResult};
use crate::mapping::{self, MappingError};
use crate::payload::{PayloadError, RawPayload};
use crate::schema::{SchemaError, SchemaRegistry};
use crate::storage::{ArchiveWriter, StorageBackend};

pub use message::{DecodedMessage, MessageError, decode_push_message};

/// Failures that stop a message before either branch runs. All are terminal.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// Why the persist branch wrote nothing. Both are terminal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// What the caller should tell the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done with this message, successfully or terminally
    Ack,
    /// A store was unavailable; let the queue redeliver
    Retry,
}

/// Result of processing one message
#[derive(Debug, Clone, PartialEq)]
pub struct MessageOutcome {
    /// Schema id the message was addressed to
    pub schema_id: String,
    /// Archive branch result
    pub archive: WriteResult,
    /// Persist branch: one result per record, or why nothing was mapped
    pub records: Result<Vec<WriteResult>, PersistError>,
}

impl MessageOutcome {
    /// `Retry` when any write reported `Unavailable`, otherwise `Ack`.
    ///
    /// Unknown schemas and mapping failures are terminal: redelivery
    /// reproduces them.
    pub fn disposition(&self) -> Disposition {
        let record_unavailable = self
            .records
            .as_ref()
            .is_ok_and(|results| results.iter().any(WriteResult::is_unavailable));
        if record_unavailable || self.archive.is_unavailable() {
            Disposition::Retry
        } else {
            Disposition::Ack
        }
    }

    /// Number of records written
    pub fn written(&self) -> usize {
        self.count(WriteResult::is_written)
    }

    /// Number of records rejected as duplicates or constraint violations
    pub fn rejected(&self) -> usize {
        self.count(WriteResult::is_rejected)
    }

    fn count(&self, predicate: fn(&WriteResult) -> bool) -> usize {
        self.records
            .as_ref()
            .map(|results| results.iter().filter(|r| predicate(r)).count())
            .unwrap_or(0)
    }
}

/// Processes inbound messages against a fixed schema registry
#[derive(Debug)]
pub struct Pipeline {
    registry: Arc<SchemaRegistry>,
    writer: PersistenceWriter,
    archiver: ArchiveWriter,
}

impl Pipeline {
    pub fn new(registry: Arc<SchemaRegistry>, writer: PersistenceWriter, archiver: ArchiveWriter) -> Self {
        Self {
            registry,
            writer,
            archiver,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn writer(&self) -> &PersistenceWriter {
        &self.writer
    }

    /// Process one message given as payload text
    pub async fn process(
        &self,
        text: &str,
        schema_id: &str,
        store: &dyn RecordStore,
        storage: &dyn StorageBackend,
    ) -> Result<MessageOutcome, PipelineError> {
        let raw = RawPayload::parse(text).inspect_err(|e| {
            warn!(schema = schema_id, error = %e, "Dropping unparseable payload");
        })?;
        Ok(self.process_payload(&raw, schema_id, store, storage).await)
    }

    /// Process one push-subscription body
    pub async fn process_push(
        &self,
        body: &str,
        schema_id: &str,
        store: &dyn RecordStore,
        storage: &dyn StorageBackend,
    ) -> Result<MessageOutcome, PipelineError> {
        let message = decode_push_message(body)?;
        info!(
            message_id = message.message_id.as_deref().unwrap_or("-"),
            schema = schema_id,
            "Push message received"
        );
        self.process(&message.text, schema_id, store, storage).await
    }

    /// Run the persist and archive branches for an already-parsed payload
    pub async fn process_payload(
        &self,
        raw: &RawPayload,
        schema_id: &str,
        store: &dyn RecordStore,
        storage: &dyn StorageBackend,
    ) -> MessageOutcome {
        let (records, archive) = tokio::join!(
            self.persist(raw, schema_id, store),
            self.archiver.archive(raw, storage)
        );

        let outcome = MessageOutcome {
            schema_id: schema_id.to_string(),
            archive,
            records,
        };

        info!(
            schema = schema_id,
            written = outcome.written(),
            rejected = outcome.rejected(),
            archive = outcome.archive.label(),
            disposition = ?outcome.disposition(),
            "Message processed"
        );
        outcome
    }

    async fn persist(
        &self,
        raw: &RawPayload,
        schema_id: &str,
        store: &dyn RecordStore,
    ) -> Result<Vec<WriteResult>, PersistError> {
        let schema = self.registry.get(schema_id).inspect_err(|e| {
            warn!(schema = schema_id, error = %e, "No schema registered, archiving only");
        })?;
        let records = mapping::map_records(raw, &schema).inspect_err(|e| {
            warn!(schema = schema_id, field = e.field(), error = %e, "Payload does not match schema");
        })?;

        let mut results = Vec::with_capacity(records.len());
        for record in &records {
            results.push(self.writer.write(record, &schema, store).await);
        }
        Ok(results)
    }
}
