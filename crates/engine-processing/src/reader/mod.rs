use crate::error::ReadError;
use async_trait::async_trait;
use engine_core::{connectors::source::Source, error::SourceError};
use model::records::record::{Record, Records};
use std::sync::Arc;

pub mod batch;
pub mod convert;
pub mod csv;
pub mod sql;

/// Reads one raw record at a time from a source.
///
/// Blocking: the batch reader drives it from a blocking thread.
pub trait RecordReader: Send + Sync {
    fn source(&self) -> &Arc<dyn Source>;

    /// Next record and the number of source units it consumed.
    ///
    /// `ReadError::Eof` ends the stream; `ReadError::Continue` skips a bad
    /// record without ending it.
    fn read(&mut self) -> Result<(usize, Record), ReadError>;
}

/// Produces batches of converted records for the import pipeline.
#[async_trait]
pub trait BatchRecordReader: Send + Sync {
    fn source(&self) -> Arc<dyn Source>;

    async fn size(&self) -> Result<u64, SourceError> {
        self.source().size().await
    }

    /// Next batch and the number of source units it consumed.
    ///
    /// Returns `ReadError::Eof` once the source is exhausted.
    async fn read_batch(&mut self) -> Result<(usize, Records), ReadError>;
}
