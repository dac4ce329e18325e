use super::{BatchRecordReader, RecordReader, convert::Convertor};
use crate::error::ReadError;
use async_trait::async_trait;
use engine_config::settings::DEFAULT_BATCH;
use engine_core::connectors::source::Source;
use model::records::record::Records;
use std::sync::Arc;
use tracing::{debug, error};

/// Assembles batches from a per-record reader.
///
/// The record reader does blocking I/O, so each batch is filled on the
/// blocking thread pool and the reader is handed back afterwards.
pub struct StreamBatchReader {
    rr: Option<Box<dyn RecordReader>>,
    source: Arc<dyn Source>,
    convertor: Arc<dyn Convertor>,
    batch: usize,
}

impl StreamBatchReader {
    pub fn new(
        rr: Box<dyn RecordReader>,
        convertor: Arc<dyn Convertor>,
        batch: usize,
    ) -> Self {
        let source = rr.source().clone();
        Self {
            rr: Some(rr),
            source,
            convertor,
            batch: if batch == 0 { DEFAULT_BATCH } else { batch },
        }
    }

    pub fn batch(&self) -> usize {
        self.batch
    }
}

/// Reads up to `batch` raw records and converts them.
///
/// Continue errors are skipped. Any other error ends the batch early when
/// something was already consumed, otherwise it is returned.
fn fill_batch(
    rr: &mut dyn RecordReader,
    convertor: &dyn Convertor,
    batch: usize,
) -> Result<(usize, Records), ReadError> {
    let mut bytes = 0;
    let mut raw = Vec::with_capacity(batch);

    while raw.len() < batch {
        match rr.read() {
            Ok((n, record)) => {
                bytes += n;
                raw.push(record);
            }
            Err(ReadError::Continue { bytes: n, reason }) => {
                bytes += n;
                error!(source = %rr.source().name(), reason = %reason, "Skipping bad record");
            }
            Err(err) => {
                if raw.is_empty() && bytes == 0 {
                    return Err(err);
                }
                if !err.is_eof() {
                    error!(
                        source = %rr.source().name(),
                        error = %err,
                        read = raw.len(),
                        "Read failed, returning partial batch"
                    );
                }
                break;
            }
        }
    }

    let mut records = Records::with_capacity(raw.len());
    for record in raw {
        records.extend(convertor.apply(record)?);
    }
    Ok((bytes, records))
}

#[async_trait]
impl BatchRecordReader for StreamBatchReader {
    fn source(&self) -> Arc<dyn Source> {
        self.source.clone()
    }

    async fn read_batch(&mut self) -> Result<(usize, Records), ReadError> {
        let mut rr = self
            .rr
            .take()
            .ok_or_else(|| ReadError::Aborted("record reader lost by a previous read".into()))?;
        let convertor = self.convertor.clone();
        let batch = self.batch;

        let (rr, result) = tokio::task::spawn_blocking(move || {
            let result = fill_batch(rr.as_mut(), convertor.as_ref(), batch);
            (rr, result)
        })
        .await
        .map_err(|e| ReadError::Aborted(e.to_string()))?;

        self.rr = Some(rr);
        if let Ok((bytes, records)) = &result {
            debug!(source = %self.source.name(), bytes, records = records.len(), "Read batch");
        }
        result
    }
}
