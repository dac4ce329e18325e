use super::Inner;
use crate::error::ManagerError;
use engine_core::{connectors::source::Source, sync::PendingUnit};
use engine_processing::{importer::Importer, reader::BatchRecordReader};
use model::records::record::{Records, sub_batches};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One registered source with its reader and importers.
pub(crate) struct Job {
    pub(crate) source: Arc<dyn Source>,
    pub(crate) reader: Box<dyn BatchRecordReader>,
    pub(crate) importers: Vec<Arc<dyn Importer>>,
    /// Held until the read loop ends so no importer looks idle before the
    /// first batch is submitted.
    pub(crate) units: Vec<PendingUnit>,
}

impl Job {
    pub(crate) async fn run(mut self, inner: Arc<Inner>) -> Result<(), ManagerError> {
        let name = self.source.name();
        let result = self.read_loop(&inner, &name).await;

        drop(std::mem::take(&mut self.units));
        if let Err(e) = self.source.close().await {
            warn!(graph = %inner.graph(), source = %name, error = %e, "Failed to close source");
        }
        if let Err(e) = &result {
            error!(graph = %inner.graph(), source = %name, error = %e, "Job aborted");
        }
        result
    }

    async fn read_loop(&mut self, inner: &Arc<Inner>, name: &str) -> Result<(), ManagerError> {
        tokio::select! {
            _ = inner.started.wait() => {}
            _ = inner.done.cancelled() => {
                info!(graph = %inner.graph(), source = %name, "Stopped before start");
                return Ok(());
            }
        }

        for importer in &self.importers {
            tokio::select! {
                _ = importer.ready() => {}
                _ = inner.done.cancelled() => return Ok(()),
            }
        }

        debug!(graph = %inner.graph(), source = %name, "Reading source");
        loop {
            if inner.done.is_cancelled() {
                info!(graph = %inner.graph(), source = %name, "Stop requested, leaving read loop");
                return Ok(());
            }

            match self.reader.read_batch().await {
                Ok((bytes, records)) => {
                    if records.is_empty() {
                        inner.stats.succeeded(bytes as u64, 0);
                        continue;
                    }
                    submit_importer_task(inner, &self.importers, bytes, records).await;
                }
                Err(e) if e.is_eof() => {
                    info!(graph = %inner.graph(), source = %name, "Source drained");
                    return Ok(());
                }
                Err(error) => {
                    return Err(ManagerError::ReadBatch {
                        graph: inner.graph().to_string(),
                        source_name: name.to_string(),
                        error,
                    });
                }
            }
        }
    }
}

/// Queues one batch on the importer pool, waiting for a free worker.
///
/// Every importer holds a pending unit until the task has finished. A
/// batch the pool refuses is accounted as failed.
async fn submit_importer_task(
    inner: &Arc<Inner>,
    importers: &[Arc<dyn Importer>],
    bytes: usize,
    records: Records,
) {
    let count = records.len();
    let units: Vec<PendingUnit> = importers.iter().map(|i| i.acquire()).collect();
    let task = {
        let inner = inner.clone();
        let importers = importers.to_vec();
        async move {
            let _units = units;
            import_batch(&inner, &importers, bytes, &records).await;
        }
    };

    if let Err(e) = inner.importer_pool.submit(task).await {
        error!(graph = %inner.graph(), records = count, error = %e, "Batch rejected");
        inner.stats.failed(bytes as u64, count as u64);
    }
}

/// Hands a batch to every importer in sub-batches of its statement size.
///
/// A failing importer does not stop the others. Each record is counted
/// once and is failed if any importer failed on it.
async fn import_batch(inner: &Inner, importers: &[Arc<dyn Importer>], bytes: usize, records: &Records) {
    let mut failed = vec![false; records.len()];

    for importer in importers {
        let size = importer.batch_size().unwrap_or(inner.settings.batch).max(1);
        let mut offset = 0;

        for chunk in sub_batches(records, size) {
            match importer.import(chunk).await {
                // Zero records means the builder filtered everything and nothing was sent.
                Ok(resp) if resp.records > 0 => {
                    inner
                        .stats
                        .request_succeeded(resp.records as u64, resp.latency, resp.resp_time);
                }
                Ok(_) => {}
                Err(e) => {
                    error!(
                        graph = %inner.graph(),
                        records = chunk.len(),
                        statement = e.statement().unwrap_or_default(),
                        error = %e,
                        "Failed to import sub-batch"
                    );
                    inner.stats.request_failed(chunk.len() as u64);
                    failed[offset..offset + chunk.len()].fill(true);
                }
            }
            offset += chunk.len();
        }
    }

    let failed = failed.iter().filter(|f| **f).count();
    let succeeded = records.len() - failed;
    if failed > 0 {
        inner.stats.failed(0, failed as u64);
    }
    inner.stats.succeeded(bytes as u64, succeeded as u64);
    debug!(graph = %inner.graph(), succeeded, failed, "Batch imported");
}
