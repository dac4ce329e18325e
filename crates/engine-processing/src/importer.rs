use crate::error::ImportError;
use async_trait::async_trait;
use engine_core::{
    connectors::client::{ClientPool, Response},
    error::ClientError,
    retry::{RetryDisposition, RetryError, RetryPolicy},
    statement::StatementBuilder,
    sync::{Gate, PendingUnit, PendingUnits},
};
use model::records::record::Record;
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// Outcome of one executed statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportResp {
    /// Records the statement represented.
    pub records: usize,
    /// Server-side latency reported by the database.
    pub latency: Duration,
    /// Round trip including client overhead.
    pub resp_time: Duration,
}

/// A sink turning record batches into executed statements.
///
/// Besides importing, an importer exposes the synchronisation points the
/// orchestrator coordinates on: pending units it holds while work for the
/// importer is outstanding, and a readiness gate readers wait on before
/// producing the first batch.
#[async_trait]
pub trait Importer: Send + Sync {
    async fn import(&self, records: &[Record]) -> Result<ImportResp, ImportError>;

    /// Marks one unit of outstanding work; released when the token drops.
    fn acquire(&self) -> PendingUnit;

    /// Resolves once the importer may receive batches.
    async fn ready(&self);

    /// Records per statement; `None` defers to the orchestrator's batch.
    fn batch_size(&self) -> Option<usize> {
        None
    }
}

/// Builds one statement per call and executes it through a client pool
/// with retry.
pub struct DefaultImporter {
    builder: Arc<dyn StatementBuilder>,
    pool: Arc<dyn ClientPool>,
    retry: RetryPolicy,
    pending: PendingUnits,
    gate: Gate,
    batch_size: Option<usize>,
}

impl DefaultImporter {
    pub fn new(builder: Arc<dyn StatementBuilder>, pool: Arc<dyn ClientPool>) -> Self {
        Self {
            builder,
            pool,
            retry: RetryPolicy::for_statements(),
            pending: PendingUnits::new(),
            gate: Gate::released(),
            batch_size: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pending(mut self, pending: PendingUnits) -> Self {
        self.pending = pending;
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size.max(1));
        self
    }

    pub fn pending(&self) -> &PendingUnits {
        &self.pending
    }

    async fn execute(&self, statement: &str) -> Result<Response, RetryError<ClientError>> {
        let pool = &self.pool;
        self.retry
            .run(
                move || async move {
                    let resp = pool.execute(statement).await?;
                    if resp.is_succeed() {
                        Ok(resp)
                    } else {
                        Err(ClientError::Rejected(
                            resp.error().unwrap_or("unknown error").to_string(),
                        ))
                    }
                },
                |e: &ClientError| match e {
                    ClientError::PoolNotOpen => RetryDisposition::Stop,
                    _ => RetryDisposition::Retry,
                },
            )
            .await
    }
}

#[async_trait]
impl Importer for DefaultImporter {
    async fn import(&self, records: &[Record]) -> Result<ImportResp, ImportError> {
        let (statement, count) =
            self.builder
                .build(records)
                .map_err(|source| ImportError::Build {
                    records: records.len(),
                    source,
                })?;

        if count == 0 || statement.is_empty() {
            return Ok(ImportResp::default());
        }

        let resp = self.execute(&statement).await.map_err(|e| {
            let (attempts, source) = match e {
                RetryError::Fatal(source) => (1, source),
                RetryError::AttemptsExceeded { attempts, last } => (attempts, last),
            };
            ImportError::Execute {
                statement: statement.clone(),
                attempts,
                source,
            }
        })?;

        debug!(records = count, latency_us = resp.latency().as_micros() as u64, "Imported");
        Ok(ImportResp {
            records: count,
            latency: resp.latency(),
            resp_time: resp.resp_time(),
        })
    }

    fn acquire(&self) -> PendingUnit {
        self.pending.acquire()
    }

    async fn ready(&self) {
        self.gate.wait().await;
    }

    fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }
}
