use crate::error::ManagerError;
use engine_config::{hooks::HookPhase, settings::ManagerSettings};
use engine_core::{
    connectors::{
        client::{ClientOptions, ClientPool},
        source::Source,
    },
    pool::WorkerPool,
    stats::ConcurrencyStats,
    sync::Gate,
};
use engine_processing::{importer::Importer, reader::BatchRecordReader};
use job::Job;
use model::stats::Stats;
use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{sync::OnceCell, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub(crate) mod hooks;
mod job;

/// Orchestrates import jobs over two bounded worker pools.
///
/// Jobs registered with [`Manager::import`] wait on a shared start gate, so
/// they can be added before or after [`Manager::start`]. Each job reads its
/// source on the reader pool and fans batches out to the importer pool.
/// [`Manager::wait`] drains both pools and then stops the manager.
///
/// Cloning is cheap; clones drive the same manager.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) settings: ManagerSettings,
    client_options: ClientOptions,
    pool: Arc<dyn ClientPool>,
    pub(crate) stats: ConcurrencyStats,
    pub(crate) reader_pool: WorkerPool,
    pub(crate) importer_pool: WorkerPool,
    pub(crate) started: Gate,
    pub(crate) done: CancellationToken,
    pool_opened: AtomicBool,
    start_result: OnceCell<Result<(), ManagerError>>,
    stop_result: OnceCell<Result<(), ManagerError>>,
    jobs: Mutex<Vec<JoinHandle<Result<(), ManagerError>>>>,
    stats_loop: Mutex<Option<JoinHandle<()>>>,
}

impl Manager {
    pub fn new(settings: ManagerSettings, pool: Arc<dyn ClientPool>) -> Self {
        let client_options = ClientOptions {
            graph: Some(settings.graph_name.clone()).filter(|g| !g.is_empty()),
        };

        Self {
            inner: Arc::new(Inner {
                reader_pool: WorkerPool::new("reader", settings.reader_concurrency),
                importer_pool: WorkerPool::new("importer", settings.importer_concurrency),
                settings,
                client_options,
                pool,
                stats: ConcurrencyStats::new(),
                started: Gate::new(),
                done: CancellationToken::new(),
                pool_opened: AtomicBool::new(false),
                start_result: OnceCell::new(),
                stop_result: OnceCell::new(),
                jobs: Mutex::new(Vec::new()),
                stats_loop: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.inner.settings
    }

    /// Registers a job for `source`.
    ///
    /// The source is opened and sized right away and its size is added to
    /// the total. Reading starts once the manager is started. Does nothing
    /// when `importers` is empty.
    pub async fn import(
        &self,
        source: Arc<dyn Source>,
        reader: Box<dyn BatchRecordReader>,
        importers: Vec<Arc<dyn Importer>>,
    ) -> Result<(), ManagerError> {
        let inner = &self.inner;
        let name = source.name();

        if importers.is_empty() {
            debug!(graph = %inner.graph(), source = %name, "No importers, skipping source");
            return Ok(());
        }
        if inner.done.is_cancelled() || inner.reader_pool.is_closed() {
            return Err(ManagerError::Stopped {
                graph: inner.graph().to_string(),
            });
        }

        source
            .open()
            .await
            .map_err(|error| ManagerError::OpenSource {
                graph: inner.graph().to_string(),
                source_name: name.clone(),
                error,
            })?;

        let size = match reader.size().await {
            Ok(size) => size,
            Err(error) => {
                close_source(inner.graph(), source.as_ref()).await;
                return Err(ManagerError::SourceSize {
                    graph: inner.graph().to_string(),
                    source_name: name,
                    error,
                });
            }
        };
        inner.stats.add_total(size);

        let job = Job {
            units: importers.iter().map(|i| i.acquire()).collect(),
            source: source.clone(),
            reader,
            importers,
        };

        match inner.reader_pool.spawn(job.run(inner.clone())) {
            Ok(handle) => {
                inner.jobs.lock().push(handle);
                info!(graph = %inner.graph(), source = %name, size, "Job registered");
                Ok(())
            }
            Err(error) => {
                error!(graph = %inner.graph(), source = %name, error = %error, "Failed to submit job");
                close_source(inner.graph(), source.as_ref()).await;
                Err(ManagerError::Submit {
                    graph: inner.graph().to_string(),
                    source_name: name,
                    error,
                })
            }
        }
    }

    /// Runs the before hooks, opens the client pool and releases every job.
    ///
    /// Only the first call does anything; later calls return its result.
    /// A failing hook leaves the pool closed and the jobs blocked.
    pub async fn start(&self) -> Result<(), ManagerError> {
        let inner = &self.inner;
        inner
            .start_result
            .get_or_init(|| Inner::start(inner))
            .await
            .clone()
    }

    /// Waits until every job and every importer task has finished, then
    /// stops the manager.
    pub async fn wait(&self) -> Result<(), ManagerError> {
        self.inner.reader_pool.wait().await;
        self.inner.importer_pool.wait().await;
        self.stop().await
    }

    /// Cancels outstanding reads, drains both pools, logs the final stats
    /// and runs the after hooks.
    ///
    /// The body runs once. Concurrent and later callers wait for it and all
    /// receive the same result.
    pub async fn stop(&self) -> Result<(), ManagerError> {
        let inner = &self.inner;
        inner
            .stop_result
            .get_or_init(|| Inner::stop(inner))
            .await
            .clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stop_result.initialized()
    }

    pub fn stats(&self) -> Stats {
        self.inner.stats.snapshot()
    }
}

impl Inner {
    pub(crate) fn graph(&self) -> &str {
        &self.settings.graph_name
    }

    async fn start(self: &Arc<Self>) -> Result<(), ManagerError> {
        if self.done.is_cancelled() {
            return Err(ManagerError::Stopped {
                graph: self.graph().to_string(),
            });
        }

        info!(graph = %self.graph(), "Starting import");
        self.exec_hooks(HookPhase::Before).await?;

        self.stats.init();
        self.pool
            .open()
            .await
            .map_err(|error| ManagerError::ClientPool {
                graph: self.graph().to_string(),
                error,
            })?;
        self.pool_opened.store(true, Ordering::SeqCst);

        self.started.release();
        if let Some(interval) = self.settings.stats_interval {
            let handle = tokio::spawn(stats_loop(self.clone(), interval));
            *self.stats_loop.lock() = Some(handle);
        }
        info!(graph = %self.graph(), "Import started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ManagerError> {
        info!(graph = %self.graph(), "Stopping import");
        self.done.cancel();

        self.reader_pool.wait().await;
        self.importer_pool.wait().await;
        self.reader_pool.close();
        self.importer_pool.close();

        self.reap_jobs().await;
        let stats_loop = self.stats_loop.lock().take();
        if let Some(handle) = stats_loop {
            let _ = handle.await;
        }
        info!(graph = %self.graph(), stats = %self.stats.snapshot(), "Import finished");

        let result = self.exec_hooks(HookPhase::After).await;

        if self.pool_opened.swap(false, Ordering::SeqCst) {
            if let Err(error) = self.pool.close().await {
                warn!(graph = %self.graph(), error = %error, "Failed to close client pool");
                return result.and(Err(ManagerError::ClientPool {
                    graph: self.graph().to_string(),
                    error,
                }));
            }
        }
        result
    }

    async fn exec_hooks(&self, phase: HookPhase) -> Result<(), ManagerError> {
        let result = hooks::exec_hooks(
            self.pool.as_ref(),
            &self.client_options,
            self.graph(),
            phase,
            self.settings.hooks.phase(phase),
        )
        .await;
        if let Err(e) = &result {
            error!(graph = %self.graph(), phase = %phase, error = %e, "Hooks failed");
        }
        result
    }

    /// Collects finished job handles and reports jobs that failed.
    async fn reap_jobs(&self) {
        let handles = std::mem::take(&mut *self.jobs.lock());
        let mut failed = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => failed += 1,
                Err(e) => {
                    failed += 1;
                    let e = ManagerError::Task {
                        graph: self.graph().to_string(),
                        message: e.to_string(),
                    };
                    error!(error = %e, "Job task did not complete");
                }
            }
        }
        if failed > 0 {
            warn!(graph = %self.graph(), failed, "Some jobs did not finish cleanly");
        }
    }
}

async fn stats_loop(inner: Arc<Inner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    info!(graph = %inner.graph(), stats = %inner.stats.snapshot(), "Progress");
    loop {
        tokio::select! {
            _ = inner.done.cancelled() => break,
            _ = ticker.tick() => {
                info!(graph = %inner.graph(), stats = %inner.stats.snapshot(), "Progress");
            }
        }
    }
}

async fn close_source(graph: &str, source: &dyn Source) {
    if let Err(e) = source.close().await {
        warn!(graph = %graph, source = %source.name(), error = %e, "Failed to close source");
    }
}
