use crate::error::PoolError;
use std::{future::Future, sync::Arc};
use tokio::{
    sync::Semaphore,
    task::JoinHandle,
};
use tokio_util::task::TaskTracker;

/// Bounded set of workers running tracked tasks.
///
/// At most `concurrency` tasks run at once; the tracker doubles as the
/// pool's wait group.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: Arc<str>,
    concurrency: usize,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl WorkerPool {
    pub fn new(name: &str, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            name: Arc::from(name),
            concurrency,
            permits: Arc::new(Semaphore::new(concurrency)),
            tracker: TaskTracker::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Tasks submitted and not yet finished, running or queued.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Queues `task` without waiting; it starts once a worker frees up.
    pub fn spawn<F>(&self, task: F) -> Result<JoinHandle<F::Output>, PoolError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.permits.is_closed() {
            return Err(PoolError::Closed(self.name.to_string()));
        }
        let permits = self.permits.clone();
        Ok(self.tracker.spawn(async move {
            // A pool closed after queueing still lets the task run to completion.
            let _permit = permits.acquire_owned().await.ok();
            task.await
        }))
    }

    /// Waits for a free worker, then starts `task` on it.
    pub async fn submit<F>(&self, task: F) -> Result<JoinHandle<F::Output>, PoolError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed(self.name.to_string()))?;
        Ok(self.tracker.spawn(async move {
            let _permit = permit;
            task.await
        }))
    }

    /// Resolves once every task submitted so far has finished.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Rejects further submissions.
    pub fn close(&self) {
        self.permits.close();
        self.tracker.close();
    }
}
