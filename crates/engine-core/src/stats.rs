use chrono::Utc;
use model::stats::Stats;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

/// Shared, lock-guarded import counters.
///
/// Updates happen once per batch or request, so a plain mutex is enough.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyStats {
    inner: Arc<Mutex<Stats>>,
}

impl ConcurrencyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start time. Only the first call has an effect.
    pub fn init(&self) {
        let mut s = self.inner.lock();
        if s.start_time.is_none() {
            s.start_time = Some(Utc::now());
        }
    }

    pub fn add_total(&self, n: u64) {
        self.inner.lock().total += n;
    }

    pub fn failed(&self, n: u64, records: u64) {
        let mut s = self.inner.lock();
        s.processed += n;
        s.failed_records += records;
        s.total_records += records;
    }

    pub fn succeeded(&self, n: u64, records: u64) {
        let mut s = self.inner.lock();
        s.processed += n;
        s.total_records += records;
    }

    pub fn request_failed(&self, records: u64) {
        let mut s = self.inner.lock();
        s.failed_request += 1;
        s.total_request += 1;
        s.failed_processed += records;
        s.total_processed += records;
    }

    pub fn request_succeeded(&self, records: u64, latency: Duration, resp_time: Duration) {
        let mut s = self.inner.lock();
        s.total_request += 1;
        s.total_latency += latency;
        s.total_resp_time += resp_time;
        s.total_processed += records;
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> Stats {
        self.inner.lock().clone()
    }
}
