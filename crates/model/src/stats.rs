use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, time::Duration};

/// Point-in-time view of an import run.
///
/// `total` and `processed` are measured in source units (bytes for file
/// sources, rows for queryable ones); the `*_records` fields count logical
/// records handed to importers, and the `*_request`/`*_processed` fields
/// count statement executions and the records they carried.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub start_time: Option<DateTime<Utc>>,
    pub total: u64,
    pub processed: u64,
    pub total_records: u64,
    pub failed_records: u64,
    pub total_request: u64,
    pub failed_request: u64,
    pub total_processed: u64,
    pub failed_processed: u64,
    pub total_latency: Duration,
    pub total_resp_time: Duration,
}

impl Stats {
    pub fn succeeded_records(&self) -> u64 {
        self.total_records.saturating_sub(self.failed_records)
    }

    pub fn is_failed(&self) -> bool {
        self.failed_records > 0 || self.failed_request > 0
    }

    /// Share of the sized input consumed so far, in percent.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time
            .and_then(|start| (Utc::now() - start).to_std().ok())
            .unwrap_or_default()
    }

    pub fn avg_latency(&self) -> Duration {
        self.average(self.total_latency)
    }

    pub fn avg_resp_time(&self) -> Duration {
        self.average(self.total_resp_time)
    }

    /// Estimated time left, extrapolated from progress so far.
    pub fn remaining(&self) -> Option<Duration> {
        let pct = self.percentage();
        if pct <= 0.0 {
            return None;
        }
        let secs = (100.0 - pct) / pct * self.elapsed().as_secs_f64();
        Some(Duration::from_secs(secs.max(0.0) as u64))
    }

    fn average(&self, total: Duration) -> Duration {
        let succeeded = self.total_request.saturating_sub(self.failed_request);
        match u32::try_from(succeeded) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => total / n,
        }
    }

    fn rate(&self, count: u64) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 { count as f64 / secs } else { 0.0 }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let remaining = self
            .remaining()
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "...".to_string());

        write!(
            f,
            "{:.0}s {} {:.2}%({}/{}) \
             Records{{Finished: {}, Failed: {}, Rate: {:.2}/s}}, \
             Requests{{Finished: {}, Failed: {}, Latency: {:?}/{:?}, Rate: {:.2}/s}}, \
             Processed{{Finished: {}, Failed: {}, Rate: {:.2}/s}}",
            self.elapsed().as_secs_f64(),
            remaining,
            self.percentage(),
            self.processed,
            self.total,
            self.total_records,
            self.failed_records,
            self.rate(self.total_records),
            self.total_request,
            self.failed_request,
            self.avg_latency(),
            self.avg_resp_time(),
            self.rate(self.total_request),
            self.total_processed,
            self.failed_processed,
            self.rate(self.total_processed),
        )
    }
}
