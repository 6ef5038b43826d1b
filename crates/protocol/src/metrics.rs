use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct MetricsData {
    index_count: u64,
    index_duration_ms: u64,
    index_num_files: u64,
    rank_count: u64,
    rank_duration_ms: u64,
    rank_num_files: u64,
    rank_num_refreshed_files: u64,
    batch_count: u64,
    batch_duration_ms: u64,
    batch_num_files: u64,
}

/// Point-in-time view of the sink's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub index_count: u64,
    pub index_duration_ms: u64,
    pub index_num_files: u64,
    pub rank_count: u64,
    pub rank_duration_ms: u64,
    pub rank_num_files: u64,
    pub rank_num_refreshed_files: u64,
    pub batch_count: u64,
    pub batch_duration_ms: u64,
    pub batch_num_files: u64,
}

/// Aggregated engine counters, updated under an internal lock.
///
/// The sink is passed by reference into the recommender instead of living
/// in process-global state; the owner snapshots and optionally resets it.
#[derive(Debug, Default)]
pub struct MetricsSink {
    data: Mutex<MetricsData>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one index build.
    pub fn record_index(&self, duration: Duration, num_files: u64) {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.index_count += 1;
        data.index_duration_ms += duration.as_millis() as u64;
        data.index_num_files += num_files;
    }

    /// Record one file-ranking call.
    pub fn record_rank(&self, duration: Duration, num_files: u64, num_refreshed_files: u64) {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.rank_count += 1;
        data.rank_duration_ms += duration.as_millis() as u64;
        data.rank_num_files += num_files;
        data.rank_num_refreshed_files += num_refreshed_files;
    }

    /// Record one block-recommendation batch.
    pub fn record_batch(&self, duration: Duration, num_files: u64) {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.batch_count += 1;
        data.batch_duration_ms += duration.as_millis() as u64;
        data.batch_num_files += num_files;
    }

    /// Read the counters, optionally resetting them to zero.
    pub fn snapshot(&self, reset: bool) -> MetricsSnapshot {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let out = MetricsSnapshot {
            index_count: data.index_count,
            index_duration_ms: data.index_duration_ms,
            index_num_files: data.index_num_files,
            rank_count: data.rank_count,
            rank_duration_ms: data.rank_duration_ms,
            rank_num_files: data.rank_num_files,
            rank_num_refreshed_files: data.rank_num_refreshed_files,
            batch_count: data.batch_count,
            batch_duration_ms: data.batch_duration_ms,
            batch_num_files: data.batch_num_files,
        };
        if reset {
            *data = MetricsData::default();
        }
        out
    }
}
