//! Per-route request statistics.
//!
//! Samples are keyed by (method, pattern) and recorded on the response tail.
//! Recording must never affect latency: the map is guarded by a `try_lock`,
//! and a contended lock simply drops the sample.

use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone)]
struct Entry {
    requests: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

/// One row of the statistics snapshot.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UrlStat {
    /// Request method.
    pub method: String,
    /// Matched pattern, or the raw path for unmatched requests.
    pub pattern: String,
    /// Number of recorded requests.
    pub requests: u64,
    /// Total time spent, in microseconds.
    pub total_us: u128,
    /// Fastest recorded request, in microseconds.
    pub min_us: u128,
    /// Slowest recorded request, in microseconds.
    pub max_us: u128,
    /// Mean request time, in microseconds.
    pub avg_us: u128,
}

/// Aggregated per-route timings.
#[derive(Debug, Default)]
pub struct UrlStats {
    inner: Mutex<IndexMap<(String, String), Entry>>,
}

impl UrlStats {
    /// Creates an empty statistics map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one sample. Best-effort: returns silently when the map is
    /// contended.
    pub fn record(&self, method: &str, pattern: &str, elapsed: Duration) {
        let Some(mut map) = self.inner.try_lock() else {
            return;
        };
        let entry = map
            .entry((method.to_string(), pattern.to_string()))
            .or_insert(Entry {
                requests: 0,
                total: Duration::ZERO,
                min: Duration::MAX,
                max: Duration::ZERO,
            });
        entry.requests += 1;
        entry.total += elapsed;
        entry.min = entry.min.min(elapsed);
        entry.max = entry.max.max(elapsed);
    }

    /// Snapshot of all rows, in first-seen order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<UrlStat> {
        self.inner
            .lock()
            .iter()
            .map(|((method, pattern), entry)| UrlStat {
                method: method.clone(),
                pattern: pattern.clone(),
                requests: entry.requests,
                total_us: entry.total.as_micros(),
                min_us: entry.min.as_micros(),
                max_us: entry.max.as_micros(),
                avg_us: entry.total.as_micros() / u128::from(entry.requests),
            })
            .collect()
    }
}
