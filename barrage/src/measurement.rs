mod meter;
mod striped;
mod tally;

use barrage_core::{
    MetricsSnapshot, Outcome, RateSummary, RequestOutcome, SERIES_CAPACITY_PER_SHARD,
};
use hdrhistogram::CreationError;
use meter::Meter;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use striped::StripedLatencies;
use tally::ErrorTally;

pub use striped::LatencyRecord;

/// Aggregates every request of one run: rate counters, latency histogram, latency time series
/// and error tally.
///
/// Built at the start of a run and read once it ends; nothing in here is process-global.
pub struct MetricsStore {
    started: Meter,
    completed: Meter,
    errored: Meter,
    latencies: StripedLatencies,
    errors: ErrorTally,
}

/// Live counters only, cheap enough for the periodic statistics line.
#[derive(Debug, Clone, Copy)]
pub struct RateCounters {
    pub started: RateSummary,
    pub completed: RateSummary,
    pub errored: RateSummary,
}

impl RateCounters {
    pub fn in_flight(&self) -> u64 {
        self.started
            .count
            .saturating_sub(self.completed.count)
            .saturating_sub(self.errored.count)
    }
}

impl MetricsStore {
    pub fn new() -> Result<Self, CreationError> {
        let stripes = std::thread::available_parallelism().map_or(4, |n| n.get() * 2);
        Self::with_stripes(stripes, SERIES_CAPACITY_PER_SHARD)
    }

    pub fn with_stripes(stripes: usize, series_capacity: usize) -> Result<Self, CreationError> {
        Ok(Self {
            started: Meter::new(),
            completed: Meter::new(),
            errored: Meter::new(),
            latencies: StripedLatencies::new(stripes, series_capacity)?,
            errors: ErrorTally::new(),
        })
    }

    pub fn mark_started(&self) {
        self.started.mark();
    }

    /// Records a resolved request. Must be called exactly once per started request.
    pub fn record(&self, outcome: &RequestOutcome) {
        self.latencies.record(Instant::now(), outcome.latency);

        match &outcome.outcome {
            Outcome::Success => self.completed.mark(),
            Outcome::Failure(kind) => {
                self.errors.increment(kind);
                self.errored.mark();
            }
        }
    }

    pub fn started(&self) -> u64 {
        self.started.count()
    }

    pub fn completed(&self) -> u64 {
        self.completed.count()
    }

    pub fn errored(&self) -> u64 {
        self.errored.count()
    }

    pub fn rates(&self) -> RateCounters {
        RateCounters {
            started: self.started.summary(),
            completed: self.completed.summary(),
            errored: self.errored.summary(),
        }
    }

    /// Merges every stripe. Repeated calls on a quiet store return identical snapshots.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let RateCounters {
            started,
            completed,
            errored,
        } = self.rates();

        MetricsSnapshot {
            started,
            completed,
            errored,
            latency: self.latencies.summary(),
        }
    }

    /// Mean of every recorded latency, merged across stripes.
    pub fn mean_latency(&self) -> Duration {
        let micros = self.latencies.merged().mean();
        if micros.is_finite() && micros > 0. {
            Duration::from_secs_f64(micros / 1_000_000.)
        } else {
            Duration::ZERO
        }
    }

    pub fn error_tally(&self) -> BTreeMap<String, u64> {
        self.errors.snapshot()
    }

    pub fn error_count(&self, kind: &str) -> u64 {
        self.errors.get(kind)
    }

    /// Retained latency records across all stripes, oldest first.
    pub fn records(&self) -> Vec<LatencyRecord> {
        self.latencies.records()
    }

    pub fn stripes(&self) -> usize {
        self.latencies.stripe_count()
    }
}

impl fmt::Debug for MetricsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsStore")
            .field("started", &self.started())
            .field("completed", &self.completed())
            .field("errored", &self.errored())
            .field("stripes", &self.stripes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn outcomes_update_counters_and_tally() {
        let store = MetricsStore::with_stripes(2, 16).unwrap();
        for _ in 0..3 {
            store.mark_started();
        }
        store.record(&RequestOutcome::success(Duration::from_millis(10)));
        store.record(&RequestOutcome::failure(
            Duration::from_millis(3),
            "connection-refused",
        ));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.started.count, 3);
        assert_eq!(snapshot.completed.count, 1);
        assert_eq!(snapshot.errored.count, 1);
        assert_eq!(snapshot.in_flight(), 1);
        assert_eq!(snapshot.latency.count, 2);
        assert_eq!(store.error_count("connection-refused"), 1);
        assert_eq!(store.records().len(), 2);
        let mean = store.mean_latency();
        assert!(mean >= Duration::from_micros(6_490) && mean <= Duration::from_micros(6_510));
    }

    #[test]
    fn empty_store_has_zero_mean_latency() {
        let store = MetricsStore::with_stripes(2, 16).unwrap();
        assert_eq!(store.mean_latency(), Duration::ZERO);
    }

    #[test]
    fn snapshot_is_reproducible() {
        let store = MetricsStore::with_stripes(4, 0).unwrap();
        for ms in 1..=200 {
            store.mark_started();
            store.record(&RequestOutcome::success(Duration::from_millis(ms)));
        }
        assert_eq!(store.snapshot().latency, store.snapshot().latency);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_failures_are_all_counted() {
        const TASKS: u64 = 5_000;
        let store = Arc::new(MetricsStore::new().unwrap());

        let handles: Vec<_> = (0..TASKS)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.mark_started();
                    store.record(&RequestOutcome::failure(
                        Duration::from_micros(i + 1),
                        "connection-refused",
                    ));
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.errored(), TASKS);
        assert_eq!(store.completed(), 0);
        assert_eq!(
            store.error_tally(),
            BTreeMap::from([("connection-refused".to_string(), TASKS)])
        );
        assert_eq!(store.snapshot().latency.count, TASKS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn sharded_histogram_matches_order_statistics() {
        let store = Arc::new(MetricsStore::with_stripes(8, 0).unwrap());
        let handles: Vec<_> = (1..=1_000u64)
            .map(|ms| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.record(&RequestOutcome::success(Duration::from_millis(ms)));
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let latency = store.snapshot().latency;
        for (p, expected) in [(50u8, 500.), (90, 900.), (99, 990.)] {
            let actual = latency.percentile(p).as_secs_f64() * 1e3;
            assert!((actual - expected).abs() / expected < 0.002, "p{p} = {actual}");
        }
    }
}
