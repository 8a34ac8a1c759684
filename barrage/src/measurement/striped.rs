use barrage_core::{LatencySummary, HISTOGRAM_MAX_LATENCY, HISTOGRAM_SIGFIGS};
use hdrhistogram::{CreationError, Histogram};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::error;

static NEXT_STRIPE: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    // Stable per worker thread, so tasks polled on one worker keep hitting the same stripe.
    static STRIPE_HINT: usize = NEXT_STRIPE.fetch_add(1, Ordering::Relaxed);
}

/// A single timestamped latency observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyRecord {
    pub at: Instant,
    pub latency: Duration,
}

/// Latency histogram and bounded time series split into independently locked stripes.
///
/// Writers only touch the stripe owned by their thread. Readers merge copies of every stripe and
/// never modify them.
pub(crate) struct StripedLatencies {
    stripes: Box<[Mutex<Stripe>]>,
}

struct Stripe {
    histogram: Histogram<u64>,
    series: VecDeque<LatencyRecord>,
    capacity: usize,
}

impl StripedLatencies {
    pub fn new(stripes: usize, series_capacity: usize) -> Result<Self, CreationError> {
        let stripes = (0..stripes.max(1))
            .map(|_| Stripe::new(series_capacity).map(Mutex::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            stripes: stripes.into_boxed_slice(),
        })
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    pub fn record(&self, at: Instant, latency: Duration) {
        let idx = STRIPE_HINT.with(|hint| *hint) % self.stripes.len();
        self.record_in(idx, at, latency);
    }

    fn record_in(&self, idx: usize, at: Instant, latency: Duration) {
        let mut stripe = lock(&self.stripes[idx]);
        stripe.histogram.saturating_record(micros(latency));

        if stripe.capacity == 0 {
            return;
        }
        if stripe.series.len() == stripe.capacity {
            stripe.series.pop_front();
        }
        stripe.series.push_back(LatencyRecord { at, latency });
    }

    /// Histogram of every stripe combined.
    pub fn merged(&self) -> Histogram<u64> {
        let mut merged = lock(&self.stripes[0]).histogram.clone();
        for stripe in self.stripes.iter().skip(1) {
            if let Err(err) = merged.add(&lock(stripe).histogram) {
                error!("Unable to merge latency stripe: {err:?}");
            }
        }
        merged
    }

    pub fn summary(&self) -> LatencySummary {
        summarize(&self.merged())
    }

    /// Every retained record across all stripes, oldest first.
    pub fn records(&self) -> Vec<LatencyRecord> {
        let mut records: Vec<_> = self
            .stripes
            .iter()
            .flat_map(|stripe| lock(stripe).series.iter().copied().collect::<Vec<_>>())
            .collect();
        records.sort_by_key(|record| record.at);
        records
    }
}

impl Stripe {
    fn new(capacity: usize) -> Result<Self, CreationError> {
        Ok(Self {
            histogram: Histogram::new_with_bounds(
                1,
                micros(HISTOGRAM_MAX_LATENCY),
                HISTOGRAM_SIGFIGS,
            )?,
            series: VecDeque::with_capacity(capacity.min(4_096)),
            capacity,
        })
    }
}

pub(crate) fn summarize(histogram: &Histogram<u64>) -> LatencySummary {
    if histogram.is_empty() {
        return LatencySummary::empty();
    }

    LatencySummary {
        count: histogram.len(),
        min: Duration::from_micros(histogram.min()),
        mean: Duration::from_secs_f64(histogram.mean() / 1e6),
        stddev: Duration::from_secs_f64(histogram.stdev() / 1e6),
        max: Duration::from_micros(histogram.max()),
        percentiles: (0..=100)
            .map(|p| Duration::from_micros(histogram.value_at_quantile(p as f64 / 100.)))
            .collect(),
    }
}

fn micros(latency: Duration) -> u64 {
    u64::try_from(latency.as_micros()).unwrap_or(u64::MAX)
}

// Stripes only hold counters, so one left behind by a panicking writer is still usable.
fn lock(stripe: &Mutex<Stripe>) -> MutexGuard<'_, Stripe> {
    stripe.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn percentiles_are_within_bounded_error() {
        let latencies = StripedLatencies::new(8, 0).unwrap();
        let now = Instant::now();
        for value in 1..=1_000 {
            latencies.record_in(value as usize % 8, now, ms(value));
        }

        let summary = latencies.summary();
        assert_eq!(summary.count, 1_000);
        for (p, expected) in [(50, 500.), (90, 900.), (99, 990.)] {
            let actual = summary.percentile(p).as_secs_f64() * 1e3;
            assert!(
                (actual - expected).abs() / expected < 0.002,
                "p{p} = {actual}ms, expected {expected}ms"
            );
        }
        assert_eq!(summary.min, ms(1));
        assert!((summary.max.as_secs_f64() - 1.).abs() < 0.002);
    }

    #[test]
    fn merge_does_not_modify_stripes() {
        let latencies = StripedLatencies::new(4, 0).unwrap();
        let now = Instant::now();
        for value in 1..=100 {
            latencies.record_in(value as usize % 4, now, ms(value));
        }
        let first = latencies.summary();
        let second = latencies.summary();
        assert_eq!(first, second);
        assert_eq!(lock(&latencies.stripes[1]).histogram.len(), 25);
    }

    #[test]
    fn out_of_range_latency_is_clamped() {
        let latencies = StripedLatencies::new(1, 0).unwrap();
        latencies.record(Instant::now(), HISTOGRAM_MAX_LATENCY * 10);
        let summary = latencies.summary();
        assert_eq!(summary.count, 1);
        assert!(summary.max >= HISTOGRAM_MAX_LATENCY);
        assert!(summary.max < HISTOGRAM_MAX_LATENCY * 2);
    }

    #[test]
    fn series_evicts_oldest_when_full() {
        let latencies = StripedLatencies::new(1, 3).unwrap();
        let start = Instant::now();
        for i in 0..5u64 {
            latencies.record(start + ms(i), ms(i));
        }
        let records = latencies.records();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().map(|r| r.latency).collect::<Vec<_>>(),
            vec![ms(2), ms(3), ms(4)]
        );
    }

    #[test]
    fn records_are_merged_in_timestamp_order() {
        let latencies = StripedLatencies::new(3, 10).unwrap();
        let start = Instant::now();
        for i in (0..9u64).rev() {
            latencies.record_in(i as usize % 3, start + ms(i), ms(i));
        }
        let records = latencies.records();
        assert_eq!(records.len(), 9);
        assert!(records.windows(2).all(|pair| pair[0].at <= pair[1].at));
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let latencies = Arc::new(StripedLatencies::new(4, 100).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let latencies = latencies.clone();
                std::thread::spawn(move || {
                    for value in 1..=1_000 {
                        latencies.record(Instant::now(), ms(value));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = latencies.summary();
        assert_eq!(summary.count, 8_000);
        let p50 = summary.percentile(50).as_secs_f64() * 1e3;
        assert!((p50 - 500.).abs() / 500. < 0.002, "p50 = {p50}ms");
        // Each stripe keeps its last 100; how many stripes the 8 threads landed on varies.
        let retained = latencies.records().len();
        assert!((100..=400).contains(&retained), "retained {retained}");
    }

    #[test]
    fn empty_store_summarizes_to_zero() {
        let latencies = StripedLatencies::new(2, 10).unwrap();
        assert_eq!(latencies.summary(), LatencySummary::empty());
        assert!(latencies.records().is_empty());
    }
}
