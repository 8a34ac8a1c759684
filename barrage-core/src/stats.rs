use std::fmt;
use std::time::Duration;

/// Count and throughput of one rate counter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSummary {
    pub count: u64,
    /// Events per second since the first event.
    pub mean_rate: f64,
    /// Exponentially weighted events per second over the last minute.
    pub one_minute_rate: f64,
}

/// Merged latency distribution of every recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub min: Duration,
    pub mean: Duration,
    pub stddev: Duration,
    pub max: Duration,
    /// Latency at each whole percentile, indexed `0..=100`.
    pub percentiles: Vec<Duration>,
}

impl LatencySummary {
    pub fn empty() -> Self {
        Self {
            count: 0,
            min: Duration::ZERO,
            mean: Duration::ZERO,
            stddev: Duration::ZERO,
            max: Duration::ZERO,
            percentiles: vec![Duration::ZERO; 101],
        }
    }

    /// Latency below which `percentile` percent of the recorded requests fall.
    pub fn percentile(&self, percentile: u8) -> Duration {
        let idx = usize::from(percentile.min(100));
        self.percentiles.get(idx).copied().unwrap_or_default()
    }
}

/// Read-only view of a run's metrics, derived on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub started: RateSummary,
    pub completed: RateSummary,
    pub errored: RateSummary,
    pub latency: LatencySummary,
}

impl MetricsSnapshot {
    /// Requests started but not yet resolved either way.
    pub fn in_flight(&self) -> u64 {
        self.started
            .count
            .saturating_sub(self.completed.count)
            .saturating_sub(self.errored.count)
    }

    pub fn resolved(&self) -> u64 {
        self.completed.count + self.errored.count
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "req: {} {:.2}Hz resp: {} {:.2}Hz err: {} open: {} p50={:?}, p90={:?}, p99={:?}",
            self.started.count,
            self.started.mean_rate,
            self.completed.count,
            self.completed.mean_rate,
            self.errored.count,
            self.in_flight(),
            self.latency.percentile(50),
            self.latency.percentile(90),
            self.latency.percentile(99),
        )
    }
}
