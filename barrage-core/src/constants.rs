use std::time::Duration;

pub const DEFAULT_RUN_NAME: &str = "test";
pub const DEFAULT_RATE: u32 = 10;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONNECTIONS: usize = 150_000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_PRINT_INTERVAL: Duration = Duration::from_millis(1_000);
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10_000);

/// Worth of issuance the rate limiter may bank while the dispatcher is late. Keeps the paced
/// rate accurate above the timer resolution without permitting large bursts.
pub const BURST_WINDOW: Duration = Duration::from_millis(10);

/// Highest latency the histogram resolves individually; slower responses land in the top bucket.
pub const HISTOGRAM_MAX_LATENCY: Duration = Duration::from_secs(3_600);

/// Significant decimal digits kept by each latency bucket.
pub const HISTOGRAM_SIGFIGS: u8 = 3;

/// Timestamped latency records retained per shard before the oldest are evicted.
pub const SERIES_CAPACITY_PER_SHARD: usize = 30_000;

/// Exit status of a run the stall watchdog had to terminate.
pub const STALLED_EXIT_CODE: i32 = 3;
