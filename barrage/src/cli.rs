use barrage_core::{
    ConfigError, RunConfig, StatusPolicy, DEFAULT_CHECK_INTERVAL, DEFAULT_DURATION,
    DEFAULT_MAX_CONNECTIONS, DEFAULT_PRINT_INTERVAL, DEFAULT_RATE, DEFAULT_RUN_NAME,
    DEFAULT_TIMEOUT,
};
use clap::Parser;
#[cfg(feature = "metrics")]
use std::net::SocketAddr;
use std::time::Duration;

/// Open-loop HTTP load generator: sends GET requests to URL at a fixed rate, whether or not
/// earlier requests have answered.
#[derive(Parser, Debug)]
#[command(name = "barrage", version)]
pub struct Cli {
    /// Target URL (http or https). Without it, prints this help.
    pub url: Option<String>,

    /// Requests per second.
    #[arg(short, long, default_value_t = DEFAULT_RATE)]
    pub rate: u32,

    /// Run length in seconds.
    #[arg(short, long, default_value_t = DEFAULT_DURATION.as_secs())]
    pub duration: u64,

    /// Upper bound on requests in flight.
    #[arg(short, long = "maxconnections", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,

    /// Per-request timeout in milliseconds.
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT.as_millis() as u64)]
    pub timeout: u64,

    /// Statistics line interval in milliseconds, 0 disables it.
    #[arg(short, long, default_value_t = DEFAULT_PRINT_INTERVAL.as_millis() as u64)]
    pub print: u64,

    /// Stall check interval in milliseconds, 0 disables the watchdog.
    #[arg(short, long, default_value_t = DEFAULT_CHECK_INTERVAL.as_millis() as u64)]
    pub check: u64,

    /// Write per-request latencies and the percentile table to <NAME>.txt.
    #[arg(short, long)]
    pub stats: bool,

    /// Print min/mean/stddev/max and p50/p90/p99 at the end of the run.
    #[arg(long)]
    pub minmax: bool,

    /// Run name, used as the prefix of every output line.
    #[arg(short, long, default_value = DEFAULT_RUN_NAME)]
    pub name: String,

    /// Count responses with a non-2xx status as failures.
    #[arg(long)]
    pub fail_on_status: bool,

    /// Seconds of unmeasured load sent before the run.
    #[arg(long)]
    pub warmup: Option<u64>,

    /// Serve Prometheus metrics on this address while the run lasts.
    #[cfg(feature = "metrics")]
    #[arg(long)]
    pub prometheus: Option<SocketAddr>,
}

impl Cli {
    /// `Ok(None)` when no URL was given.
    pub fn run_config(&self) -> Result<Option<RunConfig>, ConfigError> {
        let Some(url) = &self.url else {
            return Ok(None);
        };

        let policy = if self.fail_on_status {
            StatusPolicy::RequireSuccess
        } else {
            StatusPolicy::AnyResponse
        };

        let config = RunConfig::new(&self.name, url)?
            .rate(self.rate)
            .duration(Duration::from_secs(self.duration))
            .max_connections(self.max_connections)
            .timeout(Duration::from_millis(self.timeout))
            .print_interval(Duration::from_millis(self.print))
            .check_interval(Duration::from_millis(self.check))
            .status_policy(policy);
        config.validate()?;
        Ok(Some(config))
    }

    pub fn warmup(&self) -> Option<Duration> {
        self.warmup
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
