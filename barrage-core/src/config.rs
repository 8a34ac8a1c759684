use crate::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_DURATION, DEFAULT_MAX_CONNECTIONS, DEFAULT_PRINT_INTERVAL,
    DEFAULT_RATE, DEFAULT_RUN_NAME, DEFAULT_TIMEOUT,
};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid target URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Target URL scheme must be http or https, found `{0}`")]
    UnsupportedScheme(String),

    #[error("maxconnections must be at least 1; 0 would block the first admission forever")]
    ZeroConnections,

    #[error("timeout must be greater than 0ms")]
    ZeroTimeout,

    #[error("rate * duration overflows the request counter")]
    TooManyRequests,
}

/// Whether a completed exchange with a non-2xx status counts as a failure.
///
/// Transport faults are always failures. By default any response that arrives is a success,
/// regardless of its status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    #[default]
    AnyResponse,
    RequireSuccess,
}

/// Immutable description of a single load-generation run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub name: String,
    pub url: Url,
    pub rate: u32,
    pub duration: Duration,
    pub max_connections: usize,
    pub timeout: Duration,
    pub print_interval: Option<Duration>,
    pub check_interval: Option<Duration>,
    pub status_policy: StatusPolicy,
}

impl RunConfig {
    pub fn new(name: &str, url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.to_string(),
            url: parse_url(url)?,
            rate: DEFAULT_RATE,
            duration: DEFAULT_DURATION,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            timeout: DEFAULT_TIMEOUT,
            print_interval: Some(DEFAULT_PRINT_INTERVAL),
            check_interval: Some(DEFAULT_CHECK_INTERVAL),
            status_policy: StatusPolicy::default(),
        })
    }

    pub fn with_default_name(url: &str) -> Result<Self, ConfigError> {
        Self::new(DEFAULT_RUN_NAME, url)
    }

    pub fn rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `Duration::ZERO` disables the periodic statistics line.
    pub fn print_interval(mut self, interval: Duration) -> Self {
        self.print_interval = non_zero(interval);
        self
    }

    /// `Duration::ZERO` disables the stall watchdog.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = non_zero(interval);
        self
    }

    pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    /// Rejects configurations that would hang or could never issue a request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.checked_total_requests()
            .ok_or(ConfigError::TooManyRequests)?;
        Ok(())
    }

    /// Number of requests the run dispatches: `rate * whole seconds of duration`.
    pub fn total_requests(&self) -> u64 {
        self.checked_total_requests().unwrap_or(u64::MAX)
    }

    fn checked_total_requests(&self) -> Option<u64> {
        (self.rate as u64).checked_mul(self.duration.as_secs())
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name: {} url: {} rate: {} duration: {} maxconnections: {}, timeout: {}",
            self.name,
            self.url,
            self.rate,
            humantime::format_duration(self.duration),
            self.max_connections,
            humantime::format_duration(self.timeout),
        )
    }
}

fn parse_url(url: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(url).map_err(|err| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

fn non_zero(interval: Duration) -> Option<Duration> {
    if interval.is_zero() {
        None
    } else {
        Some(interval)
    }
}
