use std::fmt;
use std::time::Duration;

/// Result classification of a single dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Carries the concrete failure category, e.g. `connection-refused` or `read-timeout`.
    Failure(String),
}

/// Produced exactly once per dispatched request by the task that executed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub latency: Duration,
    pub outcome: Outcome,
}

impl RequestOutcome {
    pub fn success(latency: Duration) -> Self {
        Self {
            latency,
            outcome: Outcome::Success,
        }
    }

    pub fn failure(latency: Duration, kind: impl Into<String>) -> Self {
        Self {
            latency,
            outcome: Outcome::Failure(kind.into()),
        }
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Success => write!(f, "success in {:?}", self.latency),
            Outcome::Failure(kind) => write!(f, "{kind} after {:?}", self.latency),
        }
    }
}
