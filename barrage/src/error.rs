use barrage_core::ConfigError;
use hdrhistogram::CreationError;
use thiserror::Error;
use tokio::sync::AcquireError;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create latency histogram: {0}")]
    Histogram(#[from] CreationError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Admission control closed before every request was dispatched")]
    AdmissionClosed(#[from] AcquireError),

    #[error("Dispatcher task failed: {0}")]
    Dispatcher(#[from] JoinError),
}
