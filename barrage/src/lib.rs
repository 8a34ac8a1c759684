//! Open-loop HTTP load generation.
//!
//! A run sends `rate * duration` GET requests to one URL. Requests leave on a fixed schedule
//! whether or not earlier ones have answered, bounded only by a cap on requests in flight. Every
//! request lands in a [`MetricsStore`]: throughput counters, a latency histogram and a tally of
//! failure kinds.
//!
//! ```ignore
//! use barrage::{run, RunConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RunConfig::new("smoke", "http://localhost:8080/")?
//!         .rate(200)
//!         .duration(Duration::from_secs(30));
//!
//!     let report = run(&config).await?;
//!     println!("{}", report.snapshot());
//!     Ok(())
//! }
//! ```

mod admission;
mod barrier;
pub mod cli;
mod dispatcher;
mod error;
mod limiter;
mod measurement;
mod reporter;
mod run;
pub mod summary;
mod transaction;
mod transport;
mod watchdog;

pub use admission::{Admission, AdmissionController};
pub use barrage_core::*;
pub use barrier::CompletionBarrier;
pub use error::EngineError;
pub use limiter::RateLimiter;
pub use measurement::{LatencyRecord, MetricsStore, RateCounters};
pub use run::{run, run_with_transport, warm_up, RunReport, RunStatus};
pub use transport::{HttpTransport, Transport, TransportError};
pub use watchdog::Stall;
