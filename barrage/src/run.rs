use crate::admission::AdmissionController;
use crate::barrier::CompletionBarrier;
use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::limiter::RateLimiter;
use crate::measurement::MetricsStore;
use crate::reporter::report_progress;
use crate::transaction::RequestContext;
use crate::transport::{HttpTransport, Transport};
use crate::watchdog::{ProgressWatchdog, Stall};
use barrage_core::{MetricsSnapshot, RunConfig, STALLED_EXIT_CODE};
use std::future::pending;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::task::TaskTracker;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every dispatched request resolved.
    Completed,
    /// The watchdog gave up waiting on outstanding requests.
    Stalled(Stall),
}

/// Outcome of a run. The metrics store is handed over so the caller can print and persist the
/// results, including after a stall.
#[derive(Debug)]
pub struct RunReport {
    pub name: String,
    pub status: RunStatus,
    pub metrics: Arc<MetricsStore>,
    pub total: u64,
    pub dispatched: u64,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn is_stalled(&self) -> bool {
        matches!(self.status, RunStatus::Stalled(_))
    }

    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Completed => 0,
            RunStatus::Stalled(_) => STALLED_EXIT_CODE,
        }
    }
}

/// Runs the configured load against the target over HTTP.
pub async fn run(config: &RunConfig) -> Result<RunReport, EngineError> {
    config.validate()?;
    let transport = Arc::new(HttpTransport::new(config)?);
    run_with_transport(config, transport).await
}

/// Sends a short burst of load first and discards its measurements, so connection setup does not
/// land in the measured run.
pub async fn warm_up<T: Transport>(
    config: &RunConfig,
    transport: Arc<T>,
    period: Duration,
) -> Result<RunStatus, EngineError> {
    let warmup = config
        .clone()
        .duration(period)
        .print_interval(Duration::ZERO);

    let report = run_with_transport(&warmup, transport)
        .instrument(tracing::info_span!("warmup"))
        .await?;
    info!(
        "Warmup finished: {} requests in {}",
        report.dispatched,
        humantime::format_duration(truncate_millis(report.elapsed))
    );
    Ok(report.status)
}

#[instrument(name = "run", skip_all, fields(name = %config.name))]
pub async fn run_with_transport<T: Transport>(
    config: &RunConfig,
    transport: Arc<T>,
) -> Result<RunReport, EngineError> {
    config.validate()?;

    let total = config.total_requests();
    let metrics = Arc::new(MetricsStore::new()?);
    let barrier = Arc::new(CompletionBarrier::new(total));
    let start = Instant::now();

    let rate = match NonZeroU32::new(config.rate) {
        Some(rate) if total > 0 => rate,
        _ => {
            info!("Nothing to send for {config}");
            return Ok(RunReport {
                name: config.name.clone(),
                status: RunStatus::Completed,
                metrics,
                total,
                dispatched: 0,
                elapsed: start.elapsed(),
            });
        }
    };

    info!("Starting {total} requests: {config}");

    let ctx = Arc::new(RequestContext::new(
        transport,
        metrics.clone(),
        barrier.clone(),
        config.status_policy,
    ));
    let cancel = ctx.cancel.clone();
    let tasks = TaskTracker::new();
    let limiter = RateLimiter::new(rate);
    debug!("Pacing at {rate}/s with bursts of up to {}", limiter.burst());
    let dispatcher = Dispatcher::new(
        ctx,
        limiter,
        AdmissionController::new(config.max_connections),
        tasks.clone(),
        total,
    );
    let dispatch = tokio::spawn(dispatcher.run().in_current_span());

    let reporter = config.print_interval.map(|interval| {
        tokio::spawn(
            report_progress(
                config.name.clone(),
                metrics.clone(),
                barrier.clone(),
                interval,
            )
            .in_current_span(),
        )
    });

    let watchdog = async {
        match config.check_interval {
            Some(interval) => {
                ProgressWatchdog::new(barrier.clone(), config.duration, interval)
                    .watch()
                    .await
            }
            None => pending().await,
        }
    };

    let status = tokio::select! {
        _ = barrier.wait() => RunStatus::Completed,
        Some(stall) = watchdog => RunStatus::Stalled(stall),
    };

    if let Some(reporter) = reporter {
        reporter.abort();
    }

    if let RunStatus::Stalled(stall) = status {
        error!(
            "Run stalled after {} with {} of {total} requests outstanding; cancelling them",
            humantime::format_duration(truncate_millis(stall.detected_after)),
            stall.remaining
        );
        cancel.cancel();
    }

    let dispatched = dispatch.await??;
    // Every request task has exited once this returns, so the metrics are final.
    tasks.close();
    tasks.wait().await;

    let elapsed = start.elapsed();
    info!(
        "Run finished in {}: {}",
        humantime::format_duration(truncate_millis(elapsed)),
        metrics.snapshot()
    );

    Ok(RunReport {
        name: config.name.clone(),
        status,
        metrics,
        total,
        dispatched,
        elapsed,
    })
}

fn truncate_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
