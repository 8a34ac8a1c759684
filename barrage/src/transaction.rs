use crate::admission::Admission;
use crate::barrier::CompletionBarrier;
use crate::dispatcher::crossed_decile;
use crate::measurement::MetricsStore;
use crate::transport::Transport;
use barrage_core::{RequestOutcome, StatusPolicy};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[cfg(feature = "metrics")]
pub(crate) const STARTED_COUNTER: &str = "barrage_requests_started";
#[cfg(feature = "metrics")]
pub(crate) const SUCCESS_COUNTER: &str = "barrage_requests_success";
#[cfg(feature = "metrics")]
pub(crate) const ERROR_COUNTER: &str = "barrage_requests_error";
#[cfg(feature = "metrics")]
pub(crate) const LATENCY_HISTOGRAM: &str = "barrage_request_latency";

/// State shared by every request task of a run.
pub(crate) struct RequestContext<T> {
    pub transport: Arc<T>,
    pub metrics: Arc<MetricsStore>,
    pub barrier: Arc<CompletionBarrier>,
    pub status_policy: StatusPolicy,
    /// Cancelled when the run gives up; outstanding requests are dropped unrecorded.
    pub cancel: CancellationToken,
    total: u64,
    responded: AtomicU64,
}

impl<T> RequestContext<T> {
    pub fn new(
        transport: Arc<T>,
        metrics: Arc<MetricsStore>,
        barrier: Arc<CompletionBarrier>,
        status_policy: StatusPolicy,
    ) -> Self {
        Self {
            transport,
            metrics,
            total: barrier.remaining(),
            barrier,
            status_policy,
            cancel: CancellationToken::new(),
            responded: AtomicU64::new(0),
        }
    }

    fn log_response_progress(&self) {
        let responded = self.responded.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(percent) = crossed_decile(responded, self.total) {
            info!(
                "Responded {responded} of {} ({percent}%), mean request time {:.2}ms",
                self.total,
                self.metrics.mean_latency().as_secs_f64() * 1_000.
            );
        }
    }
}

/// Held for the lifetime of one request task; dropping it signals the barrier and returns the
/// admission permit, whichever way the task ends.
struct Resolution {
    barrier: Arc<CompletionBarrier>,
    admission: Option<Admission>,
}

impl Drop for Resolution {
    fn drop(&mut self) {
        // Permit first, so a finished barrier implies every permit is back.
        drop(self.admission.take());
        self.barrier.count_down();
    }
}

/// Issues one request, classifies how it ended and records it exactly once.
///
/// Faults inside the transport, panics included, become failure outcomes and never escape the
/// task.
pub(crate) async fn execute_request<T: Transport>(
    index: u64,
    ctx: Arc<RequestContext<T>>,
    admission: Admission,
) {
    let _resolution = Resolution {
        barrier: ctx.barrier.clone(),
        admission: Some(admission),
    };

    let start = Instant::now();
    let result = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            trace!("Request {index} cancelled");
            return;
        }
        result = AssertUnwindSafe(ctx.transport.execute()).catch_unwind() => result,
    };
    let latency = start.elapsed();

    let outcome = match result {
        Ok(Ok(status)) => classify_status(status, ctx.status_policy, latency),
        Ok(Err(err)) => RequestOutcome::failure(latency, err.kind()),
        Err(payload) => {
            error!("Request {index} panicked: {}", panic_message(&*payload));
            RequestOutcome::failure(latency, "panic")
        }
    };

    trace!("Request {index}: {outcome}");
    ctx.metrics.record(&outcome);
    ctx.log_response_progress();

    #[cfg(feature = "metrics")]
    emit_metrics(&outcome);
}

fn classify_status(
    status: u16,
    policy: StatusPolicy,
    latency: std::time::Duration,
) -> RequestOutcome {
    match policy {
        StatusPolicy::RequireSuccess if !(200..300).contains(&status) => {
            RequestOutcome::failure(latency, format!("status-{status}"))
        }
        _ => RequestOutcome::success(latency),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

#[cfg(feature = "metrics")]
fn emit_metrics(outcome: &RequestOutcome) {
    use barrage_core::Outcome;

    metrics::histogram!(LATENCY_HISTOGRAM).record(outcome.latency.as_secs_f64());
    match &outcome.outcome {
        Outcome::Success => metrics::counter!(SUCCESS_COUNTER).increment(1),
        Outcome::Failure(kind) => {
            metrics::counter!(ERROR_COUNTER, "kind" => kind.clone()).increment(1)
        }
    }
}
