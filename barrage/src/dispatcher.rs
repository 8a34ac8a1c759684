use crate::admission::{Admission, AdmissionController};
use crate::limiter::RateLimiter;
use crate::transaction::{execute_request, RequestContext};
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::AcquireError;
use tokio_util::task::TaskTracker;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Pacing loop: takes a token, takes an admission permit, then spawns the request and moves on
/// without waiting for it.
pub(crate) struct Dispatcher<T> {
    ctx: Arc<RequestContext<T>>,
    limiter: RateLimiter,
    admission: AdmissionController,
    tasks: TaskTracker,
    total: u64,
}

impl<T: Transport> Dispatcher<T> {
    /// Request tasks are spawned on `tasks` so the run can wait for them once it is over.
    pub fn new(
        ctx: Arc<RequestContext<T>>,
        limiter: RateLimiter,
        admission: AdmissionController,
        tasks: TaskTracker,
        total: u64,
    ) -> Self {
        Self {
            ctx,
            limiter,
            admission,
            tasks,
            total,
        }
    }

    /// Returns the number of requests dispatched: `total`, or fewer if the run was cancelled.
    pub async fn run(self) -> Result<u64, AcquireError> {
        let mut saturated = false;

        for i in 0..self.total {
            let admitted = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => None,
                admission = self.admit(&mut saturated) => Some(admission?),
            };
            let Some(permit) = admitted else {
                debug!("Dispatch cancelled after {i} of {} requests", self.total);
                return Ok(i);
            };

            self.ctx.metrics.mark_started();
            #[cfg(feature = "metrics")]
            metrics::counter!(crate::transaction::STARTED_COUNTER).increment(1);

            self.tasks.spawn(execute_request(i, self.ctx.clone(), permit));

            let sent = i + 1;
            if let Some(percent) = crossed_decile(sent, self.total) {
                info!("Dispatched {sent} of {} ({percent}%)", self.total);
            }
        }

        trace!("Dispatched all {} requests", self.total);
        Ok(self.total)
    }

    async fn admit(&self, saturated: &mut bool) -> Result<Admission, AcquireError> {
        self.limiter.acquire().await;

        if self.admission.available() == 0 {
            if !*saturated {
                info!(
                    "All {} connections in use; waiting for a response before dispatching more.",
                    self.admission.max()
                );
                *saturated = true;
            }
        } else {
            *saturated = false;
        }
        self.admission.acquire().await
    }
}

/// The percentage reached when `done` of `total` crosses into a new tenth, if it did.
pub(crate) fn crossed_decile(done: u64, total: u64) -> Option<u64> {
    if done == 0 || done > total {
        return None;
    }
    let decile = |n: u64| u128::from(n) * 10 / u128::from(total);
    let current = decile(done);
    (current > decile(done - 1)).then_some(current as u64 * 10)
}
