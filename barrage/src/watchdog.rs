use crate::barrier::CompletionBarrier;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// A run that stopped resolving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stall {
    /// Requests that never resolved.
    pub remaining: u64,
    /// Time from the start of the watch until the stall was declared.
    pub detected_after: Duration,
}

/// Declares the run stalled when, after its nominal duration, two consecutive samples of the
/// completion barrier are identical.
pub(crate) struct ProgressWatchdog {
    barrier: Arc<CompletionBarrier>,
    grace: Duration,
    check_interval: Duration,
}

impl ProgressWatchdog {
    pub fn new(barrier: Arc<CompletionBarrier>, grace: Duration, check_interval: Duration) -> Self {
        Self {
            barrier,
            grace,
            check_interval,
        }
    }

    /// Resolves with the stall, or `None` once every request has resolved.
    pub async fn watch(self) -> Option<Stall> {
        let start = Instant::now();
        tokio::time::sleep(self.grace).await;

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut previous = None;
        loop {
            ticker.tick().await;
            let remaining = self.barrier.remaining();
            if remaining == 0 {
                return None;
            }

            if previous == Some(remaining) {
                warn!(
                    "No request resolved in the last {}; {remaining} still outstanding. The target \
                     is unresponsive or connections are exhausted.",
                    humantime::format_duration(self.check_interval),
                );
                return Some(Stall {
                    remaining,
                    detected_after: start.elapsed(),
                });
            }

            trace!("Watchdog sample: {remaining} outstanding");
            previous = Some(remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn frozen_barrier_is_a_stall() {
        let barrier = Arc::new(CompletionBarrier::new(10));
        let watchdog = ProgressWatchdog::new(
            barrier,
            Duration::from_secs(2),
            Duration::from_millis(500),
        );

        let stall = watchdog.watch().await.unwrap();
        assert_eq!(stall.remaining, 10);
        assert!(stall.detected_after >= Duration::from_millis(2_500));
        assert!(stall.detected_after <= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn progressing_run_is_left_alone() {
        let barrier = Arc::new(CompletionBarrier::new(20));
        let progress = {
            let barrier = barrier.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    barrier.count_down();
                }
            })
        };

        let watchdog = ProgressWatchdog::new(
            barrier.clone(),
            Duration::from_secs(1),
            Duration::from_millis(500),
        );
        assert_eq!(watchdog.watch().await, None);
        assert!(barrier.is_done());
        progress.await.unwrap();
    }
}
