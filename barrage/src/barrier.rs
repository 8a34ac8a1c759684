use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// One-way countdown from the number of dispatched requests to zero.
pub struct CompletionBarrier {
    remaining: AtomicU64,
    done: Notify,
}

impl CompletionBarrier {
    pub fn new(total: u64) -> Self {
        Self {
            remaining: AtomicU64::new(total),
            done: Notify::new(),
        }
    }

    /// Marks one request as resolved. Counting past zero is ignored.
    pub fn count_down(&self) {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        if previous == Ok(1) {
            self.done.notify_waiters();
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.done.notified();
            tokio::pin!(notified);
            // Register before checking so a countdown between the check and the await is seen.
            notified.as_mut().enable();

            if self.is_done() {
                return;
            }
            notified.await;
        }
    }

    /// Returns `true` if the barrier reached zero within `timeout`.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}
