use barrage_core::BURST_WINDOW;
use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;

/// Token bucket pacing request admission to a fixed rate.
///
/// Unused capacity accumulates for at most [`BURST_WINDOW`] worth of requests, so a dispatcher
/// woken late by the timer catches up without ever bursting beyond that.
pub struct RateLimiter {
    limiter: DefaultDirectRateLimiter,
    rate: NonZeroU32,
}

impl RateLimiter {
    pub fn new(rate: NonZeroU32) -> Self {
        let quota = Quota::per_second(rate).allow_burst(burst_size(rate));
        Self {
            limiter: governor::RateLimiter::direct(quota),
            rate,
        }
    }

    /// Waits until the next token is available and takes it.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub fn burst(&self) -> NonZeroU32 {
        burst_size(self.rate)
    }
}

fn burst_size(rate: NonZeroU32) -> NonZeroU32 {
    let burst = (rate.get() as f64 * BURST_WINDOW.as_secs_f64()).floor() as u32;
    NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN)
}
