use barrage_core::RateSummary;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

const TICK_INTERVAL: Duration = Duration::from_secs(5);
const ONE_MINUTE: Duration = Duration::from_secs(60);

/// Event counter with a mean rate and a one-minute exponentially weighted rate.
///
/// Marking is a single relaxed `fetch_add`; the weighted rate is brought up to date lazily by
/// readers.
pub(crate) struct Meter {
    count: AtomicU64,
    first_mark: OnceLock<Instant>,
    ewma: Mutex<Ewma>,
}

impl Meter {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            first_mark: OnceLock::new(),
            ewma: Mutex::new(Ewma::new(ONE_MINUTE)),
        }
    }

    pub fn mark(&self) {
        self.first_mark.get_or_init(Instant::now);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean_rate(&self) -> f64 {
        self.mean_rate_at(Instant::now())
    }

    fn mean_rate_at(&self, now: Instant) -> f64 {
        let Some(first) = self.first_mark.get() else {
            return 0.;
        };
        let elapsed = now.saturating_duration_since(*first).as_secs_f64();
        if elapsed > 0. {
            self.count() as f64 / elapsed
        } else {
            0.
        }
    }

    pub fn one_minute_rate(&self) -> f64 {
        let Some(first) = self.first_mark.get() else {
            return 0.;
        };
        let mut ewma = self.ewma.lock().unwrap_or_else(PoisonError::into_inner);
        ewma.catch_up(*first, Instant::now(), self.count());
        ewma.rate
    }

    pub fn summary(&self) -> RateSummary {
        RateSummary {
            count: self.count(),
            mean_rate: self.mean_rate(),
            one_minute_rate: self.one_minute_rate(),
        }
    }
}

struct Ewma {
    alpha: f64,
    rate: f64,
    initialized: bool,
    last_tick: Option<Instant>,
    last_count: u64,
}

impl Ewma {
    fn new(window: Duration) -> Self {
        let alpha = 1. - (-TICK_INTERVAL.as_secs_f64() / window.as_secs_f64()).exp();
        Self {
            alpha,
            rate: 0.,
            initialized: false,
            last_tick: None,
            last_count: 0,
        }
    }

    /// Applies every tick elapsed since the last one. Events seen since then count towards the
    /// first of those ticks; later ones decay the rate.
    fn catch_up(&mut self, first_mark: Instant, now: Instant, count: u64) {
        let last_tick = *self.last_tick.get_or_insert(first_mark);
        let ticks = now.saturating_duration_since(last_tick).as_nanos() / TICK_INTERVAL.as_nanos();

        for tick in 0..ticks {
            let events = if tick == 0 {
                count.saturating_sub(self.last_count)
            } else {
                0
            };
            self.tick(events as f64 / TICK_INTERVAL.as_secs_f64());
        }

        if ticks > 0 {
            self.last_count = count;
            self.last_tick = Some(last_tick + TICK_INTERVAL * ticks as u32);
        }
    }

    fn tick(&mut self, instant_rate: f64) {
        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }
}
