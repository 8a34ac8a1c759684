use crate::barrier::CompletionBarrier;
use crate::measurement::{MetricsStore, RateCounters};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Emits a progress line every `interval` until the barrier reaches zero. Reads only the rate
/// counters and the error tally, never the histogram.
pub(crate) async fn report_progress(
    name: String,
    metrics: Arc<MetricsStore>,
    barrier: Arc<CompletionBarrier>,
    interval: Duration,
) {
    while !barrier.wait_timeout(interval).await {
        let rates = metrics.rates();
        if rates.errored.count > 0 {
            info!(
                "{}",
                progress_line(&name, &rates, Some(&metrics.error_tally()))
            );
        } else {
            info!("{}", progress_line(&name, &rates, None));
        }
    }
}

fn progress_line(
    name: &str,
    rates: &RateCounters,
    errors: Option<&BTreeMap<String, u64>>,
) -> String {
    let mut line = format!(
        "{name} STATS: req: {} {:.2}Hz (1m {:.2}Hz) resp: {} {:.2}Hz (1m {:.2}Hz) err: {} open: {}",
        rates.started.count,
        rates.started.mean_rate,
        rates.started.one_minute_rate,
        rates.completed.count,
        rates.completed.mean_rate,
        rates.completed.one_minute_rate,
        rates.errored.count,
        rates.in_flight(),
    );

    if let Some(errors) = errors {
        let kinds: Vec<_> = errors
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect();
        line.push_str(&format!(" [{}]", kinds.join(", ")));
    }
    line
}
