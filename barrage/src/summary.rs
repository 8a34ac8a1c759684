use crate::run::{RunReport, RunStatus};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Percentile printed on every run.
const HEADLINE_PERCENTILE: u8 = 90;

/// End-of-run lines for stdout: the error tally, the headline percentile and, with `minmax`, the
/// full distribution.
pub fn render(report: &RunReport, minmax: bool) -> Vec<String> {
    let name = &report.name;
    let mut lines: Vec<String> = report
        .metrics
        .error_tally()
        .into_iter()
        .map(|(kind, count)| format!("{name} {kind} {count}"))
        .collect();

    let latency = report.snapshot().latency;
    lines.push(format!(
        "{name} responseTime({HEADLINE_PERCENTILE}%): {:.2}ms",
        millis(latency.percentile(HEADLINE_PERCENTILE))
    ));

    if minmax {
        lines.push(format!(
            "{name} min: {:.2}ms mean: {:.2}ms stddev: {:.2}ms max: {:.2}ms",
            millis(latency.min),
            millis(latency.mean),
            millis(latency.stddev),
            millis(latency.max),
        ));
        lines.push(format!(
            "{name} p50: {:.2}ms p90: {:.2}ms p99: {:.2}ms",
            millis(latency.percentile(50)),
            millis(latency.percentile(90)),
            millis(latency.percentile(99)),
        ));
    }

    if let RunStatus::Stalled(stall) = report.status {
        lines.push(format!(
            "{name} stalled: {} of {} requests never resolved",
            stall.remaining, report.total
        ));
    }
    lines
}

/// Writes `<name>.txt` under `dir` and returns its path.
pub fn write_stats_file(report: &RunReport, dir: &Path) -> io::Result<PathBuf> {
    let path = dir.join(format!("{}.txt", report.name));
    let mut out = BufWriter::new(File::create(&path)?);
    write_stats(report, &mut out)?;
    out.flush()?;

    info!("Statistics written to {}", path.display());
    Ok(path)
}

fn write_stats(report: &RunReport, out: &mut impl Write) -> io::Result<()> {
    let name = &report.name;
    writeln!(out, "ErrorsCounter: {}", report.metrics.errored())?;

    // Records carry monotonic instants; anchor them to the wall clock once.
    let wall_now = SystemTime::now();
    let mono_now = Instant::now();
    for record in report.metrics.records() {
        let age = mono_now.saturating_duration_since(record.at);
        let at = wall_now.checked_sub(age).unwrap_or(SystemTime::UNIX_EPOCH);
        writeln!(
            out,
            "{} {name} responseTime {:.2}ms",
            humantime::format_rfc3339_millis(at),
            millis(record.latency)
        )?;
    }

    writeln!(out, "Histogram:")?;
    let latency = report.snapshot().latency;
    for (i, value) in latency.percentiles.iter().enumerate() {
        writeln!(out, "{name} responseTimeHistogram {i}% : {:.2}", millis(*value))?;
    }
    Ok(())
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.
}
