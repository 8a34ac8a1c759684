use anyhow::Context;
use barrage::cli::Cli;
use barrage::{run_with_transport, summary, warm_up, HttpTransport, RunConfig, RunStatus};
use clap::{CommandFactory, Parser};
#[cfg(feature = "metrics")]
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "barrage=info";

fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    FmtSubscriber::builder().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = match cli.run_config() {
        Ok(Some(config)) => config,
        Ok(None) => {
            let _ = Cli::command().print_help();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("error: {err}\n");
            let _ = Cli::command().print_help();
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(&cli, config)) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: &Cli, config: RunConfig) -> anyhow::Result<u8> {
    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.prometheus {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Serving Prometheus metrics on {addr}");
    }

    let transport = Arc::new(HttpTransport::new(&config).context("Failed to build HTTP client")?);

    if let Some(period) = cli.warmup() {
        if let RunStatus::Stalled(stall) = warm_up(&config, transport.clone(), period).await? {
            warn!(
                "Warmup stalled with {} requests outstanding; starting the measured run anyway",
                stall.remaining
            );
        }
    }

    let report = run_with_transport(&config, transport).await?;

    for line in summary::render(&report, cli.minmax) {
        println!("{line}");
    }
    if cli.stats {
        summary::write_stats_file(&report, Path::new("."))
            .with_context(|| format!("Failed to write {}.txt", report.name))?;
    }

    Ok(u8::try_from(report.exit_code()).unwrap_or(1))
}
