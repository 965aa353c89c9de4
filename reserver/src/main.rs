mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{Instrument, error, info, warn};

use common::logger::root_span;
use common::{LogCapture, TraceId, init_tracing};
use reserver::config::AppConfig;
use reserver::error::{ConfigError, RunError};
use reserver::model::ReservationResult;
use reserver::report::SlackNotifier;
use reserver::run::{RunOptions, run};

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let json = cli.json_logs || config.as_ref().is_ok_and(|c| c.json_logs);
    let log = init_tracing(json);

    let trace_id = TraceId::new();
    let success = execute(&cli, config, &log)
        .instrument(root_span("reservation", &trace_id))
        .await?;

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn execute(
    cli: &Cli,
    config: Result<AppConfig, ConfigError>,
    log: &LogCapture,
) -> anyhow::Result<bool> {
    let mut config = match config {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            report_startup_failure(RunError::Startup(e), log).await?;
            return Ok(false);
        }
    };
    cli.apply(&mut config);

    let notifier = SlackNotifier::new(config.slack_url.clone(), config.base_url.clone())
        .context("building the report client")?;

    info!(
        probe_mode = ?config.probe_mode,
        max_attempts = config.max_attempts,
        strategies = config.strategies.len(),
        report = notifier.enabled(),
        "configuration loaded"
    );

    let result = run(&config, RunOptions { immediate: cli.now }).await;

    if let Err(e) = notifier.send(&result, log).await {
        warn!(error = %e, "report delivery failed");
    }

    Ok(result.success)
}

/// Without a valid config only the raw webhook variable is trusted.
async fn report_startup_failure(err: RunError, log: &LogCapture) -> anyhow::Result<()> {
    let mut result = ReservationResult::default();
    result.fail(err.to_string());

    let webhook = std::env::var("SLACK_URL").ok().filter(|v| !v.trim().is_empty());
    let base_url = std::env::var("BASE_URL").unwrap_or_default();

    let notifier = SlackNotifier::new(webhook, base_url).context("building the report client")?;
    if let Err(e) = notifier.send(&result, log).await {
        warn!(error = %e, "report delivery failed");
    }
    Ok(())
}
