//! `run` command implementation.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{Cli, RunArgs};
use crate::error::CliError;
use crate::init_logging;
use crate::pipeline::Relay;

/// Execute the `run` command
pub async fn run_relay(cli: &Cli, args: &RunArgs) -> Result<()> {
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and validate configuration
    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    init_logging(cli, &config.log, config.app.mode)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        mode = ?config.app.mode,
        http = config.inputs.http.enabled,
        log_watcher = config.inputs.log.enabled,
        sinks = config.sinks.len(),
        "Penguin relay starting"
    );

    let mut relay = Relay::new(config.clone());
    if config.output.prometheus.enabled {
        let handle = observability::install_prometheus_recorder()?;
        relay = relay.with_metrics_handle(handle);
    }

    let shutdown = CancellationToken::new();
    let relay_task = relay.run(shutdown.clone());
    tokio::pin!(relay_task);

    // Run relay with shutdown signal
    let result = tokio::select! {
        result = &mut relay_task => result,
        _ = setup_shutdown_signal() => {
            warn!("Received shutdown signal, stopping relay...");
            shutdown.cancel();
            relay_task.await
        }
    };

    let stats = result.context("Relay execution failed")?;
    info!(
        messages = stats.messages_dispatched,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Relay stopped"
    );

    if !cli.quiet {
        stats.print_summary();
    }

    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
