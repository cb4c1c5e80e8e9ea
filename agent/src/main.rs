//! API health monitor entry point

use api_health_agent::cli::check::CheckTarget;
use api_health_agent::cli::{Cli, Commands};
use api_health_agent::scheduler::{Cadence, RoundKind, Scheduler};
use api_health_agent::{logging, Monitor};
use api_health_common::config::MonitorConfig;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init().expect("failed to initialize logging");

    let config = match MonitorConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        config = %cli.config.display(),
        services = config.services.len(),
        ssl_domains = config.ssl.domains.len(),
        "Configuration loaded"
    );

    let monitor = match Monitor::from_config(config) {
        Ok(monitor) => Arc::new(monitor),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Check(args)) => {
            if !run_check(&monitor, args.target).await {
                std::process::exit(1);
            }
        }
        Some(Commands::Run) | None => {
            if let Err(e) = run_agent(monitor).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// 1回だけラウンドを実行し、全て正常ならtrue
async fn run_check(monitor: &Monitor, target: CheckTarget) -> bool {
    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let mut healthy = true;
    for kind in target.rounds() {
        let summary = monitor.run_round(*kind, &shutdown).await;
        for outcome in &summary.outcomes {
            if !outcome.is_healthy() {
                error!(round = %kind, target = outcome.target(), "Check failed");
            }
        }
        healthy &= !summary.has_failures();
    }
    healthy
}

/// スケジューラを起動してシャットダウンまで実行
async fn run_agent(monitor: Arc<Monitor>) -> Result<(), api_health_common::error::ConfigError> {
    let settings = &monitor.config().settings;
    let inspection = monitor.config().inspection_cadence()?;
    info!(
        check_interval_secs = settings.check_interval,
        inspection_interval = %settings.inspection_interval,
        "Monitor started"
    );

    let scheduler = Scheduler::new()
        .every(RoundKind::ApiHealth, Cadence::Every(settings.check_interval()))
        .every(RoundKind::SslInspection, inspection);

    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::channel(8);
    let tickers = scheduler.spawn(tx, shutdown.clone());
    let dispatcher = tokio::spawn(Arc::clone(&monitor).run(rx, shutdown.clone()));

    shutdown_signal(shutdown.clone()).await;
    shutdown.cancel();

    for ticker in tickers {
        if let Err(e) = ticker.await {
            error!("Scheduler task join error: {}", e);
        }
    }
    if let Err(e) = dispatcher.await {
        error!("Monitor task join error: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// シャットダウンシグナルを待機
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
