//! consul-hosts Entry Point

use clap::Parser;
use consul_hosts::catalog::HttpCatalogClient;
use consul_hosts::cli::Cli;
use consul_hosts::poll::PollScheduler;
use consul_hosts::registry::ServiceRegistry;
use consul_hosts::shutdown::ShutdownController;
use consul_hosts::{api, cache::ResultCache, logging, AppState};
use consul_hosts_common::config::HostsConfig;
use consul_hosts_common::error::{HostsError, HostsResult};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> HostsResult<()> {
    info!("consul-hosts v{}", env!("CARGO_PKG_VERSION"));

    let mut config = HostsConfig::load(&cli.config)?;
    cli.apply_overrides(&mut config)?;

    // consulはTLSか
    if config.catalog_tls {
        info!("Fetching from consul over TLS.");
    }

    let client = Arc::new(HttpCatalogClient::new(&config)?);
    let catalog = config.catalog();

    // 監視対象を確定（失敗したら起動しない）
    let mut registry = ServiceRegistry::from_selection(&config.services)?;
    let names = registry.resolve(client.as_ref(), &catalog).await?.to_vec();
    let stagger = registry.stagger_window(config.spread());

    let cache = ResultCache::new();
    let shutdown = ShutdownController::default();
    let scheduler = PollScheduler::new(client, cache.clone())
        .with_interval(config.interval())
        .with_stagger(stagger)
        .with_shutdown(shutdown.clone());
    let handles = scheduler.watch_all(&names, &catalog).await;

    let app = api::create_router(AppState::new(cache));
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| HostsError::Internal(format!("Failed to bind to {}: {}", bind_addr, e)))?;

    info!("Server started on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .map_err(|e| HostsError::Internal(format!("Server error: {}", e)))?;

    // サーバー終了後はタイマーも止める
    shutdown.request_shutdown();
    for handle in &handles {
        if !handle.is_finished() {
            handle.abort();
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// シャットダウンシグナルを待機
async fn shutdown_signal(shutdown: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
        _ = shutdown.wait() => {
            info!("Shutdown requested, shutting down...");
        }
    }
}
