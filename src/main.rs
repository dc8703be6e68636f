//! Account service.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────────┐
//!                  │                     ACCOUNT SERVICE                      │
//!                  │                                                          │
//!   HTTP request   │  ┌──────────┐   ┌────────────┐                           │
//!   ───────────────┼─▶│ api/http │──▶│            │   ┌─────────┐  ┌────────┐ │
//!                  │  └──────────┘   │ rate limit │──▶│ logging │─▶│service │ │
//!   RPC frame      │  ┌──────────┐   │  (shared)  │   └─────────┘  └───┬────┘ │
//!   ───────────────┼─▶│ api/rpc  │──▶│            │                    │      │
//!                  │  └──────────┘   └────────────┘                    ▼      │
//!                  │                                              ┌─────────┐ │
//!   response ◀─────┼──── render ◀── error model ◀─────────────────│ storage │ │
//!                  │                                              └─────────┘ │
//!                  └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use account_service::api::{HttpServer, LoggingMiddleware, RpcServer};
use account_service::config::{load_config, validate_config, ConfigError, ServiceConfig};
use account_service::domain::{Service, SharedService};
use account_service::lifecycle::{wait_for_shutdown_signal, Shutdown};
use account_service::observability::{logging, metrics};
use account_service::resilience::RateLimiter;
use account_service::storage::MemoryStore;

#[derive(Parser)]
#[command(name = "account-service")]
#[command(about = "Account management API over HTTP and RPC", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP API address.
    #[arg(long)]
    http: Option<String>,

    /// RPC API address.
    #[arg(long)]
    rpc: Option<String>,

    /// API requests limit per second.
    #[arg(long)]
    qps: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(http) = cli.http {
        config.listener.http_address = http;
    }
    if let Some(rpc) = cli.rpc {
        config.listener.rpc_address = rpc;
    }
    if let Some(qps) = cli.qps {
        config.rate_limit.requests_per_second = qps;
        config.rate_limit.burst_size = qps;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    tracing::info!("account-service v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        http_address = %config.listener.http_address,
        rpc_address = %config.listener.rpc_address,
        requests_per_second = config.rate_limit.requests_per_second,
        burst_size = config.rate_limit.burst_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(MemoryStore::new());
    let service = Service::new(store).with_storage_timeout(config.timeouts.storage());
    let service: SharedService = Arc::new(LoggingMiddleware::new(service));
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));

    let http_listener = TcpListener::bind(&config.listener.http_address).await?;
    let rpc_listener = TcpListener::bind(&config.listener.rpc_address).await?;

    let shutdown = Shutdown::new();
    let http = HttpServer::new(service.clone(), limiter.clone(), config.timeouts.request());
    let rpc = RpcServer::new(service, limiter).with_idle_timeout(config.timeouts.idle());

    // Either server stopping takes the other one down with it.
    let http_task = {
        let serving = http.run(http_listener, shutdown.signalled());
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let result = serving.await;
            shutdown.trigger();
            result
        })
    };
    let rpc_task = {
        let serving = rpc.run(rpc_listener, shutdown.subscribe());
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let result = serving.await;
            shutdown.trigger();
            result
        })
    };

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_shutdown.trigger();
    });

    let (http_result, rpc_result) = tokio::join!(http_task, rpc_task);
    http_result??;
    rpc_result??;

    tracing::info!("Shutdown complete");
    Ok(())
}
