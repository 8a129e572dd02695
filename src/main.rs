use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use turnstile::config::{StoreBackend, TurnstileConfig};
use turnstile::http::HttpServer;
use turnstile::ratelimit::{QuotaTable, RateLimiter};
use turnstile::store::{CounterStore, InMemoryStore, RedisStore};

/// Fixed-window quota service.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to serve HTTP on
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Path to the YAML quota table
    #[arg(long)]
    quotas: Option<PathBuf>,

    /// Counter store backend
    #[arg(long, value_enum)]
    store: Option<StoreBackend>,

    /// Redis connection URL
    #[arg(long)]
    redis_url: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting Turnstile quota service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = TurnstileConfig::load(cli.config.as_deref())?;
    if let Some(addr) = cli.listen {
        config.server.http_addr = addr;
    }
    if let Some(path) = cli.quotas {
        config.quotas.path = path;
    }
    if let Some(backend) = cli.store {
        config.store.backend = backend;
    }
    if let Some(url) = cli.redis_url {
        config.store.redis_url = url;
    }
    info!(
        http_addr = %config.server.http_addr,
        store = ?config.store.backend,
        "Configuration loaded"
    );

    let quotas = QuotaTable::from_file(&config.quotas.path)?;

    match config.store.backend {
        StoreBackend::Redis => {
            let store = RedisStore::connect(&config.store.redis_url).await?;
            serve(config.server.http_addr, quotas, store).await?;
        }
        StoreBackend::Memory => {
            serve(config.server.http_addr, quotas, InMemoryStore::new()).await?;
        }
    }

    info!("Turnstile quota service stopped");
    Ok(())
}

async fn serve<S: CounterStore + 'static>(
    addr: SocketAddr,
    quotas: QuotaTable,
    store: S,
) -> anyhow::Result<()> {
    let rate_limiter = Arc::new(RateLimiter::new(quotas, store));
    info!("Rate limiter initialized");

    // Run the server with graceful shutdown on Ctrl+C
    HttpServer::new(addr, rate_limiter)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
