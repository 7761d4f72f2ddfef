//! OpenShield gateway server

use anyhow::{Context, Result};
use openshield_core::audit::{ApiKeyDirectory, AuditSink, MemoryAuditStore, PostgresStore};
use openshield_core::cache::{KvStore, MemoryStore, RedisStore};
use openshield_core::config::{load_from_yaml, watch_file, GatewayConfig};
use openshield_core::orchestrator::{Snapshot, SnapshotHandle};
use openshield_core::Orchestrator;
use openshield_gateway::middleware::build_limiter;
use openshield_gateway::{create_router, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "OPENSHIELD_CONFIG";
const DEFAULT_CONFIG: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,openshield=debug")),
        )
        .with_target(false)
        .compact()
        .init();

    let config_path = config_path();
    let config = load_from_yaml(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    info!(
        path = %config_path.display(),
        providers = config.providers.len(),
        rules = config.rules.input.len(),
        "Configuration loaded"
    );

    // Backends are process-wide; reloads only rebuild the snapshot
    let kv = kv_store(&config).await?;
    let (sink, api_keys) = stores(&config).await?;

    let snapshot = Snapshot::build(&config, Arc::clone(&kv)).context("failed to build providers")?;
    let snapshots = SnapshotHandle::new(snapshot);

    let reload = snapshots.clone();
    let reload_kv = Arc::clone(&kv);
    let _watcher = watch_file(&config_path, move |config| {
        match Snapshot::build(&config, Arc::clone(&reload_kv)) {
            Ok(snapshot) => reload.install(snapshot),
            Err(e) => error!(error = %e, "Keeping previous configuration"),
        }
    })
    .context("failed to watch configuration file")?;

    // Built once; the quota is not reloaded
    let limiter = build_limiter(&config.settings.rate_limit);
    match &limiter {
        Some(_) => info!(
            max = config.settings.rate_limit.max,
            window_secs = config.settings.rate_limit.window,
            "Rate limiting provider routes"
        ),
        None => warn!("Rate limiting disabled"),
    }
    let state =
        AppState::new(Orchestrator::new(snapshots, sink), api_keys).with_rate_limiter(limiter);
    if let Some(limiter) = state.rate_limiter.clone() {
        let window = Duration::from_secs(config.settings.rate_limit.window);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(window);
            loop {
                tick.tick().await;
                limiter.retain_recent();
            }
        });
    }
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.settings.network.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("OpenShield listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// First CLI argument, then `OPENSHIELD_CONFIG`, then `./config.yaml`
fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

async fn kv_store(config: &GatewayConfig) -> Result<Arc<dyn KvStore>> {
    match &config.settings.redis {
        Some(redis) => {
            let store = RedisStore::connect(redis.uri.expose_secret())
                .await
                .context("failed to connect to redis")?;
            info!("Using redis cache backend");
            Ok(Arc::new(store))
        }
        None => {
            info!("No redis configured, using in-process cache");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn stores(config: &GatewayConfig) -> Result<(Arc<dyn AuditSink>, Arc<dyn ApiKeyDirectory>)> {
    match &config.settings.database {
        Some(database) => {
            let store = Arc::new(
                PostgresStore::connect(database)
                    .await
                    .context("failed to connect to database")?,
            );
            info!("Using postgres audit store");
            let sink: Arc<dyn AuditSink> = store.clone();
            let api_keys: Arc<dyn ApiKeyDirectory> = store;
            Ok((sink, api_keys))
        }
        None => {
            warn!("No database configured: audit records stay in memory and no api key will authenticate");
            let store = Arc::new(MemoryAuditStore::new());
            let sink: Arc<dyn AuditSink> = store.clone();
            let api_keys: Arc<dyn ApiKeyDirectory> = store;
            Ok((sink, api_keys))
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, starting graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown..."),
    }
}
