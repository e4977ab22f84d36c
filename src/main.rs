//! chanrelay - chat channel ingestion relay.

use chanrelay::api::{self, ApiState, LoginRelay};
use chanrelay::config::Config;
use chanrelay::convert::EventConverter;
use chanrelay::db::{ChannelStore, Database};
use chanrelay::delivery::DeliveryPipeline;
use chanrelay::delivery::retry::RetryPolicy;
use chanrelay::handlers::{UpdateDispatcher, listen};
use chanrelay::platform::ChatClient;
use chanrelay::platform::bridge::BridgeClient;
use chanrelay::services::maintenance::{spawn_retention_prune, spawn_writer_sweep};
use chanrelay::services::{ChannelService, Reconciler};
use chanrelay::sink::http::HttpSink;
use chanrelay::state::SharedState;
use chanrelay::{http, metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often idle writers are swept.
const WRITER_SWEEP_PERIOD: Duration = Duration::from_secs(60);
/// How often expired channels are pruned.
const RETENTION_PRUNE_PERIOD: Duration = Duration::from_secs(3600);
/// Ceiling for the reconciliation retry backoff.
const RECONCILE_MAX_BACKOFF: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let loaded = Config::load(&config_path);

    // Initialize tracing: RUST_LOG, then the config filter, then "info".
    let fallback = loaded
        .as_ref()
        .map(|c| c.log.filter.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(true)
        .init();

    let mut config = loaded.map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;
    config.apply_env();
    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    let replica_index = config.replica.index()?;
    let replica_label = config.replica.label()?;
    info!(
        replica = %config.replica.name,
        index = replica_index,
        range = config.replica.range,
        "Starting chanrelay"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown requested");
            cancel.cancel();
        });
    }

    // Prometheus metrics are optional; port 0 disables the endpoint.
    metrics::init();
    if config.metrics.port == 0 {
        info!("Metrics endpoint disabled");
    } else {
        let port = config.metrics.port;
        let cancel = cancel.clone();
        tokio::spawn(async move {
            http::run_http_server(port, cancel).await;
        });
    }

    // Initialize database
    let db = Arc::new(Database::new(&config.database.path).await?);
    let store: Arc<dyn ChannelStore> = db.clone();

    // Chat platform bridge
    let bridge = BridgeClient::new(
        &config.platform.url,
        Duration::from_millis(config.platform.timeout_ms),
        config.platform.poll_timeout_secs,
    )?;
    let client: Arc<dyn ChatClient> = Arc::new(bridge.clone());

    // Control plane comes up first so the login code can be relayed.
    let login = Arc::new(LoginRelay::new());
    let api_state = Arc::new(ApiState {
        channels: ChannelService::new(client.clone(), store.clone()),
        login: login.clone(),
        request_timeout: config.api.request_timeout(),
        cancel: cancel.clone(),
    });
    let api_listener = tokio::net::TcpListener::bind(("0.0.0.0", config.api.port)).await?;
    let api_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = api::serve(api_listener, api_state, cancel).await {
                error!(error = %e, "Control plane server error");
            }
        })
    };

    if bridge.needs_login_code().await? {
        info!("Platform login pending, waiting for code on POST /v1/login");
        let code = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Shutdown before login completed");
                return Ok(());
            }
            code = login.wait() => code?,
        };
        bridge.submit_login_code(&code).await?;
        info!("Platform login completed");
    }

    // Event intake sink and the shared runtime registry
    let sink = Arc::new(HttpSink::new(
        &config.writer.url,
        Duration::from_millis(config.writer.timeout_ms),
    )?);
    let state = Arc::new(SharedState::new(
        sink,
        config.delivery.writer_cache_size,
        config.delivery.writer_ttl(),
    ));

    // Reconciliation loop
    let reconcile_task = {
        let reconciler = Reconciler::new(
            client.clone(),
            store.clone(),
            state.clone(),
            config.replica.name.clone(),
            replica_label,
            config.reconcile.list_limit,
        );
        let interval = config.reconcile.interval();
        let backoff = RetryPolicy::unbounded(
            Duration::from_millis(config.delivery.retry_initial_ms),
            RECONCILE_MAX_BACKOFF,
        );
        let cancel = cancel.clone();
        tokio::spawn(async move { reconciler.run(interval, backoff, cancel).await })
    };

    spawn_writer_sweep(state.clone(), WRITER_SWEEP_PERIOD, cancel.clone());
    info!("Writer sweep task started");

    match config.database.retention() {
        Some(retention) => {
            spawn_retention_prune(store.clone(), retention, RETENTION_PRUNE_PERIOD, cancel.clone());
            info!(hours = config.database.retention_hours, "Retention pruning task started");
        }
        None => info!("Retention pruning disabled"),
    }

    // Update listener runs in the foreground.
    let pipeline = DeliveryPipeline::new(
        EventConverter::new(replica_index),
        state.clone(),
        RetryPolicy::bounded(
            Duration::from_millis(config.delivery.retry_initial_ms),
            Duration::from_millis(config.delivery.retry_max_elapsed_ms),
        ),
        cancel.clone(),
    );
    let dispatcher = UpdateDispatcher::new(Arc::new(pipeline));
    let handled = listen(&dispatcher, client.updates(), cancel.clone()).await;
    info!(handled, "Update listener stopped");

    cancel.cancel();
    if let Err(e) = reconcile_task.await {
        warn!(error = %e, "Reconciliation task ended abnormally");
    }
    if let Err(e) = api_task.await {
        warn!(error = %e, "Control plane task ended abnormally");
    }
    state.close_all().await;
    info!("Shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
