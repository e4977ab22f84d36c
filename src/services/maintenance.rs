//! Periodic housekeeping tasks.

use crate::db::ChannelStore;
use crate::state::SharedState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawn the writer idle sweep.
///
/// Every `period`, writers unused for longer than the cache TTL are closed.
pub fn spawn_writer_sweep(
    state: Arc<SharedState>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let closed = state.sweep_idle().await;
                    if closed > 0 {
                        debug!(closed, "Closed idle writers");
                    }
                }
            }
        }
    })
}

/// Spawn the retention pruner.
///
/// Every `period`, channels with no delivery within `retention` are deleted.
pub fn spawn_retention_prune(
    store: Arc<dyn ChannelStore>,
    retention: Duration,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => prune_once(store.as_ref(), retention).await,
            }
        }
    })
}

async fn prune_once(store: &dyn ChannelStore, retention: Duration) {
    match store.prune_expired(retention).await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Pruned expired channels"),
        Err(e) => warn!(error = %e, "Failed to prune expired channels"),
    }
}
