//! Joined-channel reconciliation.
//!
//! Each cycle compares the chats the platform account has joined against
//! the channels persisted for this replica's shard. Missing chats are
//! joined, chats whose description carries the opt-out tag are removed from
//! both the registry and the runtime view, and everything else is merged
//! into the runtime registry. Runtime entries with no persisted counterpart
//! (deleted or pruned channels) are dropped.
//!
//! Only the two fetches at the start of a cycle can fail it. Per-channel
//! problems are logged and skipped.

use super::chat_has_no_bot_tag;
use crate::db::{Channel, ChannelFilter, ChannelStore, Order};
use crate::delivery::retry::{RetryDecision, RetryPolicy};
use crate::error::ReconcileError;
use crate::platform::ChatClient;
use crate::state::{MergeOutcome, SharedState};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// Counters for one reconciliation cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Persisted channels examined.
    pub persisted: usize,
    /// Channels joined during this cycle.
    pub newly_joined: usize,
    /// Channels whose join failed.
    pub skipped: usize,
    /// Channels removed for carrying the opt-out tag.
    pub evicted: usize,
    /// Channels merged into the runtime registry.
    pub merged: usize,
    /// Runtime entries dropped because they are no longer persisted.
    pub untracked: usize,
    /// Runtime timestamps written back to the store.
    pub pushed_back: usize,
}

/// Keeps joined chats, the persisted registry and the runtime registry aligned.
pub struct Reconciler {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn ChannelStore>,
    state: Arc<SharedState>,
    replica: String,
    filter: ChannelFilter,
    list_limit: u32,
}

impl Reconciler {
    /// `label` selects this replica's shard; `None` reconciles every channel.
    pub fn new(
        client: Arc<dyn ChatClient>,
        store: Arc<dyn ChannelStore>,
        state: Arc<SharedState>,
        replica: impl Into<String>,
        label: Option<String>,
        list_limit: u32,
    ) -> Self {
        Self {
            client,
            store,
            state,
            replica: replica.into(),
            filter: label.map(ChannelFilter::for_label).unwrap_or_default(),
            list_limit: list_limit.max(1),
        }
    }

    /// Run cycles until cancelled.
    ///
    /// A failed cycle is retried with `backoff` indefinitely; a successful one
    /// is followed by `interval` of sleep.
    pub async fn run(&self, interval: Duration, backoff: RetryPolicy, cancel: CancellationToken) {
        info!(replica = %self.replica, interval_secs = interval.as_secs(), "Reconciliation loop started");
        loop {
            let result = backoff
                .run(&cancel, || self.run_cycle(), |_| RetryDecision::Retry)
                .await;
            if let Err(e) = result {
                // Only reachable through cancellation.
                debug!(error = %e, "Reconciliation retry abandoned");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!(replica = %self.replica, "Reconciliation loop stopped");
    }

    /// One reconciliation pass.
    pub async fn run_cycle(&self) -> Result<CycleReport, ReconcileError> {
        let span = crate::telemetry::spans::reconcile(&self.replica);
        let result = self.cycle().instrument(span).await;
        match &result {
            Ok(report) => {
                crate::metrics::record_reconcile("ok");
                info!(
                    persisted = report.persisted,
                    newly_joined = report.newly_joined,
                    skipped = report.skipped,
                    evicted = report.evicted,
                    merged = report.merged,
                    untracked = report.untracked,
                    "Reconciliation cycle finished"
                );
            }
            Err(e) => {
                crate::metrics::record_reconcile(e.error_code());
                warn!(error = %e, "Reconciliation cycle failed");
            }
        }
        result
    }

    async fn cycle(&self) -> Result<CycleReport, ReconcileError> {
        let joined: HashSet<i64> = self
            .client
            .get_chats(self.list_limit)
            .await
            .map_err(ReconcileError::JoinedChats)?
            .into_iter()
            .collect();
        debug!(count = joined.len(), "Joined chats fetched from the client");

        let channels = self.load_channels().await?;
        debug!(count = channels.len(), "Channels fetched from the store");

        let mut report = CycleReport {
            persisted: channels.len(),
            ..Default::default()
        };
        let persisted: HashSet<i64> = channels.iter().map(|ch| ch.id).collect();

        for ch in channels {
            if !joined.contains(&ch.id) {
                if !self.join(&ch).await {
                    report.skipped += 1;
                    continue;
                }
                report.newly_joined += 1;
            }

            if chat_has_no_bot_tag(self.client.as_ref(), ch.id).await {
                self.evict(&ch).await;
                report.evicted += 1;
                continue;
            }

            let id = ch.id;
            match self.state.merge(ch).await {
                MergeOutcome::RuntimeNewer { link, last_at } => {
                    // Outside the registry lock; the next cycle repairs a failure.
                    match self.store.update_last(&link, last_at).await {
                        Ok(()) => report.pushed_back += 1,
                        Err(e) => {
                            warn!(channel_id = id, link = %link, error = %e, "Failed to update channel last delivery time");
                        }
                    }
                }
                MergeOutcome::Inserted => debug!(channel_id = id, "Channel added to runtime registry"),
                MergeOutcome::Updated => {}
            }
            report.merged += 1;
        }

        for id in self.state.channel_ids().await {
            if !persisted.contains(&id) && self.state.remove(id).await.is_some() {
                info!(channel_id = id, "Channel no longer registered, stopped tracking");
                report.untracked += 1;
            }
        }

        Ok(report)
    }

    /// Every persisted channel of this shard, page by page.
    async fn load_channels(&self) -> Result<Vec<Channel>, ReconcileError> {
        let mut all = Vec::new();
        let mut cursor = String::new();
        loop {
            let page = self
                .store
                .get_page(&self.filter, self.list_limit, &cursor, Order::Asc)
                .await
                .map_err(ReconcileError::Channels)?;
            let full = page.len() == self.list_limit as usize;
            if let Some(last) = page.last() {
                cursor = last.link.clone();
            }
            all.extend(page);
            if !full {
                return Ok(all);
            }
        }
    }

    /// Resolve, mark as found and join. Only the join itself must succeed.
    async fn join(&self, ch: &Channel) -> bool {
        if let Err(e) = self.client.search_public_chat(&ch.link).await {
            debug!(channel_id = ch.id, link = %ch.link, error = %e, "Public chat lookup failed");
        }
        if let Err(e) = self.client.add_recently_found_chat(ch.id).await {
            debug!(channel_id = ch.id, error = %e, "Failed to mark chat as recently found");
        }
        match self.client.join_chat(ch.id).await {
            Ok(()) => {
                info!(channel_id = ch.id, link = %ch.link, "Joined channel");
                true
            }
            Err(e) => {
                warn!(channel_id = ch.id, link = %ch.link, error = %e, "Failed to join channel");
                false
            }
        }
    }

    async fn evict(&self, ch: &Channel) {
        info!(
            channel_id = ch.id,
            link = %ch.link,
            tag = crate::tags::TAG_NO_BOT,
            "Channel description carries the opt-out tag, removing"
        );
        if let Err(e) = self.store.delete(&ch.link).await
            && !e.is_not_found()
        {
            warn!(channel_id = ch.id, error = %e, "Failed to delete channel");
        }
        self.state.remove(ch.id).await;
    }
}
