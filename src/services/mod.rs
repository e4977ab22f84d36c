//! Channel registry services.
//!
//! [`ChannelService`] backs the control plane: registration with platform
//! lookup and tag veto, plus search-driven auto-discovery. The
//! reconciliation loop lives in [`reconcile`], the periodic housekeeping
//! tasks in [`maintenance`].

pub mod maintenance;
pub mod reconcile;

pub use reconcile::{CycleReport, Reconciler};

use crate::db::{Channel, ChannelFilter, ChannelStore, Order};
use crate::error::ServiceError;
use crate::platform::ChatClient;
use crate::tags::contains_no_bot_tag;
use chanrelay_proto::ChatType;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Auto-discovered channels need strictly more members than this.
pub const MIN_CHANNEL_MEMBER_COUNT: i32 = 2345;

/// Outcome of [`ChannelService::search_and_add`].
#[derive(Debug, Default, Serialize)]
pub struct SearchReport {
    pub added: u32,
    /// Per-chat failures, including tag vetoes.
    pub failures: Vec<String>,
}

/// Whether a chat's description carries the opt-out tag.
///
/// Only supergroups have descriptions; any lookup failure counts as "no tag".
pub async fn chat_has_no_bot_tag(client: &dyn ChatClient, chat_id: i64) -> bool {
    match client.get_chat(chat_id).await {
        Ok(chat) => match chat.chat_type {
            ChatType::Supergroup { supergroup_id, .. } => {
                supergroup_has_no_bot_tag(client, chat_id, supergroup_id).await
            }
            _ => false,
        },
        Err(e) => {
            debug!(chat_id, error = %e, "Chat lookup failed during tag check");
            false
        }
    }
}

async fn supergroup_has_no_bot_tag(client: &dyn ChatClient, chat_id: i64, supergroup_id: i64) -> bool {
    match client.get_supergroup_full_info(supergroup_id).await {
        Ok(info) => contains_no_bot_tag(&info.description),
        Err(e) => {
            debug!(chat_id, supergroup_id, error = %e, "Supergroup info lookup failed during tag check");
            false
        }
    }
}

/// Registry operations exposed through the control plane.
#[derive(Clone)]
pub struct ChannelService {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn ChannelStore>,
}

impl ChannelService {
    pub fn new(client: Arc<dyn ChatClient>, store: Arc<dyn ChannelStore>) -> Self {
        Self { client, store }
    }

    /// Register a channel after resolving it on the platform.
    ///
    /// Fills the id when zero (a non-zero id must match the platform's),
    /// refreshes the name from the chat title and stamps both timestamps
    /// with the current time.
    pub async fn create(&self, mut ch: Channel) -> Result<Channel, ServiceError> {
        if ch.link.is_empty() {
            return Err(ServiceError::InvalidArgument("link is required".into()));
        }
        if ch.group_id.is_empty() {
            return Err(ServiceError::InvalidArgument("group_id is required".into()));
        }

        let chat = self.client.search_public_chat(&ch.link).await?;
        if ch.id == 0 {
            ch.id = chat.id;
        } else if ch.id != chat.id {
            return Err(ServiceError::FailedPrecondition(format!(
                "{} resolves to chat {}, not {}",
                ch.link, chat.id, ch.id
            )));
        }
        if ch.name != chat.title {
            ch.name = chat.title;
        }
        if chat_has_no_bot_tag(self.client.as_ref(), ch.id).await {
            return Err(ServiceError::NoBotTag(ch.link));
        }

        let now = Utc::now();
        ch.created_at = now;
        ch.last_at = now;
        self.store.create(&ch).await?;
        info!(id = ch.id, link = %ch.link, group_id = %ch.group_id, "Channel registered");
        Ok(ch)
    }

    pub async fn read(&self, link: &str) -> Result<Channel, ServiceError> {
        Ok(self.store.read(link).await?)
    }

    pub async fn delete(&self, link: &str) -> Result<(), ServiceError> {
        self.store.delete(link).await?;
        info!(link = %link, "Channel deleted");
        Ok(())
    }

    pub async fn get_page(
        &self,
        filter: &ChannelFilter,
        limit: u32,
        cursor: &str,
        order: Order,
    ) -> Result<Vec<Channel>, ServiceError> {
        if !filter.pattern.is_empty() {
            regex::Regex::new(&filter.pattern)
                .map_err(|e| ServiceError::InvalidArgument(format!("invalid pattern: {e}")))?;
        }
        Ok(self.store.get_page(filter, limit, cursor, order).await?)
    }

    /// Search public chats by `terms` and register qualifying channels.
    ///
    /// At most `limit` search results are examined. Only public broadcast
    /// channels with an active username and enough members are added;
    /// anything else is skipped silently, while lookup errors, tag vetoes
    /// and storage errors are collected into the report.
    pub async fn search_and_add(
        &self,
        group_id: &str,
        sub_id: &str,
        terms: &str,
        limit: u32,
    ) -> Result<SearchReport, ServiceError> {
        if group_id.is_empty() || terms.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "group_id and terms are required".into(),
            ));
        }

        let chat_ids = self.client.search_public_chats(terms).await?;
        let mut report = SearchReport::default();

        for chat_id in chat_ids.into_iter().take(limit as usize) {
            match self.discover(chat_id, group_id, sub_id, terms).await {
                Ok(true) => report.added += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(chat_id, error = %e, "Search candidate rejected");
                    report.failures.push(e.to_string());
                }
            }
        }

        info!(
            group_id = %group_id,
            terms = %terms,
            added = report.added,
            failed = report.failures.len(),
            "Search and add finished"
        );
        Ok(report)
    }

    /// Examine one search result. `Ok(false)` means skipped.
    async fn discover(
        &self,
        chat_id: i64,
        group_id: &str,
        sub_id: &str,
        terms: &str,
    ) -> Result<bool, ServiceError> {
        let chat = self.client.get_chat(chat_id).await?;
        let ChatType::Supergroup {
            supergroup_id,
            is_channel,
        } = chat.chat_type
        else {
            return Ok(false);
        };
        if supergroup_has_no_bot_tag(self.client.as_ref(), chat_id, supergroup_id).await {
            return Err(ServiceError::NoBotTag(chat.title));
        }
        if !is_channel {
            return Ok(false);
        }

        let sg = self.client.get_supergroup(supergroup_id).await?;
        let Some(username) = sg.active_usernames.first().filter(|u| !u.is_empty()) else {
            return Ok(false);
        };
        if sg.member_count <= MIN_CHANNEL_MEMBER_COUNT {
            debug!(chat_id, members = sg.member_count, "Channel too small, skipping");
            return Ok(false);
        }

        let now = Utc::now();
        let ch = Channel {
            id: chat_id,
            group_id: group_id.to_string(),
            user_id: None,
            name: username.clone(),
            link: format!("@{username}"),
            created_at: now,
            last_at: now,
            sub_id: Some(sub_id.to_string()).filter(|s| !s.is_empty()),
            terms: Some(terms.to_string()),
            label: None,
        };
        self.store.create(&ch).await?;
        info!(id = chat_id, link = %ch.link, "Channel discovered");
        Ok(true)
    }
}
