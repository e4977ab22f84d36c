//! Channel registry models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked source channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Platform chat id (unique).
    pub id: i64,
    pub group_id: String,
    /// Owning user; routing falls back to `link` when absent or empty.
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    /// Canonical link or handle (unique), e.g. `@news`.
    pub link: String,
    pub created_at: DateTime<Utc>,
    /// Last time a message from this channel was delivered.
    pub last_at: DateTime<Utc>,
    /// Subscription that discovered the channel.
    #[serde(default)]
    pub sub_id: Option<String>,
    /// Search terms that discovered the channel.
    #[serde(default)]
    pub terms: Option<String>,
    /// Replica shard label.
    #[serde(default)]
    pub label: Option<String>,
}

impl Channel {
    /// Minimal record with both timestamps set to `now`.
    pub fn new(
        id: i64,
        group_id: impl Into<String>,
        link: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let link = link.into();
        Self {
            id,
            group_id: group_id.into(),
            user_id: None,
            name: link.clone(),
            link,
            created_at: now,
            last_at: now,
            sub_id: None,
            terms: None,
            label: None,
        }
    }

    /// Destination used for routing: the user id, or the link when unset.
    pub fn destination(&self) -> &str {
        match self.user_id.as_deref() {
            Some(user) if !user.is_empty() => user,
            _ => &self.link,
        }
    }
}

/// Page filter. Empty strings and a zero divisor disable a clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelFilter {
    /// Id modulus divisor; rows match when `id % id_div == -id_rem`.
    pub id_div: u32,
    pub id_rem: u32,
    /// Only applied together with `user_id`.
    pub group_id: String,
    pub user_id: String,
    /// Regular expression matched against link or name.
    pub pattern: String,
    pub sub_id: String,
    pub label: String,
}

impl ChannelFilter {
    /// Filter selecting one replica's shard.
    pub fn for_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// Page ordering by link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}
