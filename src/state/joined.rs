//! Runtime view of the channels this replica has joined.

use crate::db::Channel;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Result of merging a persisted record into the runtime registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The channel was not tracked yet.
    Inserted,
    /// The persisted timestamp was at least as new and was adopted.
    Updated,
    /// The runtime timestamp is newer; the store should be told about it.
    RuntimeNewer {
        link: String,
        last_at: DateTime<Utc>,
    },
}

/// Channel id to runtime entry. Never holds two entries for one id.
#[derive(Debug, Default)]
pub struct JoinedChannels {
    entries: HashMap<i64, Channel>,
}

impl JoinedChannels {
    pub fn get(&self, channel_id: i64) -> Option<&Channel> {
        self.entries.get(&channel_id)
    }

    pub fn contains(&self, channel_id: i64) -> bool {
        self.entries.contains_key(&channel_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.entries.keys().copied().collect()
    }

    /// Record a delivery at `at`. The timestamp never moves backwards.
    pub fn touch(&mut self, channel_id: i64, at: Option<DateTime<Utc>>) -> Option<&Channel> {
        let entry = self.entries.get_mut(&channel_id)?;
        if let Some(at) = at
            && at > entry.last_at
        {
            entry.last_at = at;
        }
        Some(entry)
    }

    /// Merge a persisted record, keeping the newer last-delivered time.
    ///
    /// Metadata (name, routing, label) always comes from the persisted side.
    pub fn merge(&mut self, persisted: Channel) -> MergeOutcome {
        let Some(runtime) = self.entries.get_mut(&persisted.id) else {
            self.entries.insert(persisted.id, persisted);
            return MergeOutcome::Inserted;
        };

        let runtime_last = runtime.last_at;
        *runtime = persisted;
        if runtime_last > runtime.last_at {
            runtime.last_at = runtime_last;
            MergeOutcome::RuntimeNewer {
                link: runtime.link.clone(),
                last_at: runtime_last,
            }
        } else {
            MergeOutcome::Updated
        }
    }

    pub fn remove(&mut self, channel_id: i64) -> Option<Channel> {
        self.entries.remove(&channel_id)
    }
}
