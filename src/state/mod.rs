//! Shared runtime state: joined channels and their open writers.
//!
//! Both live behind one async mutex because a writer-cache miss has to read
//! the channel's routing metadata atomically with the cache check. Every
//! composite read-modify-write (touch, merge, acquire) is a single method
//! here so callers never juggle the lock themselves.
//!
//! Handles removed from the cache are closed after the lock is released.

mod joined;

pub use joined::{JoinedChannels, MergeOutcome};

use crate::db::Channel;
use crate::delivery::writers::WriterCache;
use crate::sink::{EventSink, EventWriter, Route, SinkError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Writer handle as stored in the cache.
pub type SharedWriter = Arc<dyn EventWriter>;

struct Registry {
    joined: JoinedChannels,
    writers: WriterCache<SharedWriter>,
}

impl Registry {
    fn publish_gauges(&self) {
        crate::metrics::set_channels_joined(self.joined.len());
        crate::metrics::set_writers_open(self.writers.len());
    }
}

/// Routing for a channel's events.
pub fn route_for(ch: &Channel) -> Route {
    Route {
        group_id: ch.group_id.clone(),
        destination: ch.destination().to_string(),
    }
}

/// Joined-channel registry plus writer cache.
pub struct SharedState {
    inner: Mutex<Registry>,
    sink: Arc<dyn EventSink>,
}

impl SharedState {
    pub fn new(sink: Arc<dyn EventSink>, writer_capacity: usize, writer_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Registry {
                joined: JoinedChannels::default(),
                writers: WriterCache::new(writer_capacity, writer_ttl),
            }),
            sink,
        }
    }

    /// Link of a joined channel, used as the event source.
    pub async fn source_link(&self, channel_id: i64) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.joined.get(channel_id).map(|ch| ch.link.clone())
    }

    /// Bump the last-delivered time and return the channel's routing.
    ///
    /// `None` means the channel is not joined.
    pub async fn touch(&self, channel_id: i64, at: Option<DateTime<Utc>>) -> Option<Route> {
        let mut inner = self.inner.lock().await;
        inner.joined.touch(channel_id, at).map(route_for)
    }

    /// Merge a persisted record into the runtime registry.
    pub async fn merge(&self, persisted: Channel) -> MergeOutcome {
        let mut inner = self.inner.lock().await;
        let outcome = inner.joined.merge(persisted);
        inner.publish_gauges();
        outcome
    }

    /// Snapshot of a joined channel.
    pub async fn channel(&self, channel_id: i64) -> Option<Channel> {
        let inner = self.inner.lock().await;
        inner.joined.get(channel_id).cloned()
    }

    /// Ids of every channel in the runtime registry.
    pub async fn channel_ids(&self) -> Vec<i64> {
        self.inner.lock().await.joined.ids()
    }

    pub async fn is_joined(&self, channel_id: i64) -> bool {
        self.inner.lock().await.joined.contains(channel_id)
    }

    pub async fn joined_count(&self) -> usize {
        self.inner.lock().await.joined.len()
    }

    pub async fn writer_count(&self) -> usize {
        self.inner.lock().await.writers.len()
    }

    /// Get the cached writer for a channel, opening one on a miss.
    ///
    /// Returns `Ok(None)` when the channel is not joined.
    pub async fn acquire_writer(&self, channel_id: i64) -> Result<Option<SharedWriter>, SinkError> {
        let mut to_close = Vec::new();
        let result = {
            let mut inner = self.inner.lock().await;
            let (hit, expired) = inner.writers.get(channel_id);
            to_close.extend(expired.map(|w| (channel_id, w)));
            match hit {
                Some(writer) => Ok(Some(writer)),
                None => match inner.joined.get(channel_id).map(route_for) {
                    None => Ok(None),
                    Some(route) => match self.sink.open_writer(&route).await {
                        Ok(writer) => {
                            let evicted = inner.writers.insert(channel_id, writer.clone());
                            to_close.extend(evicted);
                            crate::metrics::record_writer_opened();
                            inner.publish_gauges();
                            debug!(
                                channel_id,
                                group_id = %route.group_id,
                                destination = %route.destination,
                                "Opened writer"
                            );
                            Ok(Some(writer))
                        }
                        Err(e) => Err(e),
                    },
                },
            }
        };
        close_writers(to_close).await;
        result
    }

    /// Drop and close a channel's writer so the next acquire reopens it.
    pub async fn invalidate(&self, channel_id: i64) {
        let removed = {
            let mut inner = self.inner.lock().await;
            let removed = inner.writers.invalidate(channel_id);
            inner.publish_gauges();
            removed
        };
        if removed.is_some() {
            debug!(channel_id, "Invalidated writer");
        }
        close_writers(removed.map(|w| (channel_id, w))).await;
    }

    /// Forget a channel and close its writer.
    pub async fn remove(&self, channel_id: i64) -> Option<Channel> {
        let (channel, writer) = {
            let mut inner = self.inner.lock().await;
            let channel = inner.joined.remove(channel_id);
            let writer = inner.writers.invalidate(channel_id);
            inner.publish_gauges();
            (channel, writer)
        };
        close_writers(writer.map(|w| (channel_id, w))).await;
        channel
    }

    /// Close writers idle past their TTL. Returns how many were closed.
    pub async fn sweep_idle(&self) -> usize {
        let expired = {
            let mut inner = self.inner.lock().await;
            let expired = inner.writers.drain_expired();
            inner.publish_gauges();
            expired
        };
        let count = expired.len();
        close_writers(expired).await;
        count
    }

    /// Close every cached writer.
    pub async fn close_all(&self) {
        let all = {
            let mut inner = self.inner.lock().await;
            let all = inner.writers.drain();
            inner.publish_gauges();
            all
        };
        info!(count = all.len(), "Closing all writers");
        close_writers(all).await;
    }
}

async fn close_writers(writers: impl IntoIterator<Item = (i64, SharedWriter)>) {
    for (channel_id, writer) in writers {
        if let Err(e) = writer.close().await {
            warn!(channel_id, error = %e, "Failed to close writer");
        }
    }
}
