//! Bounded, idle-expiring cache of open writer handles.
//!
//! The cache owns handle lifetime: a handle leaves the cache only through
//! capacity eviction, idle expiry, explicit invalidation or a full drain.
//! Every path that removes a handle hands it back to the caller, who closes
//! it once the surrounding lock is released.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct CachedWriter<W> {
    writer: W,
    last_used: Instant,
}

/// Writer handles keyed by channel id.
#[derive(Debug)]
pub struct WriterCache<W> {
    entries: HashMap<i64, CachedWriter<W>>,
    capacity: usize,
    ttl: Duration,
}

impl<W: Clone> WriterCache<W> {
    /// Create a cache holding at most `capacity` handles, each expiring after
    /// `ttl` without use.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Look up a live handle and mark it used.
    ///
    /// An expired handle is removed and returned as the second element so the
    /// caller can close it.
    pub fn get(&mut self, channel_id: i64) -> (Option<W>, Option<W>) {
        let now = Instant::now();
        match self.entries.get_mut(&channel_id) {
            Some(entry) if now.duration_since(entry.last_used) < self.ttl => {
                entry.last_used = now;
                (Some(entry.writer.clone()), None)
            }
            Some(_) => {
                let expired = self.entries.remove(&channel_id).map(|e| e.writer);
                (None, expired)
            }
            None => (None, None),
        }
    }

    /// Insert a freshly opened handle.
    ///
    /// Returns handles pushed out by this insert: a previous handle for the
    /// same channel, or the least recently used entry when full.
    pub fn insert(&mut self, channel_id: i64, writer: W) -> Vec<(i64, W)> {
        let mut evicted = Vec::new();
        if let Some(old) = self.entries.remove(&channel_id) {
            evicted.push((channel_id, old.writer));
        }
        while self.entries.len() >= self.capacity {
            let Some(lru) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(id, _)| *id)
            else {
                break;
            };
            if let Some(entry) = self.entries.remove(&lru) {
                evicted.push((lru, entry.writer));
            }
        }
        self.entries.insert(
            channel_id,
            CachedWriter {
                writer,
                last_used: Instant::now(),
            },
        );
        evicted
    }

    /// Remove a handle outside the expiry path.
    pub fn invalidate(&mut self, channel_id: i64) -> Option<W> {
        self.entries.remove(&channel_id).map(|e| e.writer)
    }

    /// Remove all handles idle for at least the TTL.
    pub fn drain_expired(&mut self) -> Vec<(i64, W)> {
        let now = Instant::now();
        let expired: Vec<i64> = self
            .entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_used) >= self.ttl)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|e| (id, e.writer)))
            .collect()
    }

    /// Remove every handle.
    pub fn drain(&mut self) -> Vec<(i64, W)> {
        self.entries.drain().map(|(id, e)| (id, e.writer)).collect()
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
}
