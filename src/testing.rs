//! In-memory fakes for unit tests.

use crate::platform::{ChatClient, PlatformError};
use crate::sink::{EventSink, EventWriter, Route, SinkError};
use async_trait::async_trait;
use chanrelay_proto::{Chat, ChatType, Event, Supergroup, SupergroupFullInfo, Update};
use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ============================================================================
// Sink
// ============================================================================

#[derive(Default)]
struct SinkShared {
    opened: Mutex<Vec<Route>>,
    open_failures: Mutex<VecDeque<SinkError>>,
    outcomes: Mutex<VecDeque<Result<u32, SinkError>>>,
    delivered: Mutex<Vec<(Route, Event)>>,
    attempts: Mutex<Vec<usize>>,
    closes: AtomicUsize,
}

/// Sink that records everything and replays scripted write outcomes.
///
/// With no script, every write acknowledges the whole batch.
#[derive(Default)]
pub struct RecordingSink {
    shared: Arc<SinkShared>,
}

impl RecordingSink {
    /// Queue the outcome of the next write attempt.
    pub fn push_outcome(&self, outcome: Result<u32, SinkError>) {
        self.shared.outcomes.lock().push_back(outcome);
    }

    /// Make the next open fail.
    pub fn fail_next_open(&self, err: SinkError) {
        self.shared.open_failures.lock().push_back(err);
    }

    pub fn open_count(&self) -> usize {
        self.shared.opened.lock().len()
    }

    pub fn opened_routes(&self) -> Vec<Route> {
        self.shared.opened.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Events from acknowledged writes.
    pub fn delivered(&self) -> Vec<Event> {
        self.shared
            .delivered
            .lock()
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn delivered_routes(&self) -> Vec<Route> {
        self.shared
            .delivered
            .lock()
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }

    /// Number of write attempts across all writers.
    pub fn write_attempts(&self) -> usize {
        self.shared.attempts.lock().len()
    }

    /// Writer serial number of each write attempt, in order.
    pub fn attempt_writers(&self) -> Vec<usize> {
        self.shared.attempts.lock().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn open_writer(&self, route: &Route) -> Result<Arc<dyn EventWriter>, SinkError> {
        if let Some(err) = self.shared.open_failures.lock().pop_front() {
            return Err(err);
        }
        let mut opened = self.shared.opened.lock();
        opened.push(route.clone());
        Ok(Arc::new(RecordingWriter {
            serial: opened.len(),
            route: route.clone(),
            shared: self.shared.clone(),
        }))
    }
}

struct RecordingWriter {
    serial: usize,
    route: Route,
    shared: Arc<SinkShared>,
}

#[async_trait]
impl EventWriter for RecordingWriter {
    async fn write_batch(&self, events: &[Event]) -> Result<u32, SinkError> {
        self.shared.attempts.lock().push(self.serial);
        let outcome = self
            .shared
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or(Ok(events.len() as u32));
        if let Ok(ack) = outcome {
            let mut delivered = self.shared.delivered.lock();
            for evt in events.iter().take(ack as usize) {
                delivered.push((self.route.clone(), evt.clone()));
            }
        }
        outcome
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Chat client
// ============================================================================

#[derive(Default)]
struct ClientState {
    joined: Vec<i64>,
    chats: HashMap<i64, Chat>,
    usernames: HashMap<String, i64>,
    supergroups: HashMap<i64, Supergroup>,
    descriptions: HashMap<i64, String>,
    searches: HashMap<String, Vec<i64>>,
    failing_joins: HashSet<i64>,
    fail_get_chats: bool,
    delay: Option<Duration>,
    join_calls: Vec<i64>,
    updates: Vec<Result<Update, PlatformError>>,
}

/// Scriptable chat client.
#[derive(Default)]
pub struct FakeChatClient {
    state: Mutex<ClientState>,
}

impl FakeChatClient {
    /// Register a public broadcast channel.
    ///
    /// The supergroup id is the chat id negated, mirroring the platform's
    /// `-100...` convention loosely enough for tests.
    pub fn add_channel(&self, chat_id: i64, username: &str, member_count: i32, description: &str) {
        let supergroup_id = -chat_id;
        let mut st = self.state.lock();
        st.chats.insert(
            chat_id,
            Chat {
                id: chat_id,
                title: format!("Title of {username}"),
                chat_type: ChatType::Supergroup {
                    supergroup_id,
                    is_channel: true,
                },
            },
        );
        st.usernames.insert(format!("@{username}"), chat_id);
        st.usernames.insert(username.to_string(), chat_id);
        st.supergroups.insert(
            supergroup_id,
            Supergroup {
                id: supergroup_id,
                active_usernames: vec![username.to_string()],
                member_count,
                is_channel: true,
            },
        );
        st.descriptions
            .insert(supergroup_id, description.to_string());
    }

    /// Register a non-supergroup chat.
    pub fn add_private_chat(&self, chat_id: i64) {
        self.state.lock().chats.insert(
            chat_id,
            Chat {
                id: chat_id,
                title: String::new(),
                chat_type: ChatType::Private,
            },
        );
    }

    pub fn set_joined(&self, ids: &[i64]) {
        self.state.lock().joined = ids.to_vec();
    }

    pub fn fail_join(&self, chat_id: i64) {
        self.state.lock().failing_joins.insert(chat_id);
    }

    pub fn fail_get_chats(&self, fail: bool) {
        self.state.lock().fail_get_chats = fail;
    }

    pub fn set_search(&self, query: &str, ids: &[i64]) {
        self.state
            .lock()
            .searches
            .insert(query.to_string(), ids.to_vec());
    }

    pub fn push_update(&self, update: Update) {
        self.state.lock().updates.push(Ok(update));
    }

    pub fn push_update_error(&self, err: PlatformError) {
        self.state.lock().updates.push(Err(err));
    }

    /// Delay applied to public chat lookups.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    pub fn join_calls(&self) -> Vec<i64> {
        self.state.lock().join_calls.clone()
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    async fn get_chats(&self, limit: u32) -> Result<Vec<i64>, PlatformError> {
        let st = self.state.lock();
        if st.fail_get_chats {
            return Err(PlatformError::Request("getChats unavailable".into()));
        }
        Ok(st.joined.iter().copied().take(limit as usize).collect())
    }

    async fn get_chat(&self, chat_id: i64) -> Result<Chat, PlatformError> {
        self.state
            .lock()
            .chats
            .get(&chat_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("chat {chat_id}")))
    }

    async fn search_public_chat(&self, username: &str) -> Result<Chat, PlatformError> {
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let st = self.state.lock();
        st.usernames
            .get(username)
            .and_then(|id| st.chats.get(id))
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(username.to_string()))
    }

    async fn search_public_chats(&self, query: &str) -> Result<Vec<i64>, PlatformError> {
        Ok(self
            .state
            .lock()
            .searches
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    async fn join_chat(&self, chat_id: i64) -> Result<(), PlatformError> {
        let mut st = self.state.lock();
        st.join_calls.push(chat_id);
        if st.failing_joins.contains(&chat_id) {
            return Err(PlatformError::Request(format!("cannot join {chat_id}")));
        }
        if !st.joined.contains(&chat_id) {
            st.joined.push(chat_id);
        }
        Ok(())
    }

    async fn add_recently_found_chat(&self, chat_id: i64) -> Result<(), PlatformError> {
        if self.state.lock().chats.contains_key(&chat_id) {
            Ok(())
        } else {
            Err(PlatformError::NotFound(format!("chat {chat_id}")))
        }
    }

    async fn get_supergroup(&self, supergroup_id: i64) -> Result<Supergroup, PlatformError> {
        self.state
            .lock()
            .supergroups
            .get(&supergroup_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("supergroup {supergroup_id}")))
    }

    async fn get_supergroup_full_info(
        &self,
        supergroup_id: i64,
    ) -> Result<SupergroupFullInfo, PlatformError> {
        self.state
            .lock()
            .descriptions
            .get(&supergroup_id)
            .map(|d| SupergroupFullInfo {
                description: d.clone(),
            })
            .ok_or_else(|| PlatformError::NotFound(format!("supergroup {supergroup_id}")))
    }

    fn updates(&self) -> BoxStream<'static, Result<Update, PlatformError>> {
        let updates = std::mem::take(&mut self.state.lock().updates);
        stream::iter(updates).boxed()
    }
}
