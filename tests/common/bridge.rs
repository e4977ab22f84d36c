//! Fake chat platform bridge.
//!
//! Speaks the bridge's `POST /{method}` JSON protocol with the
//! `{"ok": ..., "result"/"error": ...}` envelope.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chanrelay_proto::{
    Chat, ChatType, FormattedText, Message, MessageContent, Supergroup, SupergroupFullInfo,
    Update,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct BridgeState {
    waiting_for_code: bool,
    codes: Vec<String>,
    joined: Vec<i64>,
    chats: HashMap<i64, Chat>,
    usernames: HashMap<String, i64>,
    supergroups: HashMap<i64, Supergroup>,
    descriptions: HashMap<i64, String>,
    join_calls: Vec<i64>,
    next_update_id: i64,
    updates: Vec<(i64, Value)>,
    next_message_id: i64,
}

/// In-process platform bridge.
#[derive(Clone)]
pub struct FakeBridge {
    state: Arc<Mutex<BridgeState>>,
    pub url: String,
}

impl FakeBridge {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(BridgeState::default()));
        let app = Router::new()
            .route("/:method", post(dispatch))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind bridge");
        let url = format!("http://{}", listener.local_addr().expect("bridge addr"));
        tokio::spawn(async move { axum::serve(listener, app).await });
        Self { state, url }
    }

    /// Register a public broadcast channel; the supergroup id is `-chat_id`.
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
        st.supergroups.insert(
            supergroup_id,
            Supergroup {
                id: supergroup_id,
                active_usernames: vec![username.to_string()],
                member_count,
                is_channel: true,
            },
        );
        st.descriptions.insert(supergroup_id, description.to_string());
    }

    #[allow(dead_code)]
    pub fn set_description(&self, chat_id: i64, description: &str) {
        self.state
            .lock()
            .descriptions
            .insert(-chat_id, description.to_string());
    }

    #[allow(dead_code)]
    pub fn require_login_code(&self) {
        self.state.lock().waiting_for_code = true;
    }

    #[allow(dead_code)]
    pub fn received_codes(&self) -> Vec<String> {
        self.state.lock().codes.clone()
    }

    #[allow(dead_code)]
    pub fn join_calls(&self) -> Vec<i64> {
        self.state.lock().join_calls.clone()
    }

    /// Queue an incoming message for the update stream.
    #[allow(dead_code)]
    pub fn push_message(&self, chat_id: i64, content: MessageContent) {
        let mut st = self.state.lock();
        st.next_message_id += 1;
        st.next_update_id += 1;
        let update = Update::NewMessage {
            message: Message {
                id: st.next_message_id,
                chat_id,
                date: chrono::Utc::now().timestamp(),
                is_outgoing: false,
                content,
            },
        };
        let update_id = st.next_update_id;
        st.updates.push((update_id, to_value(&update)));
    }

    /// Queue an update exactly as the bridge would encode it.
    #[allow(dead_code)]
    pub fn push_raw(&self, update: Value) {
        let mut st = self.state.lock();
        st.next_update_id += 1;
        let update_id = st.next_update_id;
        st.updates.push((update_id, update));
    }

    /// Queue a message whose content type the relay does not model.
    #[allow(dead_code)]
    pub fn push_raw_content(&self, chat_id: i64, content: Value) {
        let message_id = {
            let mut st = self.state.lock();
            st.next_message_id += 1;
            st.next_message_id
        };
        self.push_raw(json!({
            "type": "new_message",
            "message": {
                "id": message_id,
                "chat_id": chat_id,
                "date": chrono::Utc::now().timestamp(),
                "content": content,
            },
        }));
    }

    #[allow(dead_code)]
    pub fn push_text(&self, chat_id: i64, text: &str) {
        self.push_message(
            chat_id,
            MessageContent::Text {
                text: FormattedText::new(text),
            },
        );
    }
}

fn ok(result: Value) -> Json<Value> {
    Json(json!({ "ok": true, "result": result }))
}

fn not_found(what: impl std::fmt::Display) -> Json<Value> {
    Json(json!({ "ok": false, "error": { "code": 404, "message": format!("{what} not found") } }))
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("serialize bridge result")
}

async fn dispatch(
    State(state): State<Arc<Mutex<BridgeState>>>,
    Path(method): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    if method == "getUpdates" {
        return poll(state, body["offset"].as_i64().unwrap_or(0)).await;
    }

    let mut st = state.lock();
    let chat_id = body["chat_id"].as_i64().unwrap_or_default();
    let supergroup_id = body["supergroup_id"].as_i64().unwrap_or_default();
    match method.as_str() {
        "getAuthorizationState" => {
            let state = if st.waiting_for_code { "wait_code" } else { "ready" };
            ok(json!({ "state": state }))
        }
        "checkAuthenticationCode" => {
            let code = body["code"].as_str().unwrap_or_default().to_string();
            st.codes.push(code);
            st.waiting_for_code = false;
            ok(json!({}))
        }
        "getChats" => ok(json!({ "chat_ids": st.joined })),
        "getChat" => match st.chats.get(&chat_id) {
            Some(chat) => ok(to_value(chat)),
            None => not_found(chat_id),
        },
        "searchPublicChat" => {
            let username = body["username"].as_str().unwrap_or_default();
            match st.usernames.get(username).and_then(|id| st.chats.get(id)) {
                Some(chat) => ok(to_value(chat)),
                None => not_found(username),
            }
        }
        "searchPublicChats" => ok(json!({ "chat_ids": [] })),
        "addRecentlyFoundChat" => ok(json!({})),
        "joinChat" => {
            st.join_calls.push(chat_id);
            if st.chats.contains_key(&chat_id) {
                st.joined.push(chat_id);
                ok(json!({}))
            } else {
                not_found(chat_id)
            }
        }
        "getSupergroup" => match st.supergroups.get(&supergroup_id) {
            Some(sg) => ok(to_value(sg)),
            None => not_found(supergroup_id),
        },
        "getSupergroupFullInfo" => match st.descriptions.get(&supergroup_id) {
            Some(description) => ok(to_value(&SupergroupFullInfo {
                description: description.clone(),
            })),
            None => not_found(supergroup_id),
        },
        other => Json(json!({ "ok": false, "error": { "code": 400, "message": format!("unknown method {other}") } })),
    }
}

async fn poll(state: Arc<Mutex<BridgeState>>, offset: i64) -> Json<Value> {
    let batch: Vec<Value> = {
        let mut st = state.lock();
        st.updates.retain(|(id, _)| *id >= offset);
        st.updates
            .iter()
            .map(|(id, update)| json!({ "update_id": id, "update": update }))
            .collect()
    };
    if batch.is_empty() {
        // Short long-poll so the relay does not spin.
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    ok(Value::Array(batch))
}
