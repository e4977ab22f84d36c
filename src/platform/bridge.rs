//! HTTP JSON bridge to the chat platform client.
//!
//! The platform's native client library runs behind a small bridge process
//! that exposes each client method as `POST {base}/{method}` with a JSON
//! body. Responses are wrapped as `{"ok": true, "result": ...}` or
//! `{"ok": false, "error": {"code": 404, "message": "..."}}`.
//! Updates are long-polled with `getUpdates`.

use super::{ChatClient, PlatformError};
use async_trait::async_trait;
use chanrelay_proto::{Chat, MessageContent, Supergroup, SupergroupFullInfo, Update};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

/// Pause after a failed poll before the next attempt.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(1);

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    error: Option<BridgeError>,
}

#[derive(Deserialize)]
struct BridgeError {
    code: u16,
    message: String,
}

#[derive(Deserialize)]
struct ChatIds {
    #[serde(default)]
    chat_ids: Vec<i64>,
}

/// One polled item. The update body stays raw so a type the relay does not
/// model cannot fail the batch.
#[derive(Deserialize)]
struct PolledUpdate {
    update_id: i64,
    #[serde(default)]
    update: serde_json::Value,
}

#[derive(Deserialize)]
struct AuthorizationState {
    state: String,
}

#[derive(Serialize)]
struct Empty {}

/// [`ChatClient`] over the HTTP bridge.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl BridgeClient {
    /// Build a client. The request timeout must exceed the poll timeout.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        poll_timeout_secs: u64,
    ) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(timeout + Duration::from_secs(poll_timeout_secs))
            .build()
            .map_err(|e| PlatformError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_timeout_secs,
        })
    }

    async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp, PlatformError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        let envelope: Envelope<Resp> = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PlatformError::Request(format!("{method}: {e}")))?
            .json()
            .await
            .map_err(|e| PlatformError::Decode(format!("{method}: {e}")))?;

        match envelope {
            Envelope {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            Envelope {
                error: Some(err), ..
            } if err.code == 404 => Err(PlatformError::NotFound(err.message)),
            Envelope {
                error: Some(err), ..
            } => Err(PlatformError::Request(format!(
                "{method}: {} {}",
                err.code, err.message
            ))),
            _ => Err(PlatformError::Decode(format!("{method}: empty result"))),
        }
    }

    /// Whether the bridge is waiting for a login code.
    pub async fn needs_login_code(&self) -> Result<bool, PlatformError> {
        let state: AuthorizationState = self.call("getAuthorizationState", &Empty {}).await?;
        debug!(state = %state.state, "Platform authorization state");
        Ok(state.state == "wait_code")
    }

    /// Submit the login code received through the control plane.
    pub async fn submit_login_code(&self, code: &str) -> Result<(), PlatformError> {
        let _: serde_json::Value = self
            .call("checkAuthenticationCode", &json!({ "code": code.trim() }))
            .await?;
        Ok(())
    }

    async fn poll(&self, offset: i64) -> Result<Vec<PolledUpdate>, PlatformError> {
        self.call(
            "getUpdates",
            &json!({ "offset": offset, "timeout": self.poll_timeout_secs }),
        )
        .await
    }
}

#[async_trait]
impl ChatClient for BridgeClient {
    async fn get_chats(&self, limit: u32) -> Result<Vec<i64>, PlatformError> {
        let ids: ChatIds = self.call("getChats", &json!({ "limit": limit })).await?;
        Ok(ids.chat_ids)
    }

    async fn get_chat(&self, chat_id: i64) -> Result<Chat, PlatformError> {
        self.call("getChat", &json!({ "chat_id": chat_id })).await
    }

    async fn search_public_chat(&self, username: &str) -> Result<Chat, PlatformError> {
        self.call("searchPublicChat", &json!({ "username": username }))
            .await
    }

    async fn search_public_chats(&self, query: &str) -> Result<Vec<i64>, PlatformError> {
        let ids: ChatIds = self
            .call("searchPublicChats", &json!({ "query": query }))
            .await?;
        Ok(ids.chat_ids)
    }

    async fn join_chat(&self, chat_id: i64) -> Result<(), PlatformError> {
        let _: serde_json::Value = self.call("joinChat", &json!({ "chat_id": chat_id })).await?;
        Ok(())
    }

    async fn add_recently_found_chat(&self, chat_id: i64) -> Result<(), PlatformError> {
        let _: serde_json::Value = self
            .call("addRecentlyFoundChat", &json!({ "chat_id": chat_id }))
            .await?;
        Ok(())
    }

    async fn get_supergroup(&self, supergroup_id: i64) -> Result<Supergroup, PlatformError> {
        self.call("getSupergroup", &json!({ "supergroup_id": supergroup_id }))
            .await
    }

    async fn get_supergroup_full_info(
        &self,
        supergroup_id: i64,
    ) -> Result<SupergroupFullInfo, PlatformError> {
        self.call(
            "getSupergroupFullInfo",
            &json!({ "supergroup_id": supergroup_id }),
        )
        .await
    }

    fn updates(&self) -> BoxStream<'static, Result<Update, PlatformError>> {
        let client = self.clone();
        let state = (
            client,
            0i64,
            VecDeque::<Result<Update, PlatformError>>::new(),
        );
        stream::unfold(state, |(client, mut offset, mut buffered)| async move {
            loop {
                if let Some(item) = buffered.pop_front() {
                    return Some((item, (client, offset, buffered)));
                }
                match client.poll(offset).await {
                    Ok(batch) => {
                        for polled in batch {
                            offset = offset.max(polled.update_id + 1);
                            buffered.push_back(decode_update(polled.update).map_err(|e| {
                                PlatformError::Decode(format!(
                                    "update {}: {e}",
                                    polled.update_id
                                ))
                            }));
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to poll platform updates");
                        tokio::time::sleep(POLL_ERROR_PAUSE).await;
                        return Some((Err(e), (client, offset, buffered)));
                    }
                }
            }
        })
        .boxed()
    }
}

/// Decode one raw update.
///
/// Update classes the relay does not model become [`Update::Other`]. A new
/// message whose content does not decode keeps its envelope and carries
/// [`MessageContent::Unsupported`] named after the content's `type`, so the
/// converter drops it like any other unsupported payload.
fn decode_update(raw: Value) -> Result<Update, serde_json::Error> {
    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    if kind != "new_message" {
        return Ok(serde_json::from_value(raw).unwrap_or(Update::Other { kind }));
    }

    match serde_json::from_value::<Update>(raw.clone()) {
        Ok(update) => Ok(update),
        Err(err) => {
            let mut raw = raw;
            let Some(content) = raw.pointer_mut("/message/content") else {
                return Err(err);
            };
            let content_kind = content
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            debug!(kind = %content_kind, error = %err, "Undecodable message content");
            *content = serde_json::to_value(MessageContent::Unsupported { kind: content_kind })?;
            serde_json::from_value(raw)
        }
    }
}
