//! Chat platform capability surface.
//!
//! The relay never talks to the platform directly; everything goes through
//! [`ChatClient`]. The binary uses [`bridge::BridgeClient`], tests use
//! in-memory fakes.

pub mod bridge;

use async_trait::async_trait;
use chanrelay_proto::{Chat, Supergroup, SupergroupFullInfo, Update};
use futures_util::stream::BoxStream;
use thiserror::Error;

/// Platform call failures. Opaque apart from "not found".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Request(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to decode platform response: {0}")]
    Decode(String),
}

/// Calls the relay needs from the chat platform client.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Ids of chats the account has joined, at most `limit`.
    async fn get_chats(&self, limit: u32) -> Result<Vec<i64>, PlatformError>;

    /// Chat metadata by id.
    async fn get_chat(&self, chat_id: i64) -> Result<Chat, PlatformError>;

    /// Resolve a public chat by username or link.
    async fn search_public_chat(&self, username: &str) -> Result<Chat, PlatformError>;

    /// Ids of public chats matching a free-text query.
    async fn search_public_chats(&self, query: &str) -> Result<Vec<i64>, PlatformError>;

    /// Join a chat.
    async fn join_chat(&self, chat_id: i64) -> Result<(), PlatformError>;

    /// Mark a chat as recently found (required before joining by id).
    async fn add_recently_found_chat(&self, chat_id: i64) -> Result<(), PlatformError>;

    /// Supergroup metadata.
    async fn get_supergroup(&self, supergroup_id: i64) -> Result<Supergroup, PlatformError>;

    /// Extended supergroup metadata, including the description.
    async fn get_supergroup_full_info(
        &self,
        supergroup_id: i64,
    ) -> Result<SupergroupFullInfo, PlatformError>;

    /// The platform's update stream. Ends when the client shuts down.
    fn updates(&self) -> BoxStream<'static, Result<Update, PlatformError>>;
}
