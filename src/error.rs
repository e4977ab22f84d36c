//! Unified error handling for chanrelay.
//!
//! Each layer owns a small error enum; the storage, platform and sink
//! errors live next to their traits and are wrapped here where layers meet.

use crate::db::DbError;
use crate::platform::PlatformError;
use crate::sink::SinkError;
use crate::tags::TAG_NO_BOT;
use thiserror::Error;

// ============================================================================
// Conversion Errors (message -> event)
// ============================================================================

/// Reasons a chat message does not turn into an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// Policy veto: the message text carries the opt-out tag.
    #[error("message contains the {tag} tag", tag = TAG_NO_BOT)]
    NoBotTag,

    #[error("unsupported message content type: {0}")]
    Unsupported(String),
}

impl ConvertError {
    /// Static label used for drop metrics.
    #[inline]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoBotTag => "no_bot_tag",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

// ============================================================================
// Delivery Errors (event -> sink)
// ============================================================================

/// Failures of the delivery pipeline.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to open writer for channel {channel_id}: {source}")]
    Open {
        channel_id: i64,
        #[source]
        source: SinkError,
    },

    #[error("failed to write event {event_id} from channel {channel_id}: {source}")]
    Write {
        channel_id: i64,
        event_id: String,
        #[source]
        source: SinkError,
    },
}

impl DeliveryError {
    /// The underlying sink error.
    pub fn sink_error(&self) -> &SinkError {
        match self {
            Self::Open { source, .. } | Self::Write { source, .. } => source,
        }
    }
}

// ============================================================================
// Service Errors (channel registry operations)
// ============================================================================

/// Errors surfaced by [`crate::services::ChannelService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Policy veto: the chat description carries the opt-out tag.
    #[error("chat {0} contains the {tag} tag", tag = TAG_NO_BOT)]
    NoBotTag(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,
}

// ============================================================================
// Reconciliation Errors (cycle-aborting)
// ============================================================================

/// Fetch-level failures that abort one reconciliation cycle.
///
/// Per-channel join and tag-check failures never show up here; they are
/// logged and skipped inside the cycle.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to list joined chats: {0}")]
    JoinedChats(#[source] PlatformError),

    #[error("failed to load channels: {0}")]
    Channels(#[source] DbError),
}

impl ReconcileError {
    /// Static label used for cycle metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::JoinedChats(_) => "joined_chats",
            Self::Channels(_) => "channels",
        }
    }
}
