//! Event intake sink abstraction.
//!
//! The intake API is consumed through two traits: an [`EventSink`] opens one
//! [`EventWriter`] per destination, and a writer accepts batches of events
//! and reports how many were acknowledged. The production implementation
//! is [`http::HttpSink`].

pub mod http;

use async_trait::async_trait;
use chanrelay_proto::Event;
use std::sync::Arc;
use thiserror::Error;

/// Routing metadata for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Tenant isolation key, sent with every request.
    pub group_id: String,
    /// Destination id: the channel's user id, or its link when unassigned.
    pub destination: String,
}

/// What the delivery pipeline should do after a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The stream itself is unusable: drop the writer, do not retry on it.
    Reopen,
    /// Transient failure: retry on the same writer with backoff.
    Retry,
}

/// Sink failures, classified by what they say about the writer stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("limit reached")]
    LimitReached,

    #[error("limits service unavailable")]
    LimitUnavailable,

    #[error("permits service unavailable")]
    PermitUnavailable,

    #[error("resolver unavailable")]
    ResolverUnavailable,

    #[error("writer stream closed")]
    Eof,

    /// The write succeeded but nothing was acknowledged.
    #[error("event was not accepted")]
    NoAck,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

impl SinkError {
    /// Classify the error for the delivery pipeline.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::LimitReached
            | Self::LimitUnavailable
            | Self::PermitUnavailable
            | Self::ResolverUnavailable
            | Self::Eof => Disposition::Reopen,
            Self::NoAck | Self::Transport(_) | Self::Rejected(_) => Disposition::Retry,
        }
    }

    /// Static label used for failure metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::LimitReached => "limit_reached",
            Self::LimitUnavailable => "limit_unavailable",
            Self::PermitUnavailable => "permit_unavailable",
            Self::ResolverUnavailable => "resolver_unavailable",
            Self::Eof => "eof",
            Self::NoAck => "no_ack",
            Self::Transport(_) => "transport",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// An open delivery stream to one destination.
#[async_trait]
pub trait EventWriter: Send + Sync {
    /// Write a batch; returns the number of acknowledged events.
    async fn write_batch(&self, events: &[Event]) -> Result<u32, SinkError>;

    /// Close the stream. Writes after close fail with [`SinkError::Eof`].
    async fn close(&self) -> Result<(), SinkError>;
}

/// Factory for per-destination writers.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Open a new writer for `route`.
    async fn open_writer(&self, route: &Route) -> Result<Arc<dyn EventWriter>, SinkError>;
}
