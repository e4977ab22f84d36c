//! HTTP implementation of the event intake sink.
//!
//! Each writer posts batches to `{base}/v1/events/{destination}` with the
//! tenant header attached and expects `{"ack": n}` back. Response statuses
//! are mapped onto [`SinkError`] so the delivery pipeline can tell a dead
//! stream from a transient hiccup.

use super::{EventSink, EventWriter, Route, SinkError};
use async_trait::async_trait;
use chanrelay_proto::Event;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Header carrying the tenant (group) id.
pub const HEADER_GROUP_ID: &str = "x-chanrelay-group-id";

/// Header naming the unavailable upstream on a 503.
pub const HEADER_UNAVAILABLE: &str = "x-chanrelay-unavailable";

#[derive(Serialize)]
struct WriteRequest<'a> {
    events: &'a [Event],
}

#[derive(Deserialize)]
struct WriteResponse {
    #[serde(default)]
    ack: u32,
}

/// Sink backed by the intake HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpSink {
    /// Build a sink for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let base_url = Url::parse(&base_url.into())
            .map_err(|e| SinkError::Transport(format!("invalid intake url: {e}")))?;
        Ok(Self { client, base_url })
    }
}

/// `{base}/v1/events/{destination}` with the destination as one
/// percent-encoded path segment.
fn events_url(base: &Url, destination: &str) -> Result<Url, SinkError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| SinkError::Rejected(format!("intake url {base} cannot carry a path")))?
        .pop_if_empty()
        .extend(["v1", "events", destination]);
    Ok(url)
}

#[async_trait]
impl EventSink for HttpSink {
    async fn open_writer(&self, route: &Route) -> Result<Arc<dyn EventWriter>, SinkError> {
        if route.destination.is_empty() {
            return Err(SinkError::Rejected("empty destination".to_string()));
        }
        let endpoint = events_url(&self.base_url, &route.destination)?;
        debug!(endpoint = %endpoint, group_id = %route.group_id, "Opened HTTP event writer");
        Ok(Arc::new(HttpWriter {
            client: self.client.clone(),
            endpoint,
            group_id: route.group_id.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// One destination's writer.
#[derive(Debug)]
pub struct HttpWriter {
    client: reqwest::Client,
    endpoint: Url,
    group_id: String,
    closed: AtomicBool,
}

#[async_trait]
impl EventWriter for HttpWriter {
    async fn write_batch(&self, events: &[Event]) -> Result<u32, SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Eof);
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(HEADER_GROUP_ID, &self.group_id)
            .json(&WriteRequest { events })
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: WriteResponse = response
                .json()
                .await
                .map_err(|e| SinkError::Transport(e.to_string()))?;
            return Ok(body.ack);
        }

        let unavailable = response
            .headers()
            .get(HEADER_UNAVAILABLE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Err(classify_status(status, unavailable.as_deref()))
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Map a non-success response onto a sink error.
fn classify_status(status: StatusCode, unavailable: Option<&str>) -> SinkError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => SinkError::LimitReached,
        StatusCode::GONE => SinkError::Eof,
        StatusCode::SERVICE_UNAVAILABLE => match unavailable {
            Some("limits") => SinkError::LimitUnavailable,
            Some("permits") => SinkError::PermitUnavailable,
            Some("resolver") => SinkError::ResolverUnavailable,
            _ => SinkError::Transport(status.to_string()),
        },
        s if s.is_client_error() => SinkError::Rejected(s.to_string()),
        s => SinkError::Transport(s.to_string()),
    }
}
