//! Message delivery: convert, route, write.
//!
//! [`DeliveryPipeline::handle`] is the per-message path. Drops (unsupported
//! content, tag veto, no body, unknown channel) return `Ok(())`. Sink
//! failures are split by [`SinkError::disposition`]: reopen-class errors
//! invalidate the cached writer and surface at once, everything else is
//! retried on the same writer under the bounded [`RetryPolicy`].

pub mod retry;
pub mod writers;

use self::retry::{RetryDecision, RetryPolicy};
use crate::convert::EventConverter;
use crate::convert::attributes::ATTR_TIME;
use crate::error::DeliveryError;
use crate::sink::{Disposition, SinkError};
use crate::state::{SharedState, SharedWriter};
use chanrelay_proto::{Event, Message};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// Converts messages and delivers them to the sink.
pub struct DeliveryPipeline {
    converter: EventConverter,
    state: Arc<SharedState>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl DeliveryPipeline {
    pub fn new(
        converter: EventConverter,
        state: Arc<SharedState>,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            converter,
            state,
            retry,
            cancel,
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Deliver one message from `channel_id`.
    pub async fn handle(&self, channel_id: i64, msg: &Message) -> Result<(), DeliveryError> {
        self.deliver(channel_id, msg)
            .instrument(crate::telemetry::spans::delivery(channel_id, msg.id))
            .await
    }

    async fn deliver(&self, channel_id: i64, msg: &Message) -> Result<(), DeliveryError> {
        let source = self.state.source_link(channel_id).await.unwrap_or_default();
        let Some(evt) = self.converter.convert(&source, msg) else {
            return Ok(());
        };
        let Some(route) = self
            .state
            .touch(channel_id, evt.timestamp_attribute(ATTR_TIME))
            .await
        else {
            info!(channel_id, message_id = msg.id, "Channel is not joined, dropping");
            crate::metrics::record_drop("unknown_channel");
            return Ok(());
        };
        // The channel counts as active even when there is nothing to write.
        if !evt.has_body() {
            debug!(channel_id, event_id = %evt.id, "Event has no body, dropping");
            crate::metrics::record_drop("no_body");
            return Ok(());
        }

        let writer = match self.state.acquire_writer(channel_id).await {
            Ok(Some(writer)) => writer,
            Ok(None) => {
                info!(channel_id, "Channel left before delivery, dropping");
                crate::metrics::record_drop("unknown_channel");
                return Ok(());
            }
            Err(source) => {
                crate::metrics::record_delivery_failure(source.error_code());
                return Err(DeliveryError::Open { channel_id, source });
            }
        };

        let started = Instant::now();
        let result = self.write(&writer, &evt).await;
        crate::metrics::observe_delivery(started.elapsed());

        match result {
            Ok(()) => {
                crate::metrics::record_delivered();
                debug!(
                    channel_id,
                    event_id = %evt.id,
                    group_id = %route.group_id,
                    destination = %route.destination,
                    "Delivered event"
                );
                Ok(())
            }
            Err(source) => {
                crate::metrics::record_delivery_failure(source.error_code());
                if source.disposition() == Disposition::Reopen {
                    warn!(channel_id, event_id = %evt.id, error = %source, "Writer unusable, invalidating");
                    self.state.invalidate(channel_id).await;
                }
                Err(DeliveryError::Write {
                    channel_id,
                    event_id: evt.id,
                    source,
                })
            }
        }
    }

    /// Write a single-event batch, retrying retry-class failures.
    async fn write(&self, writer: &SharedWriter, evt: &Event) -> Result<(), SinkError> {
        let batch = Arc::new([evt.clone()]);
        self.retry
            .run(
                &self.cancel,
                || write_once(writer.clone(), batch.clone()),
                |e: &SinkError| match e.disposition() {
                    Disposition::Reopen => RetryDecision::Abort,
                    Disposition::Retry => RetryDecision::Retry,
                },
            )
            .await
    }
}

async fn write_once(writer: SharedWriter, batch: Arc<[Event; 1]>) -> Result<(), SinkError> {
    match writer.write_batch(&batch[..]).await? {
        0 => Err(SinkError::NoAck),
        _ => Ok(()),
    }
}
