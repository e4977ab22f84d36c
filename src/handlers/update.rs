//! New-message filter in front of the delivery pipeline.

use super::UpdateHandler;
use crate::delivery::DeliveryPipeline;
use crate::error::DeliveryError;
use async_trait::async_trait;
use chanrelay_proto::Update;
use std::sync::Arc;
use tracing::trace;

/// Forwards incoming (not self-sent) messages to the pipeline.
pub struct UpdateDispatcher {
    pipeline: Arc<DeliveryPipeline>,
}

impl UpdateDispatcher {
    pub fn new(pipeline: Arc<DeliveryPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl UpdateHandler for UpdateDispatcher {
    async fn handle(&self, update: &Update) -> Result<(), DeliveryError> {
        match update {
            Update::NewMessage { message } if !message.is_outgoing => {
                self.pipeline.handle(message.chat_id, message).await
            }
            other => {
                trace!(update = other.kind(), "Ignoring update");
                Ok(())
            }
        }
    }
}
