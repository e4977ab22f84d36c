//! Platform update handlers.
//!
//! The platform pushes every kind of update through one stream. Handlers
//! implement [`UpdateHandler`]; [`listen`] drives a handler over a stream
//! until the stream ends or shutdown is requested.

mod update;

pub use update::UpdateDispatcher;

use crate::error::DeliveryError;
use crate::platform::PlatformError;
use async_trait::async_trait;
use chanrelay_proto::Update;
use futures_util::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Handles a single platform update.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, update: &Update) -> Result<(), DeliveryError>;
}

/// Feed updates to `handler` one at a time.
///
/// Per-update failures and stream errors are logged, never fatal. Returns
/// the number of updates handled.
pub async fn listen<H>(
    handler: &H,
    mut updates: BoxStream<'static, Result<Update, PlatformError>>,
    cancel: CancellationToken,
) -> u64
where
    H: UpdateHandler + ?Sized,
{
    let mut handled = 0u64;
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Update listener cancelled");
                break;
            }
            next = updates.next() => next,
        };

        match next {
            None => {
                info!("Update stream ended");
                break;
            }
            Some(Err(e)) => warn!(error = %e, "Update stream error"),
            Some(Ok(update)) => {
                handled += 1;
                if let Err(e) = handler.handle(&update).await {
                    warn!(update = update.kind(), error = %e, "Failed to handle update");
                }
            }
        }
    }
    handled
}
