//! Control plane: channel registry and login relay over JSON/HTTP.
//!
//! | Method | Path                   | Operation                  |
//! |--------|------------------------|----------------------------|
//! | POST   | `/v1/channels`         | register a channel         |
//! | GET    | `/v1/channels`         | list a page of channels    |
//! | GET    | `/v1/channels/:link`   | read one channel           |
//! | DELETE | `/v1/channels/:link`   | delete one channel         |
//! | POST   | `/v1/channels/search`  | search-driven discovery    |
//! | POST   | `/v1/login`            | relay a platform login code|
//!
//! Every request is bounded by the configured timeout and aborted with
//! `cancelled` once shutdown starts.

mod channels;
mod error;
mod login;

pub use channels::{ChannelPage, CreateChannelRequest, ListQuery, SearchRequest};
pub use error::{ApiError, ApiStatus};
pub use login::{LoginRelay, LoginRequest, LoginResponse};

use crate::error::ServiceError;
use crate::services::ChannelService;
use crate::telemetry::spans;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info};

/// Shared state behind every control-plane handler.
pub struct ApiState {
    pub channels: ChannelService,
    pub login: Arc<LoginRelay>,
    pub request_timeout: Duration,
    pub cancel: CancellationToken,
}

/// Build the control-plane router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/v1/channels", post(channels::create).get(channels::list))
        .route("/v1/channels/search", post(channels::search))
        .route(
            "/v1/channels/:link",
            get(channels::read).delete(channels::delete),
        )
        .route("/v1/login", post(login::submit))
        .layer(middleware::from_fn_with_state(state.clone(), bound_request))
        .with_state(state)
}

/// Apply the request deadline and shutdown cancellation to one request.
async fn bound_request(State(state): State<Arc<ApiState>>, req: Request, next: Next) -> Response {
    let span = spans::request(req.method().as_str(), req.uri().path());
    let work = next.run(req).instrument(span);

    tokio::select! {
        _ = state.cancel.cancelled() => {
            ApiError::from(ServiceError::Cancelled).into_response()
        }
        result = tokio::time::timeout(state.request_timeout, work) => match result {
            Ok(response) => response,
            Err(_) => {
                debug!(timeout_ms = state.request_timeout.as_millis() as u64, "Request deadline exceeded");
                ApiError::from(ServiceError::DeadlineExceeded).into_response()
            }
        },
    }
}

/// Serve the control plane on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ApiState>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Control plane listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
