//! One-shot login code relay.
//!
//! During bootstrap the platform bridge may need a login code that only an
//! operator can supply. The bootstrap registers a waiter with
//! [`LoginRelay::wait`]; the first `POST /v1/login` hands its code over.
//! Anything submitted while nobody waits is refused.

use super::ApiState;
use axum::Json;
use axum::extract::State;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct LoginRelay {
    pending: Mutex<Option<oneshot::Sender<String>>>,
}

impl LoginRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the waiter. A previous waiter, if any, is dropped.
    pub fn wait(&self) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock() = Some(tx);
        rx
    }

    /// Hand `code` to the waiter. Returns false when nobody is waiting.
    pub fn submit(&self, code: String) -> bool {
        let Some(tx) = self.pending.lock().take() else {
            return false;
        };
        tx.send(code).is_ok()
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.lock().is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
}

/// `POST /v1/login`
pub async fn submit(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<LoginRequest>,
) -> Json<LoginResponse> {
    let success = !req.code.is_empty() && state.login.submit(req.code);
    if success {
        info!("Login code relayed");
    } else {
        warn!("Login code refused, no login pending");
    }
    Json(LoginResponse { success })
}
