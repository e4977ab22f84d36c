//! Fake event intake API.
//!
//! Records every batch written to `POST /v1/events/{destination}` and
//! answers with `{"ack": n}` unless a scripted status is queued.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chanrelay_proto::Event;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;

const HEADER_GROUP_ID: &str = "x-chanrelay-group-id";

/// One accepted (or refused) write.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct ReceivedBatch {
    pub destination: String,
    pub group_id: String,
    pub events: Vec<Event>,
    pub accepted: bool,
}

#[derive(Default)]
struct IntakeState {
    scripted: VecDeque<StatusCode>,
    batches: Vec<ReceivedBatch>,
}

#[derive(Deserialize)]
struct WriteRequest {
    events: Vec<Event>,
}

/// In-process intake API.
#[derive(Clone)]
pub struct FakeIntake {
    state: Arc<Mutex<IntakeState>>,
    pub url: String,
}

impl FakeIntake {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(IntakeState::default()));
        let app = Router::new()
            .route("/v1/events/:destination", post(write))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind intake");
        let url = format!("http://{}", listener.local_addr().expect("intake addr"));
        tokio::spawn(async move { axum::serve(listener, app).await });
        Self { state, url }
    }

    /// Answer the next write with `status` instead of an ack.
    #[allow(dead_code)]
    pub fn fail_next(&self, status: StatusCode) {
        self.state.lock().scripted.push_back(status);
    }

    #[allow(dead_code)]
    pub fn batches(&self) -> Vec<ReceivedBatch> {
        self.state.lock().batches.clone()
    }

    /// Events from accepted writes, in arrival order.
    #[allow(dead_code)]
    pub fn delivered(&self) -> Vec<(ReceivedBatch, Event)> {
        self.batches()
            .into_iter()
            .filter(|b| b.accepted)
            .flat_map(|b| {
                b.events
                    .clone()
                    .into_iter()
                    .map(move |e| (b.clone(), e))
            })
            .collect()
    }
}

async fn write(
    State(state): State<Arc<Mutex<IntakeState>>>,
    Path(destination): Path<String>,
    headers: HeaderMap,
    Json(req): Json<WriteRequest>,
) -> Response {
    let group_id = headers
        .get(HEADER_GROUP_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut st = state.lock();
    let scripted = st.scripted.pop_front();
    let ack = req.events.len();
    st.batches.push(ReceivedBatch {
        destination,
        group_id,
        events: req.events,
        accepted: scripted.is_none(),
    });

    match scripted {
        Some(status) => (status, Json(json!({ "error": "scripted failure" }))).into_response(),
        None => Json(json!({ "ack": ack })).into_response(),
    }
}
