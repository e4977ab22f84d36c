//! Channel registry endpoints.

use super::ApiState;
use super::error::ApiError;
use crate::db::{Channel, ChannelFilter, Order};
use crate::services::SearchReport;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Page size when the caller does not ask for one.
const DEFAULT_PAGE_LIMIT: u32 = 100;
/// Hard cap on a single page.
const MAX_PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateChannelRequest {
    /// 0 lets the platform lookup fill it in.
    pub id: i64,
    pub group_id: String,
    pub user_id: Option<String>,
    pub link: String,
    pub sub_id: Option<String>,
    pub terms: Option<String>,
    pub label: Option<String>,
}

impl From<CreateChannelRequest> for Channel {
    fn from(req: CreateChannelRequest) -> Self {
        let mut ch = Channel::new(req.id, req.group_id, req.link, Utc::now());
        ch.name.clear();
        ch.user_id = req.user_id.filter(|u| !u.is_empty());
        ch.sub_id = req.sub_id.filter(|s| !s.is_empty());
        ch.terms = req.terms.filter(|t| !t.is_empty());
        ch.label = req.label.filter(|l| !l.is_empty());
        ch
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub cursor: String,
    pub order: Order,
    pub group_id: String,
    pub user_id: String,
    pub pattern: String,
    pub sub_id: String,
    pub label: String,
    pub id_div: u32,
    pub id_rem: u32,
}

impl ListQuery {
    fn filter(&self) -> ChannelFilter {
        ChannelFilter {
            id_div: self.id_div,
            id_rem: self.id_rem,
            group_id: self.group_id.clone(),
            user_id: self.user_id.clone(),
            pattern: self.pattern.clone(),
            sub_id: self.sub_id.clone(),
            label: self.label.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelPage {
    pub channels: Vec<Channel>,
    /// Cursor for the next page; absent when this page was the last one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub group_id: String,
    pub sub_id: String,
    pub terms: String,
    pub limit: Option<u32>,
}

/// `POST /v1/channels`
pub async fn create(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    let created = state.channels.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /v1/channels/:link`
pub async fn read(
    State(state): State<Arc<ApiState>>,
    Path(link): Path<String>,
) -> Result<Json<Channel>, ApiError> {
    Ok(Json(state.channels.read(&link).await?))
}

/// `DELETE /v1/channels/:link`
pub async fn delete(
    State(state): State<Arc<ApiState>>,
    Path(link): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.channels.delete(&link).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/channels`
pub async fn list(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ChannelPage>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ApiError::invalid_argument(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }

    let channels = state
        .channels
        .get_page(&query.filter(), limit, &query.cursor, query.order)
        .await?;
    let next_cursor = (channels.len() == limit as usize)
        .then(|| channels.last().map(|ch| ch.link.clone()))
        .flatten();
    Ok(Json(ChannelPage {
        channels,
        next_cursor,
    }))
}

/// `POST /v1/channels/search`
pub async fn search(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchReport>, ApiError> {
    let limit = req.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    let report = state
        .channels
        .search_and_add(&req.group_id, &req.sub_id, &req.terms, limit)
        .await?;
    Ok(Json(report))
}
