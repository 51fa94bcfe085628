//! Moderator endpoints, mounted behind the admin key.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use skipsplice_core::{Error, VideoId};

use crate::segments::{ItemRef, ResolveAction, SubmitRequest};
use crate::server::{AppContext, AppError};

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

pub fn moderation_routes() -> Router<AppContext> {
    Router::new()
        .route("/moderation/pending", get(pending))
        .route("/moderation/reported", get(reported))
        .route("/moderation/resolve", post(resolve))
        .route("/moderation/resolve-bulk", post(resolve_bulk))
        .route("/moderation/stats", get(stats))
        .route("/moderation/import", post(import))
        .route("/moderation/series/{video_id}", get(series))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

impl ListQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveRequest {
    video_id: VideoId,
    index: usize,
    action: ResolveAction,
}

#[derive(Debug, Deserialize)]
struct ResolveBulkRequest {
    items: Vec<ItemRef>,
    action: ResolveAction,
}

async fn pending(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ctx.moderation.pending(query.limit())?))
}

async fn reported(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ctx.moderation.reported(query.limit())?))
}

async fn resolve(
    State(ctx): State<AppContext>,
    Json(req): Json<ResolveRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !ctx.moderation.resolve(&req.video_id, req.index, req.action)? {
        return Err(Error::not_found("segment", format!("{}#{}", req.video_id, req.index)).into());
    }
    Ok(Json(json!({ "success": true })))
}

async fn resolve_bulk(
    State(ctx): State<AppContext>,
    Json(req): Json<ResolveBulkRequest>,
) -> Result<impl IntoResponse, AppError> {
    let affected = ctx.moderation.resolve_bulk(&req.items, req.action)?;
    Ok(Json(json!({ "success": true, "affected": affected })))
}

/// Every document of the series `video_id` belongs to.
async fn series(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let video_id: VideoId = video_id.parse()?;
    let docs = ctx.moderation.series_documents(&video_id)?;
    if docs.is_empty() {
        return Err(Error::not_found("series", video_id.to_series()).into());
    }
    Ok(Json(docs))
}

/// Operator import; `source` may name a system identity.
async fn import(
    State(ctx): State<AppContext>,
    Json(req): Json<SubmitRequest>,
) -> Result<Response, AppError> {
    match ctx.moderation.import(req)? {
        Some(segment) => Ok((StatusCode::CREATED, Json(segment)).into_response()),
        None => Ok((StatusCode::OK, Json(json!({ "duplicate": true }))).into_response()),
    }
}

async fn stats(State(ctx): State<AppContext>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ctx.moderation.stats()?))
}
