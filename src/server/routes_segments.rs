//! Public segment API: lookups, submissions and reports.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use skipsplice_core::{Error, VideoId};

use crate::segments::SubmitRequest;
use crate::server::{AppContext, AppError};

pub fn segment_routes() -> Router<AppContext> {
    Router::new()
        .route("/segments", post(submit_segment))
        .route("/segments/{video_id}", get(list_segments))
        .route("/segments/{video_id}/{index}/report", post(report_segment))
        .route("/timing/{video_id}", get(get_timing))
}

async fn list_segments(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let video_id: VideoId = video_id.parse()?;
    let segments = ctx.moderation.segments_for(&video_id)?;
    Ok(Json(segments))
}

async fn submit_segment(
    State(ctx): State<AppContext>,
    Json(req): Json<SubmitRequest>,
) -> Result<Response, AppError> {
    match ctx.moderation.submit(req)? {
        Some(segment) => Ok((StatusCode::CREATED, Json(segment)).into_response()),
        None => Ok((StatusCode::OK, Json(json!({ "duplicate": true }))).into_response()),
    }
}

async fn report_segment(
    State(ctx): State<AppContext>,
    Path((video_id, index)): Path<(String, usize)>,
) -> Result<impl IntoResponse, AppError> {
    let video_id: VideoId = video_id.parse()?;
    let reported = ctx.moderation.report(&video_id, index)?;
    Ok(Json(json!({ "reported": reported })))
}

async fn get_timing(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let video_id: VideoId = video_id.parse()?;
    match ctx.chain.resolve(&video_id).await {
        Some(timing) => Ok(Json(timing)),
        None => Err(Error::not_found("timing", &video_id).into()),
    }
}
