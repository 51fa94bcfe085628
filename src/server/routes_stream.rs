//! Spliced HLS manifest endpoint.

use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use skipsplice_core::VideoId;

use crate::server::{AppContext, AppError};
use crate::splice::StreamRequest;

/// Response header naming the ladder stage that produced the manifest.
pub const SKIP_STAGE_HEADER: HeaderName = HeaderName::from_static("x-skip-stage");

pub fn stream_routes() -> Router<AppContext> {
    Router::new().route("/hls/manifest.m3u8", get(manifest))
}

#[derive(Debug, Deserialize)]
struct ManifestQuery {
    url: String,
    video_id: Option<String>,
    start: Option<f64>,
    end: Option<f64>,
}

async fn manifest(
    State(ctx): State<AppContext>,
    Query(query): Query<ManifestQuery>,
) -> Result<Response, AppError> {
    let video_id = match query.video_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(raw.parse::<VideoId>()?),
        _ => None,
    };

    let outcome = ctx
        .orchestrator
        .manifest(StreamRequest {
            url: query.url,
            video_id,
            start: query.start,
            end: query.end,
        })
        .await?;

    tracing::debug!(stage = %outcome.stage, cached = outcome.cached, "Manifest served");

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(skipsplice_media::CONTENT_TYPE),
            ),
            (SKIP_STAGE_HEADER, HeaderValue::from_static(outcome.stage.as_str())),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        outcome.playlist,
    )
        .into_response())
}
