//! API integration tests
//!
//! Drives the router directly with `tower::ServiceExt::oneshot`.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{offline_config, StubProber, TestHarness, MEDIA_URL, TOTAL_BYTES};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use skipsplice_media::parse_media_playlist;
use tower::ServiceExt;

async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_to_json(body: Body) -> Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}

fn manifest_uri(params: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("/hls/manifest.m3u8?{query}")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn submit(app: &Router, body: Value) -> (StatusCode, Value) {
    post(app, "/api/segments", body).await
}

/// Operator import; the harness runs without an admin key.
async fn import(app: &Router, body: Value) -> (StatusCode, Value) {
    post(app, "/api/moderation/import", body).await
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app.clone().oneshot(post_json(uri, body)).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestHarness::new().router();

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_manifest_with_explicit_timing_is_spliced() {
    let harness = TestHarness::new();
    let app = harness.router();

    let response = app
        .oneshot(
            Request::get(manifest_uri(&[("url", MEDIA_URL), ("start", "85"), ("end", "145")]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.apple.mpegurl"
    );
    assert_eq!(response.headers()["x-skip-stage"], "spliced");

    let playlist = body_to_string(response.into_body()).await;
    let parsed = parse_media_playlist(&playlist).unwrap();
    assert_eq!(parsed.discontinuity_count(), 1);
    assert!(parsed.total_bytes() <= TOTAL_BYTES);
    assert!(parsed.ended);
    assert!(playlist.contains(MEDIA_URL));
}

#[tokio::test]
async fn test_manifest_without_timing_passes_through() {
    let app = TestHarness::with_prober(offline_config(), StubProber::failing()).router();

    let response = app
        .oneshot(
            Request::get(manifest_uri(&[("url", MEDIA_URL), ("video_id", "tt9999999:1:1")]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-skip-stage"], "pass-through");

    let parsed = parse_media_playlist(&body_to_string(response.into_body()).await).unwrap();
    assert_eq!(parsed.discontinuity_count(), 0);
    assert!(!parsed.segments.is_empty());
}

#[tokio::test]
async fn test_manifest_uses_community_timing() {
    let harness = TestHarness::new();
    let app = harness.router();

    let (status, body) = import(
        &app,
        json!({"videoId": "tt1234567:1:2", "start": 30.0, "end": 90.0, "source": "imported"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["verified"], true);

    let response = app
        .oneshot(
            Request::get(manifest_uri(&[("url", MEDIA_URL), ("video_id", "tt1234567:1:2")]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-skip-stage"], "spliced");
    let parsed = parse_media_playlist(&body_to_string(response.into_body()).await).unwrap();
    let tail = parsed.segments.last().unwrap();
    assert_eq!(tail.byte_range.map(|r| r.0), Some(90_000));
}

#[tokio::test]
async fn test_manifest_rejects_internal_urls() {
    let app = TestHarness::new().router();

    for url in ["http://127.0.0.1/a.mkv", "http://169.254.169.254/latest", "file:///etc/passwd"] {
        let response = app
            .clone()
            .oneshot(
                Request::get(manifest_uri(&[("url", url)]))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{url}");
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["code"], "validation_error");
    }
}

#[tokio::test]
async fn test_manifest_rejects_bad_video_id() {
    let app = TestHarness::new().router();

    let response = app
        .oneshot(
            Request::get(manifest_uri(&[("url", MEDIA_URL), ("video_id", "tt1:x:1")]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_then_duplicate() {
    let app = TestHarness::new().router();

    let (status, body) = submit(
        &app,
        json!({"videoId": "tt1234567:1:2", "start": 100.0, "end": 160.0, "source": "user-42"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["videoId"], "tt1234567:1:2");
    assert_eq!(body["label"], "Intro");
    assert_eq!(body["verified"], false);

    let (status, body) = submit(
        &app,
        json!({"videoId": "tt1234567:1:2", "start": 100.4, "end": 160.4, "source": "user-7"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["duplicate"], true);

    let response = app
        .oneshot(
            Request::get("/api/segments/tt1234567:1:2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let segments = body_to_json(response.into_body()).await;
    assert_eq!(segments.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_submit_validation_errors() {
    let app = TestHarness::new().router();

    for body in [
        json!({"videoId": "tt1:1:1", "start": 90.0, "end": 30.0, "source": "user-1"}),
        json!({"videoId": "tt1:1:1", "start": 10.0, "end": 11.0, "source": "user-1"}),
        json!({"videoId": "tt1:1:1", "start": 10.0, "end": 70.0, "source": "  "}),
        json!({"videoId": "bad id", "start": 10.0, "end": 70.0, "source": "user-1"}),
    ] {
        let (status, json) = submit(&app, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["code"], "validation_error");
    }
}

#[tokio::test]
async fn test_public_submit_cannot_claim_system_identity() {
    let app = TestHarness::new().router();

    for source in ["aniskip", "imported", "AniSkip"] {
        let (status, body) = submit(
            &app,
            json!({"videoId": "tt1234567:1:2", "start": 30.0, "end": 90.0, "source": source}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{source}");
        assert_eq!(body["code"], "validation_error");
    }

    let response = app
        .oneshot(Request::get("/api/timing/tt1234567:1:2").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_series_submission_overlays_every_episode() {
    let app = TestHarness::new().router();

    let (status, _) = submit(
        &app,
        json!({
            "videoId": "tt7654321:1:1",
            "start": 0.0,
            "end": 60.0,
            "source": "user-3",
            "applyToSeries": true
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::get("/api/segments/tt7654321:3:8")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let segments = body_to_json(response.into_body()).await;
    let segments = segments.as_array().unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0]["videoId"], "tt7654321:3:8");
    assert_eq!(segments[0]["seriesSkip"], true);
}

#[tokio::test]
async fn test_report_segment() {
    let app = TestHarness::new().router();
    submit(
        &app,
        json!({"videoId": "tt1234567:1:2", "start": 30.0, "end": 90.0, "source": "user-1"}),
    )
    .await;

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/segments/tt1234567:1:2/0/report")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await["reported"], true);

    let response = app
        .oneshot(
            Request::post("/api/segments/tt1234567:1:2/5/report")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_to_json(response.into_body()).await["reported"], false);
}

#[tokio::test]
async fn test_timing_lookup() {
    let app = TestHarness::new().router();

    let response = app
        .clone()
        .oneshot(Request::get("/api/timing/tt1234567:1:2").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_to_json(response.into_body()).await["code"], "not_found");

    import(
        &app,
        json!({"videoId": "tt1234567:1:2", "start": 30.0, "end": 90.0, "source": "imported"}),
    )
    .await;

    let response = app
        .oneshot(Request::get("/api/timing/tt1234567:1:2").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let timing = body_to_json(response.into_body()).await;
    assert_eq!(timing["kind"], "community");
    assert_eq!(timing["start"], 30.0);
    assert_eq!(timing["source"], "imported");
}
