use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt; // for `oneshot`

use sf6_tracker::runlog::RunLog;
use sf6_tracker::store::FakeStore;
use sf6_tracker::tunnel::TunnelWatcher;
use sf6_tracker::{create_app, AppState};

/// App with a fake store and no runner: the degraded read-only mode the
/// server enters when scraping is unconfigured.
fn test_state(name: &str) -> (AppState, FakeStore) {
    let store = FakeStore::new();
    let log_path = std::env::temp_dir().join(format!(
        "sf6-tracker-api-{name}-{}.log",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&log_path);
    let state = AppState {
        store: Arc::new(store.clone()),
        runner: None,
        tunnel: Arc::new(
            TunnelWatcher::new("http://127.0.0.1:9/metrics", None)
                .with_polling(1, Duration::ZERO),
        ),
        log: Arc::new(RunLog::open(log_path).unwrap()),
    };
    (state, store)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_works() {
    let (state, _) = test_state("health");
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn schedule_roundtrip() {
    let (state, _) = test_state("schedule");
    let app = create_app(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/schedule")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["run_times"], "09:00,21:00");

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/schedule",
            serde_json::json!({"run_times": "7:30,22:00"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/schedule")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    // Stored verbatim; the scheduler normalizes on each tick.
    assert_eq!(json["run_times"], "7:30,22:00");
}

#[tokio::test]
async fn subject_upsert_and_list() {
    let (state, _) = test_state("subjects");
    let app = create_app(state);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/subjects",
            serde_json::json!({
                "user_code": "1234567890",
                "player_name": "Alpha",
                "note": "main account"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/subjects")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["user_code"], "1234567890");
    assert_eq!(json[0]["player_name"], "Alpha");
    assert_eq!(json[0]["is_active"], true);
}

#[tokio::test]
async fn run_endpoints_answer_503_without_a_runner() {
    let (state, _) = test_state("degraded");
    let app = create_app(state);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/run",
            serde_json::json!({"user_code": "1234567890"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app
        .oneshot(json_request("POST", "/api/run-all", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn log_tail_returns_recent_lines() {
    let (state, _) = test_state("logs");
    state.log.append("first entry");
    state.log.append("second entry");
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/logs?n=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let lines = json["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].as_str().unwrap().ends_with("second entry"));
}

#[tokio::test]
async fn tunnel_refresh_reports_failure_when_metrics_unreachable() {
    let (state, store) = test_state("tunnel");
    let app = create_app(state);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/tunnel/refresh",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["updated"], false);
    assert_eq!(store.fake_public_url(), None);
}
