//! Health and readiness probe tests.

use axum::http::StatusCode;
use tailgate_testing::{body_json, get, TestEnv};
use tower::ServiceExt;

#[tokio::test]
async fn healthz_needs_no_auth() {
    let env = TestEnv::new();

    let response = env.router().oneshot(get("/healthz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn readiness_reports_ready_when_collaborators_answer() {
    let env = TestEnv::new();

    let response = env.router().oneshot(get("/ready/healthz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["stream"]["status"], "up");
    assert_eq!(body["checks"]["store"]["status"], "up");
    assert_eq!(body["checks"]["cache"]["status"], "up");
}

#[tokio::test]
async fn readiness_degrades_when_stream_backend_is_down() {
    let env = TestEnv::new();
    env.streams.set_healthy(false);

    let response = env.router().oneshot(get("/ready/healthz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unready");
    assert_eq!(body["checks"]["stream"]["status"], "down");
    assert_eq!(body["checks"]["store"]["status"], "up");
}

#[tokio::test]
async fn readiness_degrades_when_store_is_down() {
    let env = TestEnv::new();
    env.store.set_healthy(false);

    let response = env.router().oneshot(get("/ready/healthz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
