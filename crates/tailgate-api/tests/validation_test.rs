//! Parameter validator integration tests.

use axum::http::StatusCode;
use tailgate_api::config::Config;
use tailgate_testing::{body_json, req, TestEnv};
use tower::ServiceExt;

#[tokio::test]
async fn missing_prefix_fails_with_machine_readable_reason() {
    let env = TestEnv::new();
    let token = env.issue_token("acct-1");

    let uri = format!("/blob/download?accountID=acct-1&token={token}");
    let response = env.router().oneshot(req("POST", &uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "E1001");
    assert!(body["error"]["message"].as_str().unwrap().contains("prefix"));
}

#[tokio::test]
async fn empty_prefix_is_treated_as_missing() {
    let env = TestEnv::new();
    let token = env.issue_token("acct-1");

    let uri = format!("/blob/download?accountID=acct-1&prefix=%20&token={token}");
    let response = env.router().oneshot(req("POST", &uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn absolute_prefix_is_rejected() {
    let env = TestEnv::new();
    let token = env.issue_token("acct-1");

    let uri = format!("/blob/download?accountID=acct-1&prefix=/etc/passwd&token={token}");
    let response = env.router().oneshot(req("POST", &uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]["message"].as_str().unwrap().contains("relative"));
}

#[tokio::test]
async fn traversal_prefix_is_rejected() {
    let env = TestEnv::new();
    let token = env.issue_token("acct-1");

    let uri = format!("/blob/download?accountID=acct-1&prefix=logs/../../other&token={token}");
    let response = env.router().oneshot(req("POST", &uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validators_run_without_auth_gates() {
    // With auth disabled the validators still guard the archive route.
    let config = Config { disable_auth: true, ..TestEnv::config() };
    let env = TestEnv::with_config(config);

    let response =
        env.router().oneshot(req("POST", "/blob/download?prefix=logs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]["message"].as_str().unwrap().contains("accountID"));
}

#[tokio::test]
async fn auth_gate_runs_before_validators() {
    // A request that is both unauthenticated and invalid fails on auth.
    let env = TestEnv::new();

    let response =
        env.router().oneshot(req("POST", "/blob/download?accountID=acct-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
