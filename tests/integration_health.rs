#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::todo,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    missing_debug_implementations,
    clippy::cast_precision_loss,
    clippy::clone_on_ref_ptr,
    clippy::match_same_arms,
    clippy::items_after_statements,
    unreachable_pub,
    clippy::print_stdout,
    clippy::similar_names
)]
mod common;

use common::TestApp;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_livez() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(format!("{}/livez", app.mgmt_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readyz_all_healthy() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(format!("{}/readyz", app.mgmt_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok", "database": "ok", "storage": "ok" }));
}

#[tokio::test]
async fn test_readyz_reports_image_host_outage() {
    let app = TestApp::spawn().await;
    app.images.healthy.store(false, Ordering::SeqCst);

    let resp = app.client.get(format!("{}/readyz", app.mgmt_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["storage"], "error");
}

#[tokio::test]
async fn test_readyz_reports_database_outage() {
    let app = TestApp::spawn().await;
    app.messages.fail_ping.store(true, Ordering::SeqCst);

    let resp = app.client.get(format!("{}/readyz", app.mgmt_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["database"], "error");
    assert_eq!(body["storage"], "ok");
}

#[tokio::test]
async fn test_health_is_not_on_api_listener() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(format!("{}/readyz", app.api_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
