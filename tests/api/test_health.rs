// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! GET /health and lifecycle gating of the inference routes

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use fabstir_image_node::{
    api::{create_router, AppState},
    session::SessionLifecycle,
};
use std::sync::Arc;
use tower::ServiceExt;

use crate::common::*;

fn health_request() -> Request<Body> {
    Request::builder().uri("/health").body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_reports_ready_session() {
    let (app, _, _) = default_app().await;

    let response = app.router.oneshot(health_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ready");
    assert_eq!(json["captionModel"], "fake/captioner");
    assert_eq!(json["depthModel"], "fake/depth2img");
    assert_eq!(json["device"], "cpu");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    let features = json["features"].as_array().unwrap();
    assert!(features.iter().any(|f| f == "depth2img"));
    assert!(features.iter().any(|f| f == "caption-from-url"));
}

#[tokio::test]
async fn test_uninitialized_session_is_not_ready() {
    let lifecycle = Arc::new(SessionLifecycle::new());
    let state = AppState::new(test_config(), lifecycle, None).unwrap();
    let router = create_router(state).unwrap();

    let response = router.clone().oneshot(health_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "uninitialized");
    assert!(json["captionModel"].is_null());

    let request = MultipartBuilder::default()
        .file("file", &black_pixel_png())
        .into_request("/upload/");
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "MODEL_NOT_READY");
    assert_eq!(json["detail"], "Models are not loaded");
}

#[tokio::test]
async fn test_requests_after_shutdown_are_rejected() {
    let (app, captioner, depth2img) = default_app().await;
    assert!(app.lifecycle.shutdown().await);

    let response = app.router.clone().oneshot(health_request()).await.unwrap();
    assert_eq!(body_json(response).await["status"], "shutdown");

    let upload = MultipartBuilder::default()
        .file("file", &black_pixel_png())
        .into_request("/upload/");
    let response = app.router.clone().oneshot(upload).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let generate = MultipartBuilder::default()
        .file("file", &black_pixel_png())
        .text("prompt", "x")
        .into_request("/generate/");
    let response = app.router.oneshot(generate).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "MODEL_NOT_READY");

    assert_eq!(captioner.calls(), 0);
    assert!(depth2img.requests().is_empty());
}
