// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! CORS: one configured origin, credentials, mirrored methods and headers

use axum::{
    body::Body,
    http::{Method, Request},
};
use fabstir_image_node::config::ServerConfig;
use std::sync::Arc;
use tower::ServiceExt;

use crate::common::*;

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/upload/")
        .header("origin", origin)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "x-client-trace")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_preflight_from_default_origin() {
    let (app, _, _) = default_app().await;

    let response = app
        .router
        .oneshot(preflight("http://localhost:3000"))
        .await
        .unwrap();
    let headers = response.headers();

    assert_eq!(headers["access-control-allow-origin"], "http://localhost:3000");
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["access-control-allow-methods"], "POST");
    assert_eq!(headers["access-control-allow-headers"], "x-client-trace");
}

#[tokio::test]
async fn test_other_origin_not_allowed() {
    let (app, _, _) = default_app().await;

    let response = app
        .router
        .oneshot(preflight("https://evil.example.com"))
        .await
        .unwrap();
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}

#[tokio::test]
async fn test_configured_origin() {
    let config = ServerConfig {
        cors_origin: "https://studio.example.com".to_string(),
        ..test_config()
    };
    let app = build_app(
        config,
        Arc::new(FakeCaptioner::default()),
        Arc::new(FakeDepth2Img::default()),
        None,
    )
    .await;

    let response = app
        .router
        .clone()
        .oneshot(preflight("https://studio.example.com"))
        .await
        .unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://studio.example.com"
    );

    let response = app
        .router
        .oneshot(preflight("http://localhost:3000"))
        .await
        .unwrap();
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}

#[tokio::test]
async fn test_simple_request_carries_cors_headers() {
    let (app, _, _) = default_app().await;

    let request = Request::builder()
        .uri("/health")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}
