// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! POST /caption/ and POST /upload/

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::ServiceExt;

use crate::common::*;

fn caption_url_request(query: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/caption/{}", query))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_upload_black_pixel_returns_caption() {
    let (app, captioner, _) = default_app().await;

    let request = MultipartBuilder::default()
        .file("file", &black_pixel_png())
        .into_request("/upload/");
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["caption"], FAKE_CAPTION);
    assert!(!json["caption"].as_str().unwrap().is_empty());
    assert_eq!(captioner.calls(), 1);
}

#[tokio::test]
async fn test_upload_undecodable_bytes_is_500() {
    let (app, captioner, _) = default_app().await;

    let request = MultipartBuilder::default()
        .file("file", b"definitely not an image")
        .into_request("/upload/");
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "IMAGE_DECODE_FAILED");
    assert_eq!(json["detail"], "Could not decode image");
    assert!(json["requestId"].as_str().is_some());
    assert_eq!(captioner.calls(), 0);
}

#[tokio::test]
async fn test_upload_without_file_field_is_422() {
    let (app, _, _) = default_app().await;

    let request = MultipartBuilder::default()
        .text("other", "value")
        .into_request("/upload/");
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_REQUEST");
    assert!(json["detail"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn test_upload_non_multipart_is_422() {
    let (app, _, _) = default_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/upload/")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_caption_rejects_malformed_url() {
    let (app, captioner, _) = default_app().await;

    let response = app
        .router
        .oneshot(caption_url_request("?image_url=not-a-url"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_URL");
    assert!(json["detail"].as_str().unwrap().contains("Invalid URL format"));
    assert_eq!(captioner.calls(), 0);
}

#[tokio::test]
async fn test_caption_rejects_url_without_path() {
    let (app, _, _) = default_app().await;

    for candidate in ["http%3A%2F%2Fexample.com", "example.com%2Fimage.png", "%2Fimage.png"] {
        let response = app
            .router
            .clone()
            .oneshot(caption_url_request(&format!("?image_url={}", candidate)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", candidate);
    }
}

#[tokio::test]
async fn test_caption_missing_image_url_is_422() {
    let (app, _, _) = default_app().await;

    let response = app.router.oneshot(caption_url_request("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("image_url"));
}

#[tokio::test]
async fn test_caption_fetches_and_captions() {
    let (app, captioner, _) = default_app().await;
    let (base, hits) = spawn_image_server(png_bytes(4, 4, [10, 20, 30])).await;

    let response = app
        .router
        .oneshot(caption_url_request(&format!("?image_url={}/image.png", base)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["caption"], FAKE_CAPTION);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(captioner.calls(), 1);
}

#[tokio::test]
async fn test_caption_accepts_form_body() {
    let (app, _, _) = default_app().await;
    let (base, _) = spawn_image_server(black_pixel_png()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/caption/")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(format!("image_url={}/image.png", base)))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_caption_upstream_404_is_400_without_inference() {
    let (app, captioner, _) = default_app().await;
    let (base, _) = spawn_image_server(black_pixel_png()).await;

    let response = app
        .router
        .oneshot(caption_url_request(&format!("?image_url={}/missing.png", base)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "FETCH_FAILED");
    assert_eq!(json["detail"], "Could not fetch image from URL");
    assert_eq!(captioner.calls(), 0);
}

#[tokio::test]
async fn test_caption_oversized_download_is_fetch_failure() {
    let captioner = Arc::new(FakeCaptioner::default());
    let config = fabstir_image_node::config::ServerConfig {
        max_image_bytes: 16,
        ..test_config()
    };
    let app = build_app(config, captioner.clone(), Arc::new(FakeDepth2Img::default()), None).await;
    let (base, _) = spawn_image_server(png_bytes(64, 64, [1, 2, 3])).await;

    let response = app
        .router
        .oneshot(caption_url_request(&format!("?image_url={}/image.png", base)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "FETCH_FAILED");
    assert_eq!(captioner.calls(), 0);
}

#[tokio::test]
async fn test_same_image_same_caption() {
    let (app, _, _) = default_app().await;
    let png = png_bytes(8, 8, [50, 60, 70]);

    let mut captions = Vec::new();
    for _ in 0..2 {
        let request = MultipartBuilder::default()
            .file("file", &png)
            .into_request("/upload/");
        let response = app.router.clone().oneshot(request).await.unwrap();
        captions.push(body_json(response).await["caption"].clone());
    }
    assert_eq!(captions[0], captions[1]);
}

#[tokio::test]
async fn test_inference_failure_does_not_leak_details() {
    let captioner = Arc::new(FakeCaptioner::failing("CUDA error at /srv/secret/weights.onnx"));
    let app = build_app(test_config(), captioner, Arc::new(FakeDepth2Img::default()), None).await;

    let request = MultipartBuilder::default()
        .file("file", &black_pixel_png())
        .into_request("/upload/");
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.contains("INFERENCE_FAILED"));
    assert!(!body.contains("secret"));
    assert!(!body.contains("CUDA"));
}

#[tokio::test]
async fn test_caption_after_shutdown_does_not_fetch() {
    let (app, captioner, _) = default_app().await;
    let (base, hits) = spawn_image_server(png_bytes(4, 4, [10, 20, 30])).await;
    assert!(app.lifecycle.shutdown().await);

    let response = app
        .router
        .clone()
        .oneshot(caption_url_request(&format!("?image_url={}/image.png", base)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "MODEL_NOT_READY");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(captioner.calls(), 0);

    // A malformed URL is still reported as such
    let response = app
        .router
        .oneshot(caption_url_request("?image_url=not-a-url"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_URL");
}
