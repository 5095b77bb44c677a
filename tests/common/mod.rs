// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures: fake pipelines, router setup and request builders
#![allow(dead_code)]

use anyhow::Result;
use axum::{body::Body, http::Request, routing::get, Router};
use fabstir_image_node::{
    api::{create_router, AppState},
    config::ServerConfig,
    diffusion::{Depth2ImgOutput, Depth2ImgRequest, DepthToImage, PndmConfig, PndmScheduler},
    models::ExecutionDevice,
    session::{ModelSession, SessionLifecycle},
    storage::OutputStore,
    vision::{encode_png, CaptionOutput, ImageCaptioner},
};
use image::{DynamicImage, Rgb, RgbImage};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

pub const FAKE_CAPTION: &str = "a black square on a table";

/// Deterministic captioner that counts calls
#[derive(Default)]
pub struct FakeCaptioner {
    pub calls: AtomicUsize,
    pub failure: Option<String>,
}

impl FakeCaptioner {
    pub fn failing(message: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failure: Some(message.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageCaptioner for FakeCaptioner {
    fn model_name(&self) -> &str {
        "fake/captioner"
    }

    fn caption(&self, _image: &DynamicImage) -> Result<Vec<CaptionOutput>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            anyhow::bail!("{}", message);
        }
        Ok(vec![
            CaptionOutput::new(FAKE_CAPTION),
            CaptionOutput::new("an alternative caption"),
        ])
    }
}

/// Captioner that blocks until released, announcing when it starts
pub struct BlockingCaptioner {
    started: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl BlockingCaptioner {
    pub fn new() -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let captioner = Self {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        };
        (captioner, started_rx, release_tx)
    }
}

impl ImageCaptioner for BlockingCaptioner {
    fn model_name(&self) -> &str {
        "fake/blocking"
    }

    fn caption(&self, _image: &DynamicImage) -> Result<Vec<CaptionOutput>> {
        if let Ok(started) = self.started.lock() {
            let _ = started.send(());
        }
        if let Ok(release) = self.release.lock() {
            let _ = release.recv();
        }
        Ok(vec![CaptionOutput::new("released")])
    }
}

/// Parameters a fake generation was called with
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedGeneration {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub strength: f64,
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: Option<u64>,
    pub width: u32,
    pub height: u32,
}

/// Returns a solid image whose red channel is the prompt's first byte
#[derive(Default)]
pub struct FakeDepth2Img {
    pub requests: Mutex<Vec<RecordedGeneration>>,
}

impl FakeDepth2Img {
    pub fn requests(&self) -> Vec<RecordedGeneration> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl DepthToImage for FakeDepth2Img {
    fn model_name(&self) -> &str {
        "fake/depth2img"
    }

    fn generate(&self, request: &Depth2ImgRequest) -> Result<Depth2ImgOutput> {
        // Same schedule checks as the real pipeline
        let mut scheduler = PndmScheduler::new(PndmConfig::default());
        scheduler.set_timesteps(request.steps as usize)?;
        scheduler.timesteps_for_strength(request.strength)?;

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedGeneration {
                prompt: request.prompt.clone(),
                negative_prompt: request.negative_prompt.clone(),
                strength: request.strength,
                steps: request.steps,
                guidance_scale: request.guidance_scale,
                seed: request.seed,
                width: request.image.width(),
                height: request.image.height(),
            });
        }
        let red = request.prompt.bytes().next().unwrap_or(0);
        let image = RgbImage::from_pixel(
            request.image.width(),
            request.image.height(),
            Rgb([red, 0, 0]),
        );
        Ok(Depth2ImgOutput {
            images: vec![DynamicImage::ImageRgb8(image)],
            seed: request.seed.unwrap_or(7),
        })
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        fetch_timeout_secs: 5,
        ..ServerConfig::default()
    }
}

/// Router plus handles for assertions
pub struct TestApp {
    pub router: Router,
    pub lifecycle: Arc<SessionLifecycle>,
}

pub async fn build_app(
    config: ServerConfig,
    captioner: Arc<dyn ImageCaptioner>,
    depth2img: Arc<dyn DepthToImage>,
    output_store: Option<OutputStore>,
) -> TestApp {
    let lifecycle = Arc::new(SessionLifecycle::new());
    lifecycle
        .initialize(ModelSession::new(captioner, depth2img, ExecutionDevice::Cpu))
        .await
        .unwrap();
    let state = AppState::new(config, lifecycle.clone(), output_store).unwrap();
    TestApp {
        router: create_router(state).unwrap(),
        lifecycle,
    }
}

pub async fn default_app() -> (TestApp, Arc<FakeCaptioner>, Arc<FakeDepth2Img>) {
    let captioner = Arc::new(FakeCaptioner::default());
    let depth2img = Arc::new(FakeDepth2Img::default());
    let app = build_app(test_config(), captioner.clone(), depth2img.clone(), None).await;
    (app, captioner, depth2img)
}

pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    encode_png(&image).unwrap()
}

pub fn black_pixel_png() -> Vec<u8> {
    png_bytes(1, 1, [0, 0, 0])
}

/// Hand-built multipart/form-data body
pub struct MultipartBuilder {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartBuilder {
    fn default() -> Self {
        Self {
            boundary: "fabstir-test-boundary".to_string(),
            body: Vec::new(),
        }
    }
}

impl MultipartBuilder {
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"image.png\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Local image server for caption-from-URL tests
///
/// `/image.png` serves `png`, `/missing.png` is a 404. Returns the base URL
/// and a hit counter.
pub async fn spawn_image_server(png: Vec<u8>) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new()
        .route(
            "/image.png",
            get(move || {
                let png = png.clone();
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ([("content-type", "image/png")], png)
                }
            }),
        )
        .route(
            "/missing.png",
            get(|| async { (axum::http::StatusCode::NOT_FOUND, "gone") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), hits)
}
