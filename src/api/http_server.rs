// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Router assembly and shared handler state

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;

use super::caption::{caption_url_handler, caption_upload_handler};
use super::generate::{generate_handler, get_output_handler};
use super::handlers::health_handler;
use super::image_fetch::ImageFetcher;
use crate::config::ServerConfig;
use crate::session::{InferencePool, SessionLifecycle};
use crate::storage::OutputStore;

/// Room for multipart boundaries and the text fields next to the file
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<SessionLifecycle>,
    pub pool: InferencePool,
    pub fetcher: ImageFetcher,
    pub output_store: Option<OutputStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        lifecycle: Arc<SessionLifecycle>,
        output_store: Option<OutputStore>,
    ) -> Result<Self> {
        let pool = InferencePool::new(config.max_concurrent_inferences, config.max_queued_inferences);
        let fetcher = ImageFetcher::new(config.fetch_timeout(), config.max_image_bytes)
            .context("Failed to build HTTP client")?;
        Ok(Self {
            lifecycle,
            pool,
            fetcher,
            output_store,
            config: Arc::new(config),
        })
    }
}

/// Single allowed origin with credentials; methods and headers are mirrored
pub fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("Invalid CORS origin '{}'", origin))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

pub fn create_router(state: AppState) -> Result<Router> {
    let cors = cors_layer(&state.config.cors_origin)?;
    let body_limit = state.config.max_image_bytes + MULTIPART_OVERHEAD_BYTES;

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/caption/", post(caption_url_handler))
        .route("/upload/", post(caption_upload_handler))
        .route("/generate/", post(generate_handler));

    if state.output_store.is_some() {
        router = router.route("/outputs/:file", get(get_output_handler));
    }

    Ok(router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}
