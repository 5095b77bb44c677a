// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::http_server::AppState;
use crate::session::LifecyclePhase;
use crate::version;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub caption_model: Option<String>,
    pub depth_model: Option<String>,
    pub device: Option<String>,
    pub version: String,
    pub features: Vec<String>,
}

/// GET /health - lifecycle phase and loaded models
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let phase = state.lifecycle.phase().await;
    let session = match phase {
        LifecyclePhase::Ready => state.lifecycle.current().await.ok(),
        _ => None,
    };

    Json(HealthResponse {
        status: phase.as_str().to_string(),
        caption_model: session.as_ref().map(|s| s.caption_model().to_string()),
        depth_model: session.as_ref().map(|s| s.depth_model().to_string()),
        device: session.as_ref().map(|s| s.device().to_string()),
        version: version::VERSION_NUMBER.to_string(),
        features: version::FEATURES.iter().map(|f| f.to_string()).collect(),
    })
}
