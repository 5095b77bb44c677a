// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation endpoint handlers

use axum::{
    extract::{Path, State},
    response::Response,
};
use axum_extra::extract::{multipart::MultipartRejection, Multipart};
use std::time::Instant;
use tracing::{debug, info};

use super::request::GenerateRequest;
use super::response::{png_response, GenerateResponse};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::{decode_image_bytes, encode_png, to_rgb};

/// POST /generate/ - depth-guided image-to-image
///
/// 1. Parse the form (422 on missing/malformed fields)
/// 2. Decode, convert to RGB and run the pipeline on the inference pool
/// 3. Encode image 0 as PNG, optionally persist it under a fresh id
pub async fn generate_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<GenerateResponse, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::invalid_request("file", e.to_string()))?;
    let mut request = GenerateRequest::from_multipart(multipart).await?;
    debug!(
        "Generate request: prompt_len={}, strength={}, steps={}, guidance={}",
        request.prompt.len(),
        request.strength,
        request.steps,
        request.guidance_scale
    );

    let session = state.lifecycle.current().await?;
    let pipeline = session.depth2img();
    let start = Instant::now();

    let (png, seed) = state
        .pool
        .run(move || -> Result<(Vec<u8>, u64), ApiError> {
            let bytes = std::mem::take(&mut request.file);
            let (image, _) = decode_image_bytes(&bytes)?;
            let pipeline_request = request.into_pipeline_request(to_rgb(&image));

            let output = pipeline
                .generate(&pipeline_request)
                .map_err(|e| ApiError::inference(format!("{:#}", e)))?;
            let image = output
                .first()
                .ok_or_else(|| ApiError::inference("Pipeline returned no images"))?;
            Ok((encode_png(image)?, output.seed))
        })
        .await??;

    let output_url = match &state.output_store {
        Some(store) => {
            let stored = store
                .save_png(&png)
                .await
                .map_err(|e| ApiError::internal(format!("{:#}", e)))?;
            Some(stored.url())
        }
        None => None,
    };

    info!(
        "Generated image in {}ms ({} bytes, seed {})",
        start.elapsed().as_millis(),
        png.len(),
        seed
    );
    Ok(GenerateResponse {
        png,
        seed,
        output_url,
    })
}

/// GET /outputs/{id}.png
pub async fn get_output_handler(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let store = state
        .output_store
        .as_ref()
        .ok_or_else(|| ApiError::not_found("output store disabled"))?;
    let png = store
        .load(&file)
        .await
        .map_err(|e| ApiError::internal(format!("{:#}", e)))?
        .ok_or_else(|| ApiError::not_found(format!("no output '{}'", file)))?;
    Ok(png_response(png))
}
