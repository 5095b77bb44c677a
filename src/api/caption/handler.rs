// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption endpoint handlers

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderMap},
    Json,
};
use axum_extra::extract::{multipart::MultipartRejection, Multipart};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::request::{read_upload_file, CaptionUrlRequest, FILE_FIELD};
use super::response::CaptionResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::api::image_fetch::{is_url, FetchError};
use crate::session::ModelSession;
use crate::vision::decode_image_bytes;

/// Decode and caption on the inference pool; candidate 0 is the answer
pub async fn caption_bytes(
    state: &AppState,
    session: Arc<ModelSession>,
    bytes: Vec<u8>,
) -> Result<CaptionResponse, ApiError> {
    let captioner = session.captioner();
    let start = Instant::now();

    let candidates = state
        .pool
        .run(move || -> Result<_, ApiError> {
            let (image, info) = decode_image_bytes(&bytes)?;
            debug!("Captioning {}x{} {:?}", info.width, info.height, info.format);
            captioner
                .caption(&image)
                .map_err(|e| ApiError::inference(format!("{:#}", e)))
        })
        .await??;

    let caption = candidates
        .into_iter()
        .next()
        .map(|candidate| candidate.generated_text)
        .ok_or_else(|| ApiError::inference("Captioner returned no candidates"))?;

    info!("Caption produced in {}ms", start.elapsed().as_millis());
    Ok(CaptionResponse { caption })
}

/// POST /caption/ - caption an image fetched from `image_url`
pub async fn caption_url_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CaptionResponse>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let request = CaptionUrlRequest::from_parts(query.as_deref(), content_type, &body)?;

    // Malformed URL is a 400 even while models are loading; no fetch without models
    if !is_url(&request.image_url) {
        return Err(FetchError::InvalidUrl(request.image_url).into());
    }
    let session = state.lifecycle.current().await?;

    let bytes = state.fetcher.fetch(&request.image_url).await?;
    let response = caption_bytes(&state, session, bytes).await?;
    Ok(Json(response))
}

/// POST /upload/ - caption the uploaded `file`
pub async fn caption_upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CaptionResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::invalid_request(FILE_FIELD, e.to_string()))?;
    let bytes = read_upload_file(multipart).await?;
    let session = state.lifecycle.current().await?;
    let response = caption_bytes(&state, session, bytes).await?;
    Ok(Json(response))
}
