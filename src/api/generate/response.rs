// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};

pub const GENERATED_IMAGE_URL_HEADER: &str = "x-generated-image-url";
pub const GENERATION_SEED_HEADER: &str = "x-generation-seed";

/// PNG body plus generation metadata headers
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub png: Vec<u8>,
    pub seed: u64,
    /// Set when the output was persisted
    pub output_url: Option<String>,
}

pub fn png_response(png: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, HeaderValue::from_static("image/png"))], png).into_response()
}

impl IntoResponse for GenerateResponse {
    fn into_response(self) -> Response {
        let mut response = png_response(self.png);
        let headers = response.headers_mut();
        headers.insert(GENERATION_SEED_HEADER, HeaderValue::from(self.seed));
        if let Some(url) = self.output_url {
            if let Ok(value) = HeaderValue::from_str(&url) {
                headers.insert(GENERATED_IMAGE_URL_HEADER, value);
            }
        }
        response
    }
}
