// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption request parsing

use axum_extra::extract::Multipart;

use crate::api::errors::ApiError;

pub const IMAGE_URL_FIELD: &str = "image_url";
pub const FILE_FIELD: &str = "file";

/// `image_url` taken from the query string or an urlencoded form body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionUrlRequest {
    pub image_url: String,
}

fn find_field(encoded: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(encoded)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

impl CaptionUrlRequest {
    /// The query string wins over the body
    pub fn from_parts(
        query: Option<&str>,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<Self, ApiError> {
        let from_query = query.and_then(|q| find_field(q.as_bytes(), IMAGE_URL_FIELD));

        let is_form = content_type
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        let from_body = || {
            if is_form {
                find_field(body, IMAGE_URL_FIELD)
            } else {
                None
            }
        };

        from_query
            .or_else(from_body)
            .map(|image_url| Self { image_url })
            .ok_or_else(|| ApiError::invalid_request(IMAGE_URL_FIELD, "image_url not provided"))
    }
}

/// Read the `file` field of an upload; other fields are ignored
pub async fn read_upload_file(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_request(FILE_FIELD, e.to_string()))?
    {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::invalid_request(FILE_FIELD, e.to_string()))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::invalid_request(FILE_FIELD, "file field not provided"))
}
