// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! URL validation and size-capped image download

use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Response body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// True when `candidate` has a scheme, a network location and a path
///
/// `http://host/` passes, `http://host` does not (no path).
pub fn is_url(candidate: &str) -> bool {
    let Ok(parsed) = Url::parse(candidate) else {
        return false;
    };
    if parsed.scheme().is_empty() || parsed.host_str().map_or(true, str::is_empty) {
        return false;
    }

    // The parser normalizes an empty path to "/", so check the raw text
    let Some((_, rest)) = candidate.split_once("://") else {
        return false;
    };
    let netloc_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    netloc_end > 0 && rest[netloc_end..].starts_with('/')
}

/// HTTP client for caption-from-URL requests
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fabstir-image-node/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, max_bytes })
    }

    /// Download `url`, failing on non-2xx status or an oversized body
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if !is_url(url) {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
