// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP error mapping
//!
//! Clients only ever see a fixed message per [`ErrorCode`]; the underlying
//! error text is logged with the request id and kept server-side.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, warn};
use uuid::Uuid;

use super::image_fetch::FetchError;
use crate::session::{LifecycleError, PoolError};
use crate::vision::ImageError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidUrl,
    FetchFailed,
    InvalidRequest,
    ImageDecodeFailed,
    InferenceFailed,
    Overloaded,
    ModelNotReady,
    NotFound,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidUrl => "INVALID_URL",
            ErrorCode::FetchFailed => "FETCH_FAILED",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::ImageDecodeFailed => "IMAGE_DECODE_FAILED",
            ErrorCode::InferenceFailed => "INFERENCE_FAILED",
            ErrorCode::Overloaded => "OVERLOADED",
            ErrorCode::ModelNotReady => "MODEL_NOT_READY",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidUrl | ErrorCode::FetchFailed => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Overloaded | ErrorCode::ModelNotReady => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ImageDecodeFailed | ErrorCode::InferenceFailed | ErrorCode::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Fixed client-facing message
    pub fn public_detail(&self) -> &'static str {
        match self {
            ErrorCode::InvalidUrl => "Invalid URL format",
            ErrorCode::FetchFailed => "Could not fetch image from URL",
            ErrorCode::InvalidRequest => "Request is missing or has malformed fields",
            ErrorCode::ImageDecodeFailed => "Could not decode image",
            ErrorCode::InferenceFailed => "Model inference failed",
            ErrorCode::Overloaded => "Inference queue is full, retry later",
            ErrorCode::ModelNotReady => "Models are not loaded",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::Internal => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub detail: String,
    pub code: ErrorCode,
    pub request_id: String,
}

#[derive(Debug, Clone)]
pub struct ApiError {
    code: ErrorCode,
    field: Option<String>,
    internal: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, internal: impl Into<String>) -> Self {
        Self {
            code,
            field: None,
            internal: internal.into(),
        }
    }

    /// Missing or malformed request field
    pub fn invalid_request(field: impl Into<String>, internal: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidRequest,
            field: Some(field.into()),
            internal: internal.into(),
        }
    }

    pub fn inference(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InferenceFailed, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Internal, err.to_string())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, what)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Server-side detail, never sent to clients
    pub fn internal_detail(&self) -> &str {
        &self.internal
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn public_detail(&self) -> String {
        match &self.field {
            Some(field) => format!("{}: {}", self.code.public_detail(), field),
            None => self.code.public_detail().to_string(),
        }
    }

    pub fn to_response(&self, request_id: &str) -> ErrorResponse {
        ErrorResponse {
            detail: self.public_detail(),
            code: self.code,
            request_id: request_id.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.internal)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let status = self.status_code();
        if status.is_server_error() {
            error!(request_id = %request_id, code = %self.code, "{}", self.internal);
        } else {
            warn!(request_id = %request_id, code = %self.code, "{}", self.internal);
        }

        let mut response = (status, Json(self.to_response(&request_id))).into_response();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        Self::new(ErrorCode::ModelNotReady, err.to_string())
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Overloaded => Self::new(ErrorCode::Overloaded, err.to_string()),
            PoolError::WorkerFailed(_) => Self::inference(err),
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::EncodeFailed(_) => Self::internal(err),
            _ => Self::new(ErrorCode::ImageDecodeFailed, err.to_string()),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl(_) => Self::new(ErrorCode::InvalidUrl, err.to_string()),
            _ => Self::new(ErrorCode::FetchFailed, err.to_string()),
        }
    }
}
