// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod caption;
pub mod errors;
pub mod generate;
pub mod handlers;
pub mod http_server;
pub mod image_fetch;

pub use caption::{caption_upload_handler, caption_url_handler, CaptionResponse};
pub use errors::{ApiError, ErrorCode, ErrorResponse};
pub use generate::{generate_handler, get_output_handler, GenerateRequest, GenerateResponse};
pub use handlers::{health_handler, HealthResponse};
pub use http_server::{cors_layer, create_router, AppState};
pub use image_fetch::{is_url, FetchError, ImageFetcher};
