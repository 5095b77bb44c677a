// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption endpoints
//!
//! POST /caption/ captions an image fetched from `image_url`;
//! POST /upload/ captions the multipart `file` field.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{caption_upload_handler, caption_url_handler};
pub use request::{read_upload_file, CaptionUrlRequest};
pub use response::CaptionResponse;
