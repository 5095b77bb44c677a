// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod server;

pub use server::{
    DevicePreference, ServerConfig, DEFAULT_CAPTION_MODEL, DEFAULT_CORS_ORIGIN,
    DEFAULT_MAX_IMAGE_BYTES, DEFAULT_OUTPUT_MAX_FILES, DEPTH_SOURCE_MODEL,
};
