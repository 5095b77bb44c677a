// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image captioning
//!
//! This module provides:
//! - Image decode/encode helpers shared with generation
//! - The captioning pipeline interface and its ONNX implementation

pub mod captioner;
pub mod image_utils;
pub mod vit_gpt2;

pub use captioner::{CaptionOutput, ImageCaptioner};
pub use image_utils::{decode_image_bytes, detect_format, encode_png, to_rgb, ImageError, ImageInfo};
pub use vit_gpt2::VitGpt2Captioner;
