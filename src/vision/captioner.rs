// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image-to-text pipeline interface

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// One caption candidate produced by the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionOutput {
    pub generated_text: String,
}

impl CaptionOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            generated_text: text.into(),
        }
    }
}

/// A loaded image captioning pipeline
///
/// Implementations are blocking and are called from the inference pool,
/// never directly from an async handler.
#[cfg_attr(test, mockall::automock)]
pub trait ImageCaptioner: Send + Sync {
    /// Registry name of the underlying model
    fn model_name(&self) -> &str;

    /// Produce caption candidates for an image, best first
    fn caption(&self, image: &DynamicImage) -> anyhow::Result<Vec<CaptionOutput>>;
}
