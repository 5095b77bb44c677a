// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Depth-guided image-to-image pipeline interface

use image::DynamicImage;

/// Default fraction of the schedule applied to the source image
pub const DEFAULT_STRENGTH: f64 = 0.8;

/// Default number of denoising steps
pub const DEFAULT_STEPS: u32 = 50;

/// Default classifier-free guidance scale
pub const DEFAULT_GUIDANCE_SCALE: f32 = 7.5;

/// One generation job
///
/// Values are forwarded as given; range checks belong to the pipeline.
#[derive(Debug, Clone)]
pub struct Depth2ImgRequest {
    pub image: DynamicImage,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub strength: f64,
    pub steps: u32,
    pub guidance_scale: f32,
    /// Fixed seed for reproducible output, random when `None`
    pub seed: Option<u64>,
}

impl Depth2ImgRequest {
    pub fn new(image: DynamicImage, prompt: impl Into<String>) -> Self {
        Self {
            image,
            prompt: prompt.into(),
            negative_prompt: None,
            strength: DEFAULT_STRENGTH,
            steps: DEFAULT_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            seed: None,
        }
    }
}

/// Images produced for one request, in pipeline order
#[derive(Debug, Clone)]
pub struct Depth2ImgOutput {
    pub images: Vec<DynamicImage>,
    /// Seed actually used for the initial noise
    pub seed: u64,
}

impl Depth2ImgOutput {
    /// The image returned to clients (index 0)
    pub fn first(&self) -> Option<&DynamicImage> {
        self.images.first()
    }
}

/// A loaded depth2img pipeline
#[cfg_attr(test, mockall::automock)]
pub trait DepthToImage: Send + Sync {
    /// Registry name of the bundle
    fn model_name(&self) -> &str;

    fn generate(&self, request: &Depth2ImgRequest) -> anyhow::Result<Depth2ImgOutput>;
}
