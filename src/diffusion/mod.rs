// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Depth-conditioned image-to-image generation

pub mod depth2img;
pub mod noise;
pub mod pipeline;
pub mod scheduler;

pub use depth2img::OnnxDepth2ImgPipeline;
pub use noise::NoiseGenerator;
pub use pipeline::{
    Depth2ImgOutput, Depth2ImgRequest, DepthToImage, DEFAULT_GUIDANCE_SCALE, DEFAULT_STEPS,
    DEFAULT_STRENGTH,
};
pub use scheduler::{PndmConfig, PndmScheduler};
