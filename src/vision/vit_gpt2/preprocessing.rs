// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the ViT/Swin caption encoder

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use serde::Deserialize;
use std::path::Path;

/// Default encoder input size
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Default normalization (ViT checkpoints use 0.5 for mean and std)
pub const DEFAULT_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
pub const DEFAULT_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// `size` appears either as a bare integer or as a height/width object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Square(u32),
    HeightWidth { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
}

impl SizeSpec {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SizeSpec::Square(s) => (*s, *s),
            SizeSpec::HeightWidth { height, width } => (*width, *height),
            SizeSpec::ShortestEdge { shortest_edge } => (*shortest_edge, *shortest_edge),
        }
    }
}

/// Subset of `preprocessor_config.json` the encoder needs
#[derive(Debug, Clone, Deserialize)]
pub struct ImageProcessorConfig {
    #[serde(default = "default_true")]
    pub do_resize: bool,
    #[serde(default = "default_size")]
    pub size: SizeSpec,
    #[serde(default = "default_true")]
    pub do_rescale: bool,
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f32,
    #[serde(default = "default_true")]
    pub do_normalize: bool,
    #[serde(default = "default_mean")]
    pub image_mean: [f32; 3],
    #[serde(default = "default_std")]
    pub image_std: [f32; 3],
}

fn default_true() -> bool {
    true
}

fn default_size() -> SizeSpec {
    SizeSpec::Square(DEFAULT_INPUT_SIZE)
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

fn default_mean() -> [f32; 3] {
    DEFAULT_MEAN
}

fn default_std() -> [f32; 3] {
    DEFAULT_STD
}

impl Default for ImageProcessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: default_size(),
            do_rescale: true,
            rescale_factor: default_rescale_factor(),
            do_normalize: true,
            image_mean: DEFAULT_MEAN,
            image_std: DEFAULT_STD,
        }
    }
}

impl ImageProcessorConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .context(format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).context(format!("Failed to parse {}", path.display()))
    }

    /// Convert an image into an NCHW `[1, 3, H, W]` tensor
    pub fn preprocess(&self, image: &DynamicImage) -> Array4<f32> {
        let resized = if self.do_resize {
            let (w, h) = self.size.dimensions();
            image.resize_exact(w, h, FilterType::Triangle)
        } else {
            image.clone()
        };
        let rgb = resized.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);

        let scale = if self.do_rescale { self.rescale_factor } else { 1.0 };
        let mut tensor = Array4::<f32>::zeros((1, 3, height, width));

        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                let mut value = pixel[c] as f32 * scale;
                if self.do_normalize {
                    value = (value - self.image_mean[c]) / self.image_std[c];
                }
                tensor[[0, c, y as usize, x as usize]] = value;
            }
        }

        tensor
    }
}
