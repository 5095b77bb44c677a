// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Monocular depth estimation (DPT) and depth-map conditioning

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Luma};
use ndarray::{Array2, Array4, Axis, Ix2};
use ort::value::Value;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::models::{OnnxModel, SessionOptions};
use crate::vision::vit_gpt2::preprocessing::SizeSpec;

/// Default DPT input size
pub const DEPTH_INPUT_SIZE: u32 = 384;

/// `feature_extractor/preprocessor_config.json`
#[derive(Debug, Clone, Deserialize)]
pub struct DepthProcessorConfig {
    #[serde(default = "default_true")]
    pub do_resize: bool,
    #[serde(default = "default_size")]
    pub size: SizeSpec,
    #[serde(default)]
    pub keep_aspect_ratio: bool,
    #[serde(default = "default_multiple")]
    pub ensure_multiple_of: u32,
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f32,
    #[serde(default = "default_true")]
    pub do_normalize: bool,
    #[serde(default = "default_half")]
    pub image_mean: [f32; 3],
    #[serde(default = "default_half")]
    pub image_std: [f32; 3],
}

fn default_true() -> bool {
    true
}

fn default_size() -> SizeSpec {
    SizeSpec::Square(DEPTH_INPUT_SIZE)
}

fn default_multiple() -> u32 {
    1
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

fn default_half() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

impl Default for DepthProcessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: default_size(),
            keep_aspect_ratio: false,
            ensure_multiple_of: 1,
            rescale_factor: default_rescale_factor(),
            do_normalize: true,
            image_mean: default_half(),
            image_std: default_half(),
        }
    }
}

impl DepthProcessorConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .context(format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).context(format!("Failed to parse {}", path.display()))
    }

    /// Output size for an input image
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        if !self.do_resize {
            return (width, height);
        }
        let (target_w, target_h) = self.size.dimensions();
        let (mut scale_w, mut scale_h) = (
            target_w as f32 / width.max(1) as f32,
            target_h as f32 / height.max(1) as f32,
        );
        if self.keep_aspect_ratio {
            // Scale as little as possible
            if (1.0 - scale_w).abs() < (1.0 - scale_h).abs() {
                scale_h = scale_w;
            } else {
                scale_w = scale_h;
            }
        }
        let multiple = self.ensure_multiple_of.max(1);
        let constrain = |v: f32| -> u32 {
            let m = multiple as f32;
            ((v / m).round() * m).max(m) as u32
        };
        (constrain(scale_w * width as f32), constrain(scale_h * height as f32))
    }

    pub fn preprocess(&self, image: &DynamicImage) -> Array4<f32> {
        let (w, h) = self.target_size(image.width(), image.height());
        let rgb = image.resize_exact(w, h, FilterType::CatmullRom).to_rgb8();

        let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                let mut v = pixel[c] as f32 * self.rescale_factor;
                if self.do_normalize {
                    v = (v - self.image_mean[c]) / self.image_std[c];
                }
                tensor[[0, c, y as usize, x as usize]] = v;
            }
        }
        tensor
    }
}

/// Min-max scale into `[lo, hi]`; a flat input maps to the midpoint
fn rescale(values: &[f32], lo: f32, hi: f32) -> Vec<f32> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range > f32::EPSILON {
        values.iter().map(|v| lo + (hi - lo) * (v - min) / range).collect()
    } else {
        vec![(lo + hi) / 2.0; values.len()]
    }
}

/// Resize a raw depth map to latent size and scale it to `[-1, 1]`
pub fn depth_to_condition(depth: &Array2<f32>, width: u32, height: u32) -> Result<Array4<f32>> {
    let (rows, cols) = depth.dim();
    let flat: Vec<f32> = depth.iter().copied().collect();

    // Float resampling clamps to [0, 1], so bring the map into that range first
    let buffer: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_raw(cols as u32, rows as u32, rescale(&flat, 0.0, 1.0))
            .context("Depth map buffer size mismatch")?;
    let resized = imageops::resize(&buffer, width, height, FilterType::CatmullRom);

    let normalized = rescale(resized.as_raw(), -1.0, 1.0);
    Array4::from_shape_vec((1, 1, height as usize, width as usize), normalized)
        .context("Failed to shape depth condition")
}

#[derive(Debug)]
pub struct DepthEstimator {
    model: OnnxModel,
    processor: DepthProcessorConfig,
    input_name: String,
}

impl DepthEstimator {
    pub fn load(path: &Path, processor: DepthProcessorConfig, options: &SessionOptions) -> Result<Self> {
        let model = OnnxModel::load("depth estimator", path, options)?;
        let input_name = model.input_name(0).unwrap_or("pixel_values").to_string();
        Ok(Self {
            model,
            processor,
            input_name,
        })
    }

    /// Relative depth `[H, W]` at the processor resolution
    pub fn estimate(&self, image: &DynamicImage) -> Result<Array2<f32>> {
        let pixel_values = self.processor.preprocess(image);
        let mut session = self.model.session()?;
        let outputs = session
            .run(ort::inputs![&self.input_name => Value::from_array(pixel_values)?])
            .context("Depth estimator inference failed")?;

        let mut depth = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract predicted depth")?
            .to_owned();
        debug!("Predicted depth shape: {:?}", depth.shape());

        // [B, H, W] or [B, 1, H, W] -> [H, W]
        while depth.ndim() > 2 {
            depth = depth.index_axis_move(Axis(0), 0);
        }
        let depth = depth
            .into_dimensionality::<Ix2>()
            .context("Unexpected depth output rank")?;
        Ok(depth)
    }

    /// Depth map resized to `width`x`height` and scaled to `[-1, 1]`
    pub fn condition(&self, image: &DynamicImage, width: u32, height: u32) -> Result<Array4<f32>> {
        let depth = self.estimate(image)?;
        depth_to_condition(&depth, width, height)
    }
}
