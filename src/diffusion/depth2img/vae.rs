// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Autoencoder halves and pixel/latent conversions

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::{s, Array4, Ix4};
use ort::value::Value;
use std::path::Path;
use tracing::debug;

use crate::diffusion::noise::NoiseGenerator;
use crate::models::{OnnxModel, SessionOptions};

/// Latent scaling factor of the SD2 autoencoder
pub const VAE_SCALING_FACTOR: f32 = 0.18215;

/// Spatial downsampling between pixels and latents
pub const VAE_SCALE_FACTOR: u32 = 8;

/// Latent channels produced by the encoder
pub const LATENT_CHANNELS: usize = 4;

/// Round dimensions down to a multiple of the VAE scale factor
pub fn latent_aligned_size(width: u32, height: u32) -> Result<(u32, u32)> {
    let w = width - width % VAE_SCALE_FACTOR;
    let h = height - height % VAE_SCALE_FACTOR;
    if w == 0 || h == 0 {
        anyhow::bail!(
            "Image must be at least {}x{} pixels, got {}x{}",
            VAE_SCALE_FACTOR,
            VAE_SCALE_FACTOR,
            width,
            height
        );
    }
    Ok((w, h))
}

/// RGB image -> `[1, 3, H, W]` in `[-1, 1]`, resized to `width`x`height`
pub fn image_to_tensor(image: &DynamicImage, width: u32, height: u32) -> Array4<f32> {
    let rgb = if image.width() == width && image.height() == height {
        image.to_rgb8()
    } else {
        image.resize_exact(width, height, FilterType::Lanczos3).to_rgb8()
    };

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0 * 2.0 - 1.0;
        }
    }
    tensor
}

/// `[1, 3, H, W]` in `[-1, 1]` -> RGB image
pub fn tensor_to_image(tensor: &Array4<f32>) -> Result<DynamicImage> {
    let shape = tensor.shape();
    if shape[1] != 3 {
        anyhow::bail!("Expected 3 image channels, got {}", shape[1]);
    }
    let (height, width) = (shape[2], shape[3]);
    let mut img = RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let mut px = [0u8; 3];
            for (c, value) in px.iter_mut().enumerate() {
                let v = (tensor[[0, c, y, x]] / 2.0 + 0.5).clamp(0.0, 1.0);
                *value = (v * 255.0).round() as u8;
            }
            img.put_pixel(x as u32, y as u32, Rgb(px));
        }
    }
    Ok(DynamicImage::ImageRgb8(img))
}

#[derive(Debug)]
pub struct VaeEncoder {
    model: OnnxModel,
    input_name: String,
}

impl VaeEncoder {
    pub fn load(path: &Path, options: &SessionOptions) -> Result<Self> {
        let model = OnnxModel::load("vae encoder", path, options)?;
        let input_name = model.input_name(0).unwrap_or("sample").to_string();
        Ok(Self { model, input_name })
    }

    /// Encode pixels to scaled latents
    ///
    /// Exports that return the distribution parameters (mean and log
    /// variance, 8 channels) are sampled with `noise`.
    pub fn encode(&self, pixels: Array4<f32>, noise: &mut NoiseGenerator) -> Result<Array4<f32>> {
        let mut session = self.model.session()?;
        let outputs = session
            .run(ort::inputs![&self.input_name => Value::from_array(pixels)?])
            .context("VAE encoder inference failed")?;
        let raw = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract VAE latents")?
            .to_owned()
            .into_dimensionality::<Ix4>()
            .context("Unexpected VAE encoder output rank")?;
        debug!("VAE encoder output shape: {:?}", raw.shape());

        let channels = raw.shape()[1];
        let latents = match channels {
            LATENT_CHANNELS => raw,
            c if c == LATENT_CHANNELS * 2 => {
                let mean = raw.slice(s![.., ..LATENT_CHANNELS, .., ..]).to_owned();
                let logvar = raw
                    .slice(s![.., LATENT_CHANNELS.., .., ..])
                    .mapv(|v| v.clamp(-30.0, 20.0));
                let std = logvar.mapv(|v| (0.5 * v).exp());
                let (b, c, h, w) = mean.dim();
                let eps = noise.tensor((b, c, h, w));
                mean + std * eps
            }
            other => anyhow::bail!("Unexpected VAE latent channels: {}", other),
        };

        Ok(latents * VAE_SCALING_FACTOR)
    }
}

#[derive(Debug)]
pub struct VaeDecoder {
    model: OnnxModel,
    input_name: String,
}

impl VaeDecoder {
    pub fn load(path: &Path, options: &SessionOptions) -> Result<Self> {
        let model = OnnxModel::load("vae decoder", path, options)?;
        let input_name = model.input_name(0).unwrap_or("latent_sample").to_string();
        Ok(Self { model, input_name })
    }

    /// Decode scaled latents back to `[1, 3, H, W]` pixels in `[-1, 1]`
    pub fn decode(&self, latents: &Array4<f32>) -> Result<Array4<f32>> {
        let unscaled = latents / VAE_SCALING_FACTOR;
        let mut session = self.model.session()?;
        let outputs = session
            .run(ort::inputs![&self.input_name => Value::from_array(unscaled)?])
            .context("VAE decoder inference failed")?;
        let pixels = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract decoded image")?
            .to_owned()
            .into_dimensionality::<Ix4>()
            .context("Unexpected VAE decoder output rank")?;
        Ok(pixels)
    }
}
