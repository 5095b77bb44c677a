// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Depth2img denoising loop over the ONNX components

use anyhow::{Context, Result};
use ndarray::{concatenate, s, Array3, Array4, Axis};
use std::time::Instant;
use tracing::{debug, info};

use super::components::Depth2ImgComponents;
use super::vae::{image_to_tensor, latent_aligned_size, tensor_to_image, VAE_SCALE_FACTOR};
use crate::diffusion::noise::NoiseGenerator;
use crate::diffusion::pipeline::{Depth2ImgOutput, Depth2ImgRequest, DepthToImage};
use crate::diffusion::scheduler::{PndmConfig, PndmScheduler};
use crate::models::{ModelFiles, SessionOptions};
use crate::vision::image_utils::to_rgb;

/// Combine unconditional and text-conditioned predictions
pub fn apply_guidance(noise_pred: &Array4<f32>, guidance_scale: f32) -> Array4<f32> {
    let uncond = noise_pred.slice(s![0..1, .., .., ..]);
    let text = noise_pred.slice(s![1..2, .., .., ..]);
    &uncond + &((&text - &uncond) * guidance_scale)
}

pub struct OnnxDepth2ImgPipeline {
    model_name: String,
    components: Depth2ImgComponents,
    scheduler_config: PndmConfig,
}

impl std::fmt::Debug for OnnxDepth2ImgPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxDepth2ImgPipeline")
            .field("model_name", &self.model_name)
            .field("scheduler_config", &self.scheduler_config)
            .finish_non_exhaustive()
    }
}

impl OnnxDepth2ImgPipeline {
    pub fn load(files: &ModelFiles, options: &SessionOptions) -> Result<Self> {
        let components = Depth2ImgComponents::load(files, options)?;
        info!("Depth2img pipeline ready ({})", files.model);
        Ok(Self {
            model_name: files.model.clone(),
            components,
            scheduler_config: PndmConfig::default(),
        })
    }

    fn embed_prompt(&self, text: &str) -> Result<Array3<f32>> {
        let ids = self.components.tokenizer.encode(text)?;
        self.components.text_encoder.encode(&ids)
    }

    /// `[uncond, cond]` when guiding, `[cond]` otherwise
    fn prompt_embeddings(&self, request: &Depth2ImgRequest, guided: bool) -> Result<Array3<f32>> {
        let cond = self.embed_prompt(&request.prompt)?;
        if !guided {
            return Ok(cond);
        }
        let negative = request.negative_prompt.as_deref().unwrap_or("");
        let uncond = self.embed_prompt(negative)?;
        concatenate(Axis(0), &[uncond.view(), cond.view()]).context("Failed to batch prompt embeddings")
    }
}

impl DepthToImage for OnnxDepth2ImgPipeline {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn generate(&self, request: &Depth2ImgRequest) -> Result<Depth2ImgOutput> {
        let start = Instant::now();

        // 1. Schedule (also validates strength and steps)
        let mut scheduler = PndmScheduler::new(self.scheduler_config);
        scheduler.set_timesteps(request.steps as usize)?;
        let timesteps = scheduler.timesteps_for_strength(request.strength)?;
        let latent_timestep = *timesteps
            .first()
            .context("No denoising steps left for this strength")?;

        let seed = request.seed.unwrap_or_else(NoiseGenerator::random_seed);
        let mut noise = NoiseGenerator::from_seed(seed);
        let guided = request.guidance_scale > 1.0;

        // 2. Text conditioning
        let embeddings = self.prompt_embeddings(request, guided)?;

        // 3. Depth conditioning at latent resolution
        let image = to_rgb(&request.image);
        let (width, height) = latent_aligned_size(image.width(), image.height())?;
        let (latent_w, latent_h) = (width / VAE_SCALE_FACTOR, height / VAE_SCALE_FACTOR);
        let mut depth = self
            .components
            .depth_estimator
            .condition(&image, latent_w, latent_h)?;
        if guided {
            depth = concatenate(Axis(0), &[depth.view(), depth.view()])?;
        }

        // 4. Noised initial latents
        let pixels = image_to_tensor(&image, width, height);
        let init_latents = self.components.vae_encoder.encode(pixels, &mut noise)?;
        let init_noise = noise.tensor(init_latents.dim());
        let mut latents = scheduler.add_noise(&init_latents, &init_noise, latent_timestep)?;

        debug!(
            "Denoising {}x{} latents over {} timesteps (guided={})",
            latent_w,
            latent_h,
            timesteps.len(),
            guided
        );

        // 5. Denoising loop
        for &t in &timesteps {
            let model_input = if guided {
                concatenate(Axis(0), &[latents.view(), latents.view()])?
            } else {
                latents.clone()
            };
            let model_input = concatenate(Axis(1), &[model_input.view(), depth.view()])?;

            let noise_pred = self
                .components
                .unet
                .predict(model_input, t, embeddings.clone())?;
            let noise_pred = if guided {
                apply_guidance(&noise_pred, request.guidance_scale)
            } else {
                noise_pred
            };

            latents = scheduler.step(&noise_pred, t, &latents)?;
        }

        // 6. Decode
        let decoded = self.components.vae_decoder.decode(&latents)?;
        let output = tensor_to_image(&decoded)?;

        info!(
            "Depth2img generated {}x{} in {}ms ({} steps, seed {})",
            output.width(),
            output.height(),
            start.elapsed().as_millis(),
            timesteps.len(),
            seed
        );

        Ok(Depth2ImgOutput {
            images: vec![output],
            seed,
        })
    }
}
