// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide handle to the caption and depth2img pipelines

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::ServerConfig;
use crate::diffusion::{depth2img, DepthToImage, OnnxDepth2ImgPipeline};
use crate::models::{resolve_device, ExecutionDevice, ModelRegistry, RegistryConfig, SessionOptions};
use crate::vision::{vit_gpt2, ImageCaptioner, VitGpt2Captioner};

/// Both pipelines plus the device they run on. Immutable once built.
#[derive(Clone)]
pub struct ModelSession {
    captioner: Arc<dyn ImageCaptioner>,
    depth2img: Arc<dyn DepthToImage>,
    device: ExecutionDevice,
}

impl std::fmt::Debug for ModelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSession")
            .field("caption_model", &self.caption_model())
            .field("depth_model", &self.depth_model())
            .field("device", &self.device)
            .finish()
    }
}

impl ModelSession {
    pub fn new(
        captioner: Arc<dyn ImageCaptioner>,
        depth2img: Arc<dyn DepthToImage>,
        device: ExecutionDevice,
    ) -> Self {
        Self {
            captioner,
            depth2img,
            device,
        }
    }

    /// Resolve the device, fetch both bundles and build the pipelines
    ///
    /// Blocks on downloads and session creation; see [`ModelSession::load_async`].
    pub fn load(config: &ServerConfig) -> Result<Self> {
        let start = Instant::now();
        let device = resolve_device(config.device)?;
        info!("Execution device: {} (requested {})", device, config.device);

        let options = SessionOptions {
            device,
            intra_threads: config.onnx_intra_threads,
        };
        let registry = ModelRegistry::new(RegistryConfig {
            cache_dir: config.model_cache_dir.clone(),
            token: config.hf_token.clone(),
            offline: config.model_offline,
        })?;

        let caption_files = registry.resolve(
            &config.caption_model,
            vit_gpt2::REQUIRED_FILES,
            vit_gpt2::OPTIONAL_FILES,
        )?;
        let captioner = VitGpt2Captioner::load(&caption_files, &options)
            .with_context(|| format!("Failed to load captioner '{}'", config.caption_model))?;

        let depth_files = registry.resolve(
            &config.depth_model,
            depth2img::REQUIRED_FILES,
            depth2img::OPTIONAL_FILES,
        )?;
        let pipeline = OnnxDepth2ImgPipeline::load(&depth_files, &options)
            .with_context(|| format!("Failed to load depth2img pipeline '{}'", config.depth_model))?;

        info!("Models loaded in {:.1}s", start.elapsed().as_secs_f32());
        Ok(Self::new(Arc::new(captioner), Arc::new(pipeline), device))
    }

    /// [`ModelSession::load`] on the blocking thread pool
    pub async fn load_async(config: ServerConfig) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::load(&config))
            .await
            .context("Model loading task failed")?
    }

    pub fn captioner(&self) -> Arc<dyn ImageCaptioner> {
        self.captioner.clone()
    }

    pub fn depth2img(&self) -> Arc<dyn DepthToImage> {
        self.depth2img.clone()
    }

    pub fn device(&self) -> ExecutionDevice {
        self.device
    }

    pub fn caption_model(&self) -> &str {
        self.captioner.model_name()
    }

    pub fn depth_model(&self) -> &str {
        self.depth2img.model_name()
    }
}
