// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Runtime configuration for the image node

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default captioning model: a hub repository shipping the ONNX
/// encoder/decoder layout (`onnx/encoder_model.onnx`, `onnx/decoder_model.onnx`)
pub const DEFAULT_CAPTION_MODEL: &str = "Xenova/vit-gpt2-image-captioning";

/// Checkpoint the depth2img bundle is exported from
///
/// The hub repository only carries PyTorch weights, so `depth_model` has no
/// default and must name an ONNX export of it.
pub const DEPTH_SOURCE_MODEL: &str = "stabilityai/stable-diffusion-2-depth";

/// Default browser origin allowed by CORS
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Default cap on uploaded and fetched image bodies (20MB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Default number of generated images kept in the output store
pub const DEFAULT_OUTPUT_MAX_FILES: usize = 256;

/// Which execution provider the ONNX sessions should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// CUDA when available, CPU otherwise
    #[default]
    Auto,
    /// Require CUDA
    Cuda,
    /// Always CPU
    Cpu,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "cpu" => Ok(Self::Cpu),
            other => Err(format!(
                "Unknown device '{}', expected one of: auto, cuda, cpu",
                other
            )),
        }
    }
}

impl std::fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cuda => write!(f, "cuda"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// The single origin allowed to call the API from a browser
    pub cors_origin: String,
    /// Registry name (or local directory) of the captioning model
    pub caption_model: String,
    /// Registry name (or local directory) of the depth2img bundle
    pub depth_model: String,
    /// Hub cache directory, `None` uses the hf-hub default
    pub model_cache_dir: Option<PathBuf>,
    /// Hub access token for gated repositories
    pub hf_token: Option<String>,
    /// Only use files already present in the cache
    pub model_offline: bool,
    /// Execution provider preference
    pub device: DevicePreference,
    /// Intra-op threads per ONNX session
    pub onnx_intra_threads: usize,
    /// Inference jobs allowed to run at once
    pub max_concurrent_inferences: usize,
    /// Inference jobs allowed to wait for a slot
    pub max_queued_inferences: usize,
    /// Timeout for fetching `image_url`
    pub fetch_timeout_secs: u64,
    /// Maximum image body size (uploads and fetches)
    pub max_image_bytes: usize,
    /// Where generated PNGs are kept; disabled when `None`
    pub output_dir: Option<PathBuf>,
    /// Images kept in `output_dir` before the oldest are evicted; 0 keeps all
    pub output_max_files: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            caption_model: DEFAULT_CAPTION_MODEL.to_string(),
            depth_model: String::new(),
            model_cache_dir: None,
            hf_token: None,
            model_offline: false,
            device: DevicePreference::Auto,
            onnx_intra_threads: 4,
            max_concurrent_inferences: 1,
            max_queued_inferences: 8,
            fetch_timeout_secs: 30,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            output_dir: None,
            output_max_files: DEFAULT_OUTPUT_MAX_FILES,
        }
    }
}

impl ServerConfig {
    /// Socket address to listen on
    pub fn bind_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid bind address {}:{}: {}", self.host, self.port, e))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.bind_addr()?;
        if self.cors_origin.trim().is_empty() {
            return Err("CORS origin must not be empty".to_string());
        }
        if self.cors_origin.parse::<axum::http::HeaderValue>().is_err() {
            return Err(format!("CORS origin is not a valid header value: {}", self.cors_origin));
        }
        if self.caption_model.trim().is_empty() {
            return Err("Caption model name must not be empty".to_string());
        }
        if self.depth_model.trim().is_empty() {
            return Err(format!(
                "Depth model must be set to an ONNX export of {} \
                 (vae_encoder/, vae_decoder/, text_encoder/, unet/, depth_estimator/ and tokenizer/)",
                DEPTH_SOURCE_MODEL
            ));
        }
        if self.onnx_intra_threads == 0 {
            return Err("ONNX intra threads must be greater than 0".to_string());
        }
        if self.max_concurrent_inferences == 0 {
            return Err("Max concurrent inferences must be greater than 0".to_string());
        }
        if self.fetch_timeout_secs == 0 {
            return Err("Fetch timeout must be greater than 0".to_string());
        }
        if self.max_image_bytes == 0 {
            return Err("Max image bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}
