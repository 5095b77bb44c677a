// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use std::path::PathBuf;

use crate::config::{
    DevicePreference, ServerConfig, DEFAULT_CAPTION_MODEL, DEFAULT_CORS_ORIGIN,
    DEFAULT_MAX_IMAGE_BYTES, DEFAULT_OUTPUT_MAX_FILES,
};

/// Fabstir Image Node
#[derive(Parser, Debug, Clone)]
#[command(name = "fabstir-image-node")]
#[command(version)]
#[command(about = "HTTP node for image captioning and depth-guided image generation", long_about = None)]
pub struct Args {
    /// Interface to bind
    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Browser origin allowed by CORS
    #[arg(long, env = "CORS_ORIGIN", default_value = DEFAULT_CORS_ORIGIN)]
    pub cors_origin: String,

    /// Captioning model name or local directory
    #[arg(long, env = "CAPTION_MODEL", default_value = DEFAULT_CAPTION_MODEL)]
    pub caption_model: String,

    /// Depth2img ONNX bundle: hub repository or local directory
    #[arg(long, env = "DEPTH_MODEL")]
    pub depth_model: Option<String>,

    /// Model cache directory
    #[arg(long, env = "MODEL_CACHE_DIR")]
    pub model_cache_dir: Option<PathBuf>,

    /// Hugging Face access token
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Never download, only use cached model files
    #[arg(long, env = "MODEL_OFFLINE", default_value_t = false)]
    pub model_offline: bool,

    /// Execution device: auto, cuda or cpu
    #[arg(long, env = "DEVICE", default_value = "auto")]
    pub device: DevicePreference,

    /// Intra-op threads per ONNX session
    #[arg(long, env = "ONNX_INTRA_THREADS", default_value_t = 4)]
    pub onnx_intra_threads: usize,

    /// Inference jobs running at once
    #[arg(long, env = "MAX_CONCURRENT_INFERENCES", default_value_t = 1)]
    pub max_concurrent_inferences: usize,

    /// Inference jobs allowed to wait before requests are rejected
    #[arg(long, env = "MAX_QUEUED_INFERENCES", default_value_t = 8)]
    pub max_queued_inferences: usize,

    /// Timeout in seconds for fetching image URLs
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Maximum image size in bytes for uploads and fetches
    #[arg(long, env = "MAX_IMAGE_BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    pub max_image_bytes: usize,

    /// Directory for generated images; unset disables the output store
    #[arg(long, env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Generated images kept before the oldest are deleted (0 = keep all)
    #[arg(long, env = "OUTPUT_MAX_FILES", default_value_t = DEFAULT_OUTPUT_MAX_FILES)]
    pub output_max_files: usize,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            cors_origin: args.cors_origin,
            caption_model: args.caption_model,
            depth_model: args.depth_model.unwrap_or_default(),
            model_cache_dir: args.model_cache_dir,
            hf_token: args.hf_token.filter(|t| !t.is_empty()),
            model_offline: args.model_offline,
            device: args.device,
            onnx_intra_threads: args.onnx_intra_threads,
            max_concurrent_inferences: args.max_concurrent_inferences,
            max_queued_inferences: args.max_queued_inferences,
            fetch_timeout_secs: args.fetch_timeout_secs,
            max_image_bytes: args.max_image_bytes,
            output_dir: args.output_dir,
            output_max_files: args.output_max_files,
        }
    }
}
