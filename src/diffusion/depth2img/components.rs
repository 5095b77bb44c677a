// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bundle layout and loading of the depth2img components

use anyhow::Result;
use tracing::info;

use super::depth::{DepthEstimator, DepthProcessorConfig};
use super::text_encoder::TextEncoder;
use super::tokenizer::ClipTokenizer;
use super::unet::Unet;
use super::vae::{VaeDecoder, VaeEncoder};
use crate::models::{ModelFiles, SessionOptions};

pub const VAE_ENCODER_FILE: &str = "vae_encoder/model.onnx";
pub const VAE_DECODER_FILE: &str = "vae_decoder/model.onnx";
pub const TEXT_ENCODER_FILE: &str = "text_encoder/model.onnx";
pub const UNET_FILE: &str = "unet/model.onnx";
pub const DEPTH_ESTIMATOR_FILE: &str = "depth_estimator/model.onnx";

pub const TOKENIZER_JSON_FILE: &str = "tokenizer/tokenizer.json";
pub const TOKENIZER_VOCAB_FILE: &str = "tokenizer/vocab.json";
pub const TOKENIZER_MERGES_FILE: &str = "tokenizer/merges.txt";
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer/tokenizer_config.json";
pub const FEATURE_EXTRACTOR_FILE: &str = "feature_extractor/preprocessor_config.json";

/// Graphs every bundle must provide
pub const REQUIRED_FILES: &[&str] = &[
    VAE_ENCODER_FILE,
    VAE_DECODER_FILE,
    TEXT_ENCODER_FILE,
    UNET_FILE,
    DEPTH_ESTIMATOR_FILE,
];

/// Tokenizer/config files plus external weight files for large graphs
pub const OPTIONAL_FILES: &[&str] = &[
    TOKENIZER_JSON_FILE,
    TOKENIZER_VOCAB_FILE,
    TOKENIZER_MERGES_FILE,
    TOKENIZER_CONFIG_FILE,
    FEATURE_EXTRACTOR_FILE,
    "unet/model.onnx_data",
    "text_encoder/model.onnx_data",
    "vae_encoder/model.onnx_data",
    "vae_decoder/model.onnx_data",
    "depth_estimator/model.onnx_data",
];

/// All loaded parts of the depth2img bundle
#[derive(Debug)]
pub struct Depth2ImgComponents {
    pub vae_encoder: VaeEncoder,
    pub vae_decoder: VaeDecoder,
    pub tokenizer: ClipTokenizer,
    pub text_encoder: TextEncoder,
    pub unet: Unet,
    pub depth_estimator: DepthEstimator,
}

impl Depth2ImgComponents {
    pub fn load(files: &ModelFiles, options: &SessionOptions) -> Result<Self> {
        info!("Loading depth2img components from {}", files.model);

        let tokenizer = load_tokenizer(files)?;

        let feature_extractor = match files.get(FEATURE_EXTRACTOR_FILE) {
            Some(path) => DepthProcessorConfig::from_file(path)?,
            None => DepthProcessorConfig::default(),
        };

        let vae_encoder = VaeEncoder::load(files.require(VAE_ENCODER_FILE)?, options)?;
        let vae_decoder = VaeDecoder::load(files.require(VAE_DECODER_FILE)?, options)?;
        let text_encoder = TextEncoder::load(files.require(TEXT_ENCODER_FILE)?, options)?;
        let unet = Unet::load(files.require(UNET_FILE)?, options)?;
        let depth_estimator = DepthEstimator::load(
            files.require(DEPTH_ESTIMATOR_FILE)?,
            feature_extractor,
            options,
        )?;

        Ok(Self {
            vae_encoder,
            vae_decoder,
            tokenizer,
            text_encoder,
            unet,
            depth_estimator,
        })
    }
}

fn load_tokenizer(files: &ModelFiles) -> Result<ClipTokenizer> {
    let settings = files.get(TOKENIZER_CONFIG_FILE);
    if let Some(path) = files.get(TOKENIZER_JSON_FILE) {
        return ClipTokenizer::from_tokenizer_file(path, settings);
    }
    match (files.get(TOKENIZER_VOCAB_FILE), files.get(TOKENIZER_MERGES_FILE)) {
        (Some(vocab), Some(merges)) => ClipTokenizer::from_vocab_and_merges(vocab, merges, settings),
        _ => anyhow::bail!(
            "Model '{}' has no tokenizer: expected {} or {} + {}",
            files.model,
            TOKENIZER_JSON_FILE,
            TOKENIZER_VOCAB_FILE,
            TOKENIZER_MERGES_FILE
        ),
    }
}
