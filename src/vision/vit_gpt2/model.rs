// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision-encoder / GPT-2-decoder captioning pipeline
//!
//! Expects the ONNX export layout:
//! - `onnx/encoder_model.onnx`
//! - `onnx/decoder_model.onnx`
//! - `tokenizer.json`
//! - `config.json`, optionally `preprocessor_config.json` and
//!   `generation_config.json`

use anyhow::Result;
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::decoder::CaptionDecoder;
use super::encoder::CaptionEncoder;
use super::generation::{argmax, banned_ngram_tokens, GenerationConfig};
use super::preprocessing::ImageProcessorConfig;
use crate::models::{ModelFiles, SessionOptions};
use crate::vision::captioner::{CaptionOutput, ImageCaptioner};

pub const ENCODER_FILE: &str = "onnx/encoder_model.onnx";
pub const DECODER_FILE: &str = "onnx/decoder_model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const CONFIG_FILE: &str = "config.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor_config.json";
pub const GENERATION_CONFIG_FILE: &str = "generation_config.json";

/// Files that must be present for the captioner to load
pub const REQUIRED_FILES: &[&str] = &[ENCODER_FILE, DECODER_FILE, TOKENIZER_FILE, CONFIG_FILE];

/// Files used when present
pub const OPTIONAL_FILES: &[&str] = &[PREPROCESSOR_FILE, GENERATION_CONFIG_FILE];

pub struct VitGpt2Captioner {
    model_name: String,
    processor: ImageProcessorConfig,
    encoder: CaptionEncoder,
    decoder: CaptionDecoder,
    tokenizer: Tokenizer,
    generation: GenerationConfig,
}

impl std::fmt::Debug for VitGpt2Captioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VitGpt2Captioner")
            .field("model_name", &self.model_name)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl VitGpt2Captioner {
    /// Load all components from resolved model files
    pub fn load(files: &ModelFiles, options: &SessionOptions) -> Result<Self> {
        info!("Loading caption pipeline {}", files.model);

        let processor = match files.get(PREPROCESSOR_FILE) {
            Some(path) => ImageProcessorConfig::from_file(path)?,
            None => ImageProcessorConfig::default(),
        };

        let mut config_paths: Vec<&Path> = vec![files.require(CONFIG_FILE)?];
        if let Some(path) = files.get(GENERATION_CONFIG_FILE) {
            config_paths.push(path);
        }
        let generation = GenerationConfig::from_files(&config_paths)?;

        let tokenizer = Tokenizer::from_file(files.require(TOKENIZER_FILE)?)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        let encoder = CaptionEncoder::load(files.require(ENCODER_FILE)?, options)?;
        let decoder = CaptionDecoder::load(files.require(DECODER_FILE)?, options)?;

        info!(
            "Caption pipeline ready (max_length={}, eos={})",
            generation.max_length, generation.eos_token_id
        );

        Ok(Self {
            model_name: files.model.clone(),
            processor,
            encoder,
            decoder,
            tokenizer,
            generation,
        })
    }

    /// Greedy decode from the start token until EOS or `max_length`
    fn generate(&self, image: &DynamicImage) -> Result<String> {
        let pixel_values = self.processor.preprocess(image);
        let hidden = self.encoder.encode(pixel_values)?;

        let mut tokens = vec![self.generation.decoder_start_token_id];
        while tokens.len() < self.generation.max_length {
            let logits = self.decoder.next_token_logits(&tokens, &hidden)?;
            let banned = banned_ngram_tokens(&tokens, self.generation.no_repeat_ngram_size);
            let next = argmax(&logits, &banned)
                .ok_or_else(|| anyhow::anyhow!("Decoder returned empty logits"))?;

            tokens.push(next);
            if next == self.generation.eos_token_id {
                break;
            }
        }

        debug!("Generated {} tokens", tokens.len());

        let text = self
            .tokenizer
            .decode(&tokens, true)
            .map_err(|e| anyhow::anyhow!("Decoding failed: {}", e))?;
        Ok(text.trim().to_string())
    }
}

impl ImageCaptioner for VitGpt2Captioner {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn caption(&self, image: &DynamicImage) -> Result<Vec<CaptionOutput>> {
        let start = Instant::now();
        let text = self.generate(image)?;
        debug!("Caption generated in {}ms", start.elapsed().as_millis());
        Ok(vec![CaptionOutput::new(text)])
    }
}
