// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Greedy caption generation settings and helpers

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// GPT-2 `<|endoftext|>`, used as start, end and padding token
pub const GPT2_EOS_TOKEN_ID: u32 = 50256;

/// Default generated length, including the start token
pub const DEFAULT_MAX_LENGTH: usize = 20;

#[derive(Debug, Clone, Default, Deserialize)]
struct DecoderSection {
    bos_token_id: Option<u32>,
    eos_token_id: Option<u32>,
}

/// Fields read from `config.json` and `generation_config.json`
#[derive(Debug, Clone, Default, Deserialize)]
struct RawGenerationFields {
    decoder_start_token_id: Option<u32>,
    eos_token_id: Option<u32>,
    max_length: Option<usize>,
    no_repeat_ngram_size: Option<usize>,
    #[serde(default)]
    decoder: Option<DecoderSection>,
}

/// Resolved decoding parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub decoder_start_token_id: u32,
    pub eos_token_id: u32,
    pub max_length: usize,
    pub no_repeat_ngram_size: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            decoder_start_token_id: GPT2_EOS_TOKEN_ID,
            eos_token_id: GPT2_EOS_TOKEN_ID,
            max_length: DEFAULT_MAX_LENGTH,
            no_repeat_ngram_size: 0,
        }
    }
}

impl GenerationConfig {
    /// Merge model config files; later files override earlier ones
    pub fn from_files(paths: &[&Path]) -> Result<Self> {
        let mut config = Self::default();
        for path in paths {
            let raw = std::fs::read_to_string(path)
                .context(format!("Failed to read {}", path.display()))?;
            config.apply_json(&raw)
                .context(format!("Failed to parse {}", path.display()))?;
        }
        Ok(config)
    }

    pub fn apply_json(&mut self, raw: &str) -> Result<()> {
        let fields: RawGenerationFields = serde_json::from_str(raw)?;
        let decoder = fields.decoder.unwrap_or_default();

        if let Some(id) = fields.decoder_start_token_id.or(decoder.bos_token_id) {
            self.decoder_start_token_id = id;
        }
        if let Some(id) = fields.eos_token_id.or(decoder.eos_token_id) {
            self.eos_token_id = id;
        }
        if let Some(len) = fields.max_length {
            self.max_length = len.max(2);
        }
        if let Some(n) = fields.no_repeat_ngram_size {
            self.no_repeat_ngram_size = n;
        }
        Ok(())
    }
}

/// Tokens that would repeat an n-gram already present in `tokens`
pub fn banned_ngram_tokens(tokens: &[u32], n: usize) -> HashSet<u32> {
    let mut banned = HashSet::new();
    if n == 0 || tokens.len() + 1 < n {
        return banned;
    }
    let prefix = &tokens[tokens.len() + 1 - n..];
    for window in tokens.windows(n) {
        if &window[..n - 1] == prefix {
            banned.insert(window[n - 1]);
        }
    }
    banned
}

/// Highest-scoring token id not in `banned`
pub fn argmax(logits: &[f32], banned: &HashSet<u32>) -> Option<u32> {
    logits
        .iter()
        .enumerate()
        .filter(|(idx, value)| !banned.contains(&(*idx as u32)) && !value.is_nan())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(idx, _)| idx as u32)
}
