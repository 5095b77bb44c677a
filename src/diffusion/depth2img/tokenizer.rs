// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! CLIP prompt tokenizer
//!
//! Uses `tokenizer/tokenizer.json` when the bundle ships one, otherwise
//! builds the byte-level BPE from `vocab.json` + `merges.txt`.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use tokenizers::models::bpe::BPE;
use tokenizers::{Model, Tokenizer};

/// Sequence length the text encoder was trained with
pub const CLIP_MAX_LENGTH: usize = 77;

pub const BOS_TOKEN: &str = "<|startoftext|>";
pub const EOS_TOKEN: &str = "<|endoftext|>";

const CLIP_PATTERN: &str = r"(?i)<\|startoftext\|>|<\|endoftext\|>|'s|'t|'re|'ve|'m|'ll|'d|[\p{L}]+|[\p{N}]|[^\s\p{L}\p{N}]+";

/// `pad_token` is either a plain string or an added-token object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenSpec {
    Plain(String),
    Added { content: String },
}

#[derive(Debug, Default, Deserialize)]
struct TokenizerSettings {
    pad_token: Option<TokenSpec>,
    model_max_length: Option<usize>,
}

enum Backend {
    Full(Box<Tokenizer>),
    Bpe {
        model: Box<BPE>,
        pattern: Regex,
        byte_chars: [char; 256],
    },
}

pub struct ClipTokenizer {
    backend: Backend,
    bos_id: u32,
    eos_id: u32,
    pad_id: u32,
    max_length: usize,
}

impl std::fmt::Debug for ClipTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipTokenizer")
            .field("bos_id", &self.bos_id)
            .field("eos_id", &self.eos_id)
            .field("pad_id", &self.pad_id)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl ClipTokenizer {
    /// Load from `tokenizer.json`
    pub fn from_tokenizer_file(path: &Path, settings: Option<&Path>) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        let lookup = |t: &str| tokenizer.token_to_id(t);
        let (bos_id, eos_id, pad_id, max_length) = special_ids(lookup, settings)?;
        Ok(Self {
            backend: Backend::Full(Box::new(tokenizer)),
            bos_id,
            eos_id,
            pad_id,
            max_length,
        })
    }

    /// Build the BPE tokenizer from `vocab.json` and `merges.txt`
    pub fn from_vocab_and_merges(vocab: &Path, merges: &Path, settings: Option<&Path>) -> Result<Self> {
        let model = BPE::from_file(&vocab.to_string_lossy(), &merges.to_string_lossy())
            .unk_token(EOS_TOKEN.to_string())
            .end_of_word_suffix("</w>".to_string())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build CLIP BPE: {}", e))?;
        let lookup = |t: &str| model.token_to_id(t);
        let (bos_id, eos_id, pad_id, max_length) = special_ids(lookup, settings)?;
        let pattern = Regex::new(CLIP_PATTERN).context("Invalid CLIP pattern")?;

        Ok(Self {
            backend: Backend::Bpe {
                model: Box::new(model),
                pattern,
                byte_chars: bytes_to_unicode(),
            },
            bos_id,
            eos_id,
            pad_id,
            max_length,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    /// Token ids without start/end markers
    fn content_ids(&self, text: &str) -> Result<Vec<u32>> {
        let cleaned = clean_text(text);
        match &self.backend {
            Backend::Full(tokenizer) => {
                let encoding = tokenizer
                    .encode(cleaned.as_str(), false)
                    .map_err(|e| anyhow::anyhow!("Failed to encode prompt: {}", e))?;
                Ok(encoding.get_ids().to_vec())
            }
            Backend::Bpe {
                model,
                pattern,
                byte_chars,
            } => {
                let mut ids = Vec::new();
                for word in pattern.find_iter(&cleaned) {
                    let mapped: String = word
                        .as_str()
                        .bytes()
                        .map(|b| byte_chars[b as usize])
                        .collect();
                    let tokens = model
                        .tokenize(&mapped)
                        .map_err(|e| anyhow::anyhow!("BPE failed on '{}': {}", word.as_str(), e))?;
                    ids.extend(tokens.into_iter().map(|t| t.id));
                }
                Ok(ids)
            }
        }
    }

    /// `[bos, ..content, eos, pad, ...]` truncated/padded to `max_length`
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let mut content = self.content_ids(text)?;
        content.truncate(self.max_length.saturating_sub(2));

        let mut ids = Vec::with_capacity(self.max_length);
        ids.push(self.bos_id);
        ids.extend(content);
        ids.push(self.eos_id);
        ids.resize(self.max_length, self.pad_id);
        Ok(ids)
    }
}

fn special_ids(
    lookup: impl Fn(&str) -> Option<u32>,
    settings: Option<&Path>,
) -> Result<(u32, u32, u32, usize)> {
    let settings: TokenizerSettings = match settings {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .context(format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw).context(format!("Failed to parse {}", path.display()))?
        }
        None => TokenizerSettings::default(),
    };

    let bos_id = lookup(BOS_TOKEN).context("Tokenizer has no start token")?;
    let eos_id = lookup(EOS_TOKEN).context("Tokenizer has no end token")?;
    let pad_id = match settings.pad_token {
        Some(TokenSpec::Plain(t)) | Some(TokenSpec::Added { content: t }) => {
            lookup(&t).unwrap_or(eos_id)
        }
        None => eos_id,
    };
    let max_length = settings
        .model_max_length
        .filter(|l| *l >= 2 && *l <= CLIP_MAX_LENGTH)
        .unwrap_or(CLIP_MAX_LENGTH);

    Ok((bos_id, eos_id, pad_id, max_length))
}

/// Lowercase and collapse whitespace
pub fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// GPT-2 byte to printable-character table
pub fn bytes_to_unicode() -> [char; 256] {
    let mut table = ['\0'; 256];
    let mut extra = 0u32;
    for b in 0..=255u8 {
        let printable = matches!(b, b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF);
        let code = if printable {
            b as u32
        } else {
            let c = 256 + extra;
            extra += 1;
            c
        };
        table[b as usize] = char::from_u32(code).unwrap_or('\u{FFFD}');
    }
    table
}
