// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart form parsing for /generate/

use axum_extra::extract::Multipart;
use image::DynamicImage;
use std::str::FromStr;

use crate::api::errors::ApiError;
use crate::diffusion::{Depth2ImgRequest, DEFAULT_GUIDANCE_SCALE, DEFAULT_STEPS, DEFAULT_STRENGTH};

/// Parsed generation form
///
/// Numeric values are only parsed here, never range-checked; the pipeline
/// decides whether they are acceptable.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub file: Vec<u8>,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub strength: f64,
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: Option<u64>,
}

impl GenerateRequest {
    /// Read all form fields; unknown fields are skipped
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = GenerateFormBuilder::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::invalid_request("form", e.to_string()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "file" {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::invalid_request("file", e.to_string()))?;
                form.file(bytes.to_vec());
            } else if GenerateFormBuilder::accepts(&name) {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::invalid_request(name.clone(), e.to_string()))?;
                form.text(&name, text);
            }
        }
        form.build()
    }

    pub fn into_pipeline_request(self, image: DynamicImage) -> Depth2ImgRequest {
        Depth2ImgRequest {
            image,
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            strength: self.strength,
            steps: self.steps,
            guidance_scale: self.guidance_scale,
            seed: self.seed,
        }
    }
}

const TEXT_FIELDS: &[&str] = &[
    "prompt",
    "negative_prompt",
    "strength",
    "steps",
    "guidance_scale",
    "seed",
];

/// Collects raw form values before validation
#[derive(Debug, Default)]
pub struct GenerateFormBuilder {
    file: Option<Vec<u8>>,
    prompt: Option<String>,
    negative_prompt: Option<String>,
    strength: Option<String>,
    steps: Option<String>,
    guidance_scale: Option<String>,
    seed: Option<String>,
}

fn parse_field<T: FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, ApiError> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ApiError::invalid_request(name, format!("cannot parse '{}'", raw))),
    }
}

impl GenerateFormBuilder {
    pub fn accepts(name: &str) -> bool {
        TEXT_FIELDS.contains(&name)
    }

    pub fn file(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.file = Some(bytes);
        self
    }

    pub fn text(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = Some(value.into());
        match name {
            "prompt" => self.prompt = value,
            "negative_prompt" => self.negative_prompt = value,
            "strength" => self.strength = value,
            "steps" => self.steps = value,
            "guidance_scale" => self.guidance_scale = value,
            "seed" => self.seed = value,
            _ => {}
        }
        self
    }

    pub fn build(self) -> Result<GenerateRequest, ApiError> {
        let file = self
            .file
            .ok_or_else(|| ApiError::invalid_request("file", "file field not provided"))?;
        let prompt = self
            .prompt
            .ok_or_else(|| ApiError::invalid_request("prompt", "prompt field not provided"))?;

        Ok(GenerateRequest {
            file,
            prompt,
            negative_prompt: self.negative_prompt.filter(|p| !p.is_empty()),
            strength: parse_field("strength", self.strength)?.unwrap_or(DEFAULT_STRENGTH),
            steps: parse_field("steps", self.steps)?.unwrap_or(DEFAULT_STEPS),
            guidance_scale: parse_field("guidance_scale", self.guidance_scale)?
                .unwrap_or(DEFAULT_GUIDANCE_SCALE),
            seed: parse_field("seed", self.seed)?,
        })
    }
}
