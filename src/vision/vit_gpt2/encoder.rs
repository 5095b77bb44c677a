// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision encoder of the caption model

use anyhow::{Context, Result};
use ndarray::{Array3, Array4, Ix3};
use ort::value::Value;
use std::path::Path;
use tracing::debug;

use crate::models::{OnnxModel, SessionOptions};

/// Vision encoder (ViT/Swin) producing patch embeddings
#[derive(Debug)]
pub struct CaptionEncoder {
    model: OnnxModel,
    input_name: String,
}

impl CaptionEncoder {
    pub fn load(path: &Path, options: &SessionOptions) -> Result<Self> {
        let model = OnnxModel::load("caption encoder", path, options)?;
        let input_name = model.input_name(0).unwrap_or("pixel_values").to_string();
        Ok(Self { model, input_name })
    }

    /// Encode `[1, 3, H, W]` pixels into `[1, seq_len, hidden]` states
    pub fn encode(&self, pixel_values: Array4<f32>) -> Result<Array3<f32>> {
        let shape = pixel_values.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }

        let mut session = self.model.session()?;
        let input_value =
            Value::from_array(pixel_values).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Caption encoder inference failed")?;

        let hidden = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract encoder output")?
            .to_owned();
        debug!("Encoder output shape: {:?}", hidden.shape());

        let hidden = hidden
            .into_dimensionality::<Ix3>()
            .context("Unexpected encoder output rank")?;
        Ok(hidden)
    }
}
