// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! CLIP text encoder

use anyhow::{Context, Result};
use ndarray::{Array2, Array3, Ix3};
use ort::tensor::TensorElementType;
use ort::value::Value;
use std::path::Path;

use crate::models::{OnnxModel, SessionOptions};

#[derive(Debug)]
pub struct TextEncoder {
    model: OnnxModel,
    input_name: String,
}

impl TextEncoder {
    pub fn load(path: &Path, options: &SessionOptions) -> Result<Self> {
        let model = OnnxModel::load("text encoder", path, options)?;
        let input_name = model.input_name(0).unwrap_or("input_ids").to_string();
        Ok(Self { model, input_name })
    }

    /// Hidden states `[1, seq_len, dim]` for one tokenized prompt
    pub fn encode(&self, ids: &[u32]) -> Result<Array3<f32>> {
        let len = ids.len();
        let input = match self.model.input_type(&self.input_name) {
            Some(TensorElementType::Int64) => {
                let arr = Array2::from_shape_vec((1, len), ids.iter().map(|&i| i as i64).collect())?;
                Value::from_array(arr)?.into_dyn()
            }
            _ => {
                let arr = Array2::from_shape_vec((1, len), ids.iter().map(|&i| i as i32).collect())?;
                Value::from_array(arr)?.into_dyn()
            }
        };

        let mut session = self.model.session()?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input])
            .context("Text encoder inference failed")?;

        let hidden = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract text embeddings")?
            .to_owned()
            .into_dimensionality::<Ix3>()
            .context("Unexpected text encoder output rank")?;
        Ok(hidden)
    }
}
