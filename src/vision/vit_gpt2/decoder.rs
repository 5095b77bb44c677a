// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! GPT-2 text decoder of the caption model

use anyhow::{Context, Result};
use ndarray::{Array2, Array3, Axis, Ix3};
use ort::session::SessionInputValue;
use ort::value::Value;
use std::borrow::Cow;
use std::path::Path;

use crate::models::{OnnxModel, SessionOptions};

/// Decoder that scores the next token given the prefix and encoder states
#[derive(Debug)]
pub struct CaptionDecoder {
    model: OnnxModel,
}

impl CaptionDecoder {
    pub fn load(path: &Path, options: &SessionOptions) -> Result<Self> {
        let model = OnnxModel::load("caption decoder", path, options)?;
        if !model.has_input("input_ids") || !model.has_input("encoder_hidden_states") {
            anyhow::bail!(
                "Caption decoder at {} must take input_ids and encoder_hidden_states",
                path.display()
            );
        }
        Ok(Self { model })
    }

    /// Logits for the token following `input_ids`
    pub fn next_token_logits(
        &self,
        input_ids: &[u32],
        encoder_hidden_states: &Array3<f32>,
    ) -> Result<Vec<f32>> {
        let len = input_ids.len();
        let ids = Array2::from_shape_vec(
            (1, len),
            input_ids.iter().map(|&id| id as i64).collect(),
        )
        .context("Failed to create input_ids array")?;

        let mut inputs: Vec<(Cow<'_, str>, SessionInputValue<'_>)> = ort::inputs![
            "input_ids" => Value::from_array(ids)?,
            "encoder_hidden_states" => Value::from_array(encoder_hidden_states.clone())?
        ];

        if self.model.has_input("attention_mask") {
            let mask = Array2::<i64>::ones((1, len));
            inputs.push(("attention_mask".into(), Value::from_array(mask)?.into()));
        }
        if self.model.has_input("encoder_attention_mask") {
            let seq_len = encoder_hidden_states.len_of(Axis(1));
            let mask = Array2::<i64>::ones((1, seq_len));
            inputs.push(("encoder_attention_mask".into(), Value::from_array(mask)?.into()));
        }

        let mut session = self.model.session()?;
        let outputs = session
            .run(inputs)
            .context("Caption decoder inference failed")?;

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract decoder logits")?
            .to_owned()
            .into_dimensionality::<Ix3>()
            .context("Unexpected decoder logits rank")?;

        let last = logits.len_of(Axis(1)).saturating_sub(1);
        let row: Vec<f32> = logits.index_axis(Axis(0), 0).index_axis(Axis(0), last).to_vec();
        Ok(row)
    }
}
