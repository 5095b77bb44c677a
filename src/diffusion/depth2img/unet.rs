// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Depth-conditioned denoising UNet

use anyhow::{Context, Result};
use ndarray::{Array1, Array3, Array4, Ix4};
use ort::tensor::TensorElementType;
use ort::value::{DynValue, Value};
use std::path::Path;

use crate::models::{OnnxModel, SessionOptions};

/// Latent channels plus the depth channel
pub const UNET_IN_CHANNELS: usize = 5;

#[derive(Debug)]
pub struct Unet {
    model: OnnxModel,
}

impl Unet {
    pub fn load(path: &Path, options: &SessionOptions) -> Result<Self> {
        let model = OnnxModel::load("unet", path, options)?;
        for name in ["sample", "timestep", "encoder_hidden_states"] {
            if !model.has_input(name) {
                anyhow::bail!("UNet at {} has no '{}' input", path.display(), name);
            }
        }
        Ok(Self { model })
    }

    fn timestep_value(&self, timestep: i64) -> Result<DynValue> {
        let value = match self.model.input_type("timestep") {
            Some(TensorElementType::Int64) => {
                Value::from_array(Array1::from_elem(1, timestep))?.into_dyn()
            }
            Some(TensorElementType::Int32) => {
                Value::from_array(Array1::from_elem(1, timestep as i32))?.into_dyn()
            }
            Some(TensorElementType::Float32) | None => {
                Value::from_array(Array1::from_elem(1, timestep as f32))?.into_dyn()
            }
            Some(other) => anyhow::bail!("Unsupported UNet timestep type: {:?}", other),
        };
        Ok(value)
    }

    /// Predict noise for `[B, 5, h, w]` latents+depth at `timestep`
    pub fn predict(
        &self,
        sample: Array4<f32>,
        timestep: i64,
        encoder_hidden_states: Array3<f32>,
    ) -> Result<Array4<f32>> {
        if sample.shape()[1] != UNET_IN_CHANNELS {
            anyhow::bail!(
                "UNet expects {} input channels, got {}",
                UNET_IN_CHANNELS,
                sample.shape()[1]
            );
        }

        let timestep = self.timestep_value(timestep)?;
        let mut session = self.model.session()?;
        let outputs = session
            .run(ort::inputs![
                "sample" => Value::from_array(sample)?,
                "timestep" => timestep,
                "encoder_hidden_states" => Value::from_array(encoder_hidden_states)?
            ])
            .context("UNet inference failed")?;

        let noise_pred = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract UNet output")?
            .to_owned()
            .into_dimensionality::<Ix4>()
            .context("Unexpected UNet output rank")?;
        Ok(noise_pred)
    }
}
