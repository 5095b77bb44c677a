// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared ONNX Runtime plumbing
//!
//! Every model component (caption encoder/decoder, text encoder, UNet, VAE,
//! depth estimator) is loaded through [`OnnxModel::load`], which applies the
//! resolved execution device with an automatic CPU fallback.

use anyhow::{Context, Result};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::ValueType;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::DevicePreference;

/// Device the ONNX sessions actually run on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionDevice {
    Cuda,
    Cpu,
}

impl ExecutionDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionDevice::Cuda => "cuda",
            ExecutionDevice::Cpu => "cpu",
        }
    }
}

impl std::fmt::Display for ExecutionDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the configured preference to a concrete device
///
/// `Auto` picks CUDA when the provider reports itself available, otherwise
/// CPU. `Cuda` fails if the provider is not available.
pub fn resolve_device(preference: DevicePreference) -> Result<ExecutionDevice> {
    let cuda_available = match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(e) => {
            debug!("CUDA availability check failed: {}", e);
            false
        }
    };

    match (preference, cuda_available) {
        (DevicePreference::Cpu, _) => Ok(ExecutionDevice::Cpu),
        (DevicePreference::Cuda, true) | (DevicePreference::Auto, true) => {
            Ok(ExecutionDevice::Cuda)
        }
        (DevicePreference::Cuda, false) => {
            anyhow::bail!("CUDA execution provider requested but not available")
        }
        (DevicePreference::Auto, false) => {
            info!("CUDA not available, using CPU execution provider");
            Ok(ExecutionDevice::Cpu)
        }
    }
}

/// Options applied to every session
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub device: ExecutionDevice,
    pub intra_threads: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            device: ExecutionDevice::Cpu,
            intra_threads: 4,
        }
    }
}

fn build_cpu_session(path: &Path, intra_threads: usize) -> Result<Session> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(path)
        .context(format!("Failed to load ONNX model from {}", path.display()))
}

fn build_session(path: &Path, options: &SessionOptions) -> Result<Session> {
    if options.device == ExecutionDevice::Cpu {
        return build_cpu_session(path, options.intra_threads);
    }

    let cuda_result = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CUDAExecutionProvider::default().build()])
        .context("Failed to set CUDA execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(options.intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(path);

    match cuda_result {
        Ok(session) => Ok(session),
        Err(e) => {
            warn!(
                "CUDA session for {} failed ({}), falling back to CPU",
                path.display(),
                e
            );
            build_cpu_session(path, options.intra_threads)
        }
    }
}

/// A loaded ONNX graph plus its input signature
pub struct OnnxModel {
    name: String,
    session: Mutex<Session>,
    inputs: Vec<(String, Option<TensorElementType>)>,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

impl OnnxModel {
    /// Load an ONNX file as a named component
    pub fn load(name: &str, path: &Path, options: &SessionOptions) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} model not found: {}", name, path.display());
        }

        info!("Loading {} from {}", name, path.display());
        let session = build_session(path, options)?;

        let inputs: Vec<(String, Option<TensorElementType>)> = session
            .inputs
            .iter()
            .map(|input| {
                let ty = match &input.input_type {
                    ValueType::Tensor { ty, .. } => Some(*ty),
                    _ => None,
                };
                (input.name.clone(), ty)
            })
            .collect();

        debug!("{} inputs: {:?}", name, inputs);

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            inputs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|(n, _)| n == name)
    }

    /// Element type of a named tensor input
    pub fn input_type(&self, name: &str) -> Option<TensorElementType> {
        self.inputs
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, ty)| *ty)
    }

    /// Name of the input at `index`, if the graph has one
    pub fn input_name(&self, index: usize) -> Option<&str> {
        self.inputs.get(index).map(|(n, _)| n.as_str())
    }

    /// Exclusive access to the session for a `run` call
    pub fn session(&self) -> Result<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|_| anyhow::anyhow!("{} session lock poisoned", self.name))
    }
}
