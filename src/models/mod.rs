// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model acquisition and ONNX Runtime sessions

pub mod onnx;
pub mod registry;

pub use onnx::{resolve_device, ExecutionDevice, OnnxModel, SessionOptions};
pub use registry::{ModelFiles, ModelRegistry, ModelSource, RegistryConfig, RegistryError};
