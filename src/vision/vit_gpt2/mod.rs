// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX captioning model (ViT/Swin encoder + GPT-2 decoder)

pub mod decoder;
pub mod encoder;
pub mod generation;
pub mod model;
pub mod preprocessing;

pub use generation::GenerationConfig;
pub use model::{VitGpt2Captioner, OPTIONAL_FILES, REQUIRED_FILES};
pub use preprocessing::ImageProcessorConfig;
