// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Stable Diffusion 2 depth2img over ONNX Runtime

pub mod components;
pub mod depth;
pub mod pipeline;
pub mod text_encoder;
pub mod tokenizer;
pub mod unet;
pub mod vae;

pub use components::{Depth2ImgComponents, OPTIONAL_FILES, REQUIRED_FILES};
pub use pipeline::OnnxDepth2ImgPipeline;
pub use tokenizer::ClipTokenizer;
