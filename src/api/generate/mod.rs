// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Depth2img generation endpoint
//!
//! POST /generate/ returns the generated PNG; GET /outputs/{id}.png serves
//! stored outputs when the output store is enabled.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{generate_handler, get_output_handler};
pub use request::{GenerateFormBuilder, GenerateRequest};
pub use response::{GenerateResponse, GENERATED_IMAGE_URL_HEADER, GENERATION_SEED_HEADER};
