// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod diffusion;
pub mod models;
pub mod session;
pub mod storage;
pub mod version;
pub mod vision;

pub use api::{create_router, AppState};
pub use config::ServerConfig;
pub use session::{InferencePool, ModelSession, SessionLifecycle};
