// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model session lifecycle and the inference worker pool

pub mod lifecycle;
pub mod model_session;
pub mod worker_pool;

pub use lifecycle::{LifecycleError, LifecyclePhase, SessionLifecycle};
pub use model_session::ModelSession;
pub use worker_pool::{InferencePool, PoolError, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_QUEUED};
