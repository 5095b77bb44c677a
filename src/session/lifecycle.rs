// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Uninitialized -> Ready -> Shutdown guard around the model session

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use super::model_session::ModelSession;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Model session is not initialized")]
    NotReady,

    #[error("Model session has been shut down")]
    ShutDown,

    #[error("Model session is already initialized")]
    AlreadyInitialized,
}

/// Observable lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Uninitialized,
    Ready,
    Shutdown,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Uninitialized => "uninitialized",
            LifecyclePhase::Ready => "ready",
            LifecyclePhase::Shutdown => "shutdown",
        }
    }
}

enum State {
    Uninitialized,
    Ready(Arc<ModelSession>),
    Shutdown,
}

/// Holds the process-wide session; transitions only move forward
pub struct SessionLifecycle {
    state: RwLock<State>,
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::Uninitialized),
        }
    }

    /// Install the session. Allowed exactly once, and never after shutdown.
    pub async fn initialize(&self, session: ModelSession) -> Result<Arc<ModelSession>, LifecycleError> {
        let mut state = self.state.write().await;
        match *state {
            State::Uninitialized => {
                let session = Arc::new(session);
                info!(
                    "Model session ready (caption={}, depth={}, device={})",
                    session.caption_model(),
                    session.depth_model(),
                    session.device()
                );
                *state = State::Ready(session.clone());
                Ok(session)
            }
            State::Ready(_) => Err(LifecycleError::AlreadyInitialized),
            State::Shutdown => Err(LifecycleError::ShutDown),
        }
    }

    pub async fn current(&self) -> Result<Arc<ModelSession>, LifecycleError> {
        match &*self.state.read().await {
            State::Ready(session) => Ok(session.clone()),
            State::Uninitialized => Err(LifecycleError::NotReady),
            State::Shutdown => Err(LifecycleError::ShutDown),
        }
    }

    pub async fn phase(&self) -> LifecyclePhase {
        match &*self.state.read().await {
            State::Uninitialized => LifecyclePhase::Uninitialized,
            State::Ready(_) => LifecyclePhase::Ready,
            State::Shutdown => LifecyclePhase::Shutdown,
        }
    }

    /// Drop the session handles. Returns `false` if already shut down.
    ///
    /// Jobs still holding an `Arc<ModelSession>` finish on their copy.
    pub async fn shutdown(&self) -> bool {
        let mut state = self.state.write().await;
        if matches!(*state, State::Shutdown) {
            return false;
        }
        *state = State::Shutdown;
        info!("Model session shut down");
        true
    }
}
