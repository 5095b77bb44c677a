// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded blocking pool for pipeline calls
//!
//! A job first takes an admission slot (running + queued), failing fast when
//! none is left, then waits for one of `max_concurrent` execution permits and
//! runs on tokio's blocking threads.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub const DEFAULT_MAX_CONCURRENT: usize = 1;
pub const DEFAULT_MAX_QUEUED: usize = 8;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Inference queue is full")]
    Overloaded,

    #[error("Inference worker failed: {0}")]
    WorkerFailed(String),
}

#[derive(Debug, Clone)]
pub struct InferencePool {
    admission: Arc<Semaphore>,
    workers: Arc<Semaphore>,
    capacity: usize,
    max_concurrent: usize,
}

impl Default for InferencePool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_QUEUED)
    }
}

impl InferencePool {
    /// `max_concurrent` is raised to at least 1
    pub fn new(max_concurrent: usize, max_queued: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let capacity = max_concurrent + max_queued;
        Self {
            admission: Arc::new(Semaphore::new(capacity)),
            workers: Arc::new(Semaphore::new(max_concurrent)),
            capacity,
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Jobs admitted and not yet finished (running or waiting)
    pub fn in_flight(&self) -> usize {
        self.capacity - self.admission.available_permits()
    }

    /// Run `job` on a blocking thread, or reject it if the queue is full
    ///
    /// Once admitted the job runs to completion even if the caller goes away.
    pub async fn run<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let slot = self.admission.clone().try_acquire_owned().map_err(|_| {
            warn!("Rejecting inference job: {} jobs in flight", self.capacity);
            PoolError::Overloaded
        })?;

        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PoolError::WorkerFailed(e.to_string()))?;
        debug!("Inference job started ({} in flight)", self.in_flight());

        tokio::task::spawn_blocking(move || {
            let _slot = slot;
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| PoolError::WorkerFailed(e.to_string()))
    }
}
