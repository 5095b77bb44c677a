// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use fabstir_image_node::{
    models::ExecutionDevice,
    session::{LifecycleError, LifecyclePhase, ModelSession, SessionLifecycle},
};
use std::sync::Arc;

use crate::common::{FakeCaptioner, FakeDepth2Img};

fn session() -> ModelSession {
    ModelSession::new(
        Arc::new(FakeCaptioner::default()),
        Arc::new(FakeDepth2Img::default()),
        ExecutionDevice::Cpu,
    )
}

#[tokio::test]
async fn test_full_lifecycle() {
    let lifecycle = SessionLifecycle::new();
    assert_eq!(lifecycle.phase().await, LifecyclePhase::Uninitialized);
    assert_eq!(lifecycle.phase().await.as_str(), "uninitialized");

    let ready = lifecycle.initialize(session()).await.unwrap();
    assert_eq!(ready.caption_model(), "fake/captioner");
    assert_eq!(lifecycle.phase().await, LifecyclePhase::Ready);

    assert!(lifecycle.shutdown().await);
    assert_eq!(lifecycle.phase().await.as_str(), "shutdown");
    assert!(matches!(lifecycle.current().await, Err(LifecycleError::ShutDown)));
}

#[tokio::test]
async fn test_shutdown_before_initialize() {
    let lifecycle = SessionLifecycle::new();
    assert!(lifecycle.shutdown().await);
    assert!(matches!(
        lifecycle.initialize(session()).await,
        Err(LifecycleError::ShutDown)
    ));
}

#[tokio::test]
async fn test_concurrent_readers_share_one_session() {
    let lifecycle = Arc::new(SessionLifecycle::new());
    lifecycle.initialize(session()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let lifecycle = lifecycle.clone();
        handles.push(tokio::spawn(async move { lifecycle.current().await.unwrap() }));
    }
    let first = lifecycle.current().await.unwrap();
    for handle in handles {
        assert!(Arc::ptr_eq(&first, &handle.await.unwrap()));
    }
}
