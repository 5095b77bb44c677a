// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use fabstir_image_node::{
    api::{create_router, AppState},
    cli::Args,
    config::ServerConfig,
    session::{ModelSession, SessionLifecycle},
    storage::OutputStore,
    version,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: &str) {
    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining requests");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);

    println!("🚀 Starting Fabstir Image Node...\n");
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("📅 Build Date: {}", version::BUILD_DATE);
    println!();

    let config = ServerConfig::from(args);
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    let addr = config.bind_addr().map_err(|e| anyhow!(e))?;

    // Models load before the listener binds; any failure ends the process
    println!("🧠 Loading models...");
    let lifecycle = Arc::new(SessionLifecycle::new());
    let session = ModelSession::load_async(config.clone())
        .await
        .context("Failed to load models")?;
    lifecycle.initialize(session).await?;
    println!("✅ Models ready");

    let output_store = match &config.output_dir {
        Some(dir) => Some(OutputStore::open(dir.clone(), config.output_max_files).await?),
        None => None,
    };

    let state = AppState::new(config, lifecycle.clone(), output_store)?;
    let app = create_router(state)?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("{} listening on {}", version::get_version_string(), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    lifecycle.shutdown().await;
    println!("👋 Goodbye!");
    Ok(())
}
