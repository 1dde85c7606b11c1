use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use facematch_core::OnnxFaceAnalyzer;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

mod acquire;
mod config;
mod deadline;
mod engine;
mod http;
mod state;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        addr = %config.listen_addr(),
        model_dir = %config.model_dir.display(),
        timeouts = ?config.timeouts,
        "facematchd starting"
    );

    let state = Arc::new(AppState::new(config.clone()).context("failed to build HTTP client")?);

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;

    // Serve immediately; /compare answers 503 until the models are published.
    let load_failed = Arc::new(Notify::new());
    let loader = tokio::spawn({
        let state = Arc::clone(&state);
        let load_failed = Arc::clone(&load_failed);
        async move {
            let result = load_models(&state, &config).await;
            if let Err(err) = &result {
                tracing::error!(error = %err, "model loading failed");
                load_failed.notify_one();
            }
            result
        }
    });

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal(load_failed))
        .await
        .context("HTTP server error")?;

    if loader.is_finished() {
        loader.await.context("model loader task failed")??;
    } else {
        loader.abort();
    }

    tracing::info!("facematchd stopped");
    Ok(())
}

/// Load both ONNX models on the blocking pool and publish them.
async fn load_models(state: &AppState, config: &Config) -> Result<()> {
    let started = Instant::now();
    let model_dir = config.model_dir.clone();
    let detection = config.detection;

    let analyzer = tokio::task::spawn_blocking(move || OnnxFaceAnalyzer::load(&model_dir, detection))
        .await
        .context("model loading task panicked")??;

    state.publish_analyzer(Arc::new(analyzer));
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "models loaded, facematchd ready"
    );
    Ok(())
}

async fn shutdown_signal(load_failed: Arc<Notify>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("facematchd shutting down"),
            Err(err) => tracing::error!(error = %err, "failed to listen for ctrl-c; shutting down"),
        },
        _ = load_failed.notified() => tracing::warn!("shutting down: models unavailable"),
    }
}
