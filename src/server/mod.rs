// ============================================================
// HTTP Presentation — axum server
// ============================================================
// The second way in, next to the CLI. Routes:
//
//   GET  /          → <static_dir>/index.html
//   POST /predict   → multipart (age, gender, location, image)
//                     → {prediction, confidence, dx_full}
//
// Shared state is one Arc<AppState> holding the immutable
// PredictionService, so handlers never take a lock.
//
// Request bodies are capped at 16 MiB; CORS allows any origin
// for GET and POST.
//
// Reference: axum docs (Router, State, Multipart)

pub mod handlers;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use std::{path::PathBuf, sync::Arc};
use tower_http::cors::{Any, CorsLayer};

use crate::application::predict_use_case::PredictionService;
use handlers::{index_handler, predict_handler};

pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared state threaded through axum handlers via `State`.
pub struct AppState {
    /// Built once at start-up, read-only afterwards
    pub service:    Arc<PredictionService>,
    /// Directory holding index.html
    pub static_dir: PathBuf,
}

/// Build the axum [`Router`] with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/predict", post(predict_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Bind `listen` and serve until the process is stopped.
pub async fn serve(listen: &str, state: Arc<AppState>) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Cannot bind '{listen}'"))?;
    tracing::info!("Prediction server listening on http://{}", listen);

    axum::serve(listener, app).await.context("HTTP server stopped")?;
    Ok(())
}
