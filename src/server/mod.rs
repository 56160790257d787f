//! JSON HTTP API
//!
//! Thin serving layer over the predictor: health, prediction, and model
//! metrics endpoints. This is the boundary the dashboard consumes; it
//! returns JSON only.

mod error;
mod handlers;

pub use error::ApiError;

use crate::artifact::ArtifactCache;
use crate::data::DatasetLoader;
use crate::error::Result;
use crate::predictor::Predictor;
use axum::routing::{get, post};
use axum::Router;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Artifact the predictor serves
    pub artifact_path: PathBuf,
    /// Optional labeled dataset used to recompute metrics when the
    /// artifact carries none
    pub dataset_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            artifact_path: PathBuf::from("models/expenditure_model.json"),
            dataset_path: None,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub predictor: Predictor,
    /// Labeled frame for the metrics fallback, if configured
    pub dataset: Option<DataFrame>,
    pub target_column: String,
}

/// Build the API router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/predict", post(handlers::predict))
        .route("/api/metrics", get(handlers::metrics))
        .with_state(state)
}

/// Load the artifact, bind, and serve until shutdown.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let cache = ArtifactCache::new(&config.artifact_path);
    let predictor = Predictor::from_cache(&cache)?;

    let dataset = match &config.dataset_path {
        Some(path) => Some(DatasetLoader::new().load_csv(path)?),
        None => None,
    };

    let state = Arc::new(AppState {
        predictor,
        dataset,
        target_column: "expenditure".to_string(),
    });

    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "serving prediction API");

    axum::serve(listener, app).await?;
    Ok(())
}
