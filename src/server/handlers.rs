//! HTTP request handlers

use super::error::ApiError;
use super::AppState;
use crate::record::Record;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::info;

/// Health check
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Predict for a single record (JSON object) or an ordered batch
/// (JSON array). The response mirrors the input shape, each record
/// augmented with `predicted_expenditure`.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match body {
        serde_json::Value::Array(items) => {
            let records: Vec<Record> = items
                .iter()
                .map(Record::from_json_value)
                .collect::<crate::error::Result<Vec<_>>>()?;

            let predictions = state.predictor.predict_records(&records)?;
            info!(count = predictions.len(), "served batch prediction");
            Ok(Json(serde_json::to_value(predictions).map_err(|e| {
                ApiError::Internal(e.to_string())
            })?))
        }
        value => {
            let record = Record::from_json_value(&value)?;
            let predictions = state.predictor.predict_records(&[record])?;
            info!("served single prediction");
            Ok(Json(serde_json::to_value(&predictions[0]).map_err(
                |e| ApiError::Internal(e.to_string()),
            )?))
        }
    }
}

/// Model metrics: the ones stored with the artifact, or recomputed over
/// the configured dataset when the artifact carries none.
pub async fn metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(stored) = state.predictor.metrics() {
        return Ok(Json(serde_json::json!({
            "source": "training",
            "metrics": stored,
        })));
    }

    match &state.dataset {
        Some(df) => {
            let recomputed = state.predictor.evaluate(df, &state.target_column)?;
            Ok(Json(serde_json::json!({
                "source": "recomputed",
                "metrics": recomputed,
            })))
        }
        None => Err(ApiError::NotFound(
            "artifact carries no metrics and no dataset is configured".to_string(),
        )),
    }
}
