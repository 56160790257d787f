//! Prediction engine
//!
//! Composes encoder → scaler_x → model → inverse scaler_y over an
//! immutable, injected artifact. Every call is independent; batch and
//! single prediction are equivalent and order-preserving.

use crate::artifact::{ArtifactCache, ModelArtifact};
use crate::error::{CardspendError, Result};
use crate::preprocessing::OneHotEncoder;
use crate::record::{records_to_df, Record, CATEGORICAL_FIELDS, REQUIRED_FIELDS};
use crate::training::RegressionMetrics;
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A record augmented with its predicted expenditure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(flatten)]
    pub record: Record,
    pub predicted_expenditure: f64,
}

/// Inference engine over a loaded artifact.
pub struct Predictor {
    artifact: Arc<ModelArtifact>,
}

impl Predictor {
    /// Build a predictor over an already-loaded artifact.
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self { artifact }
    }

    /// Build a predictor from the process-wide artifact cache.
    pub fn from_cache(cache: &ArtifactCache) -> Result<Self> {
        Ok(Self::new(cache.get()?))
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Metrics stored with the artifact, if any.
    pub fn metrics(&self) -> Option<&RegressionMetrics> {
        self.artifact.metrics.as_ref()
    }

    /// Predict expenditure for a single record.
    pub fn predict(&self, record: &Record) -> Result<f64> {
        let values = self.predict_batch(std::slice::from_ref(record))?;
        Ok(values[0])
    }

    /// Predict expenditure for a batch, aligned 1:1 with input order.
    pub fn predict_batch(&self, records: &[Record]) -> Result<Vec<f64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let df = records_to_df(records)?;
        self.predict_df(&df)
    }

    /// Predict and return each record augmented with its value.
    pub fn predict_records(&self, records: &[Record]) -> Result<Vec<Prediction>> {
        let values = self.predict_batch(records)?;
        Ok(records
            .iter()
            .cloned()
            .zip(values)
            .map(|(record, predicted_expenditure)| Prediction {
                record,
                predicted_expenditure,
            })
            .collect())
    }

    /// Predict over a raw frame. Required fields are validated first;
    /// extra columns (including a target column) are dropped by the
    /// schema reindex.
    pub fn predict_df(&self, df: &DataFrame) -> Result<Vec<f64>> {
        for field in REQUIRED_FIELDS {
            if df.column(field).is_err() {
                return Err(CardspendError::Schema {
                    field: field.to_string(),
                });
            }
        }

        // Expand whatever categories the input carries; the reindex
        // against the training schema zero-fills the rest.
        let mut encoder = OneHotEncoder::new(&CATEGORICAL_FIELDS);
        let encoded = encoder.fit_transform(df)?;
        let aligned = self.artifact.schema.reindex(&encoded)?;

        let scaled = self.artifact.scaler_x.transform(&aligned)?;
        let x = self.artifact.schema.to_matrix(&scaled)?;

        let y_scaled = self.artifact.model.predict(&x)?;
        let y = self.artifact.scaler_y.inverse_transform(&y_scaled)?;

        Ok(y.to_vec())
    }

    /// Recompute metrics over a labeled frame. This is the fallback when
    /// an artifact carries no stored metrics.
    pub fn evaluate(&self, df: &DataFrame, target_column: &str) -> Result<RegressionMetrics> {
        let target = df.column(target_column).map_err(|_| CardspendError::Schema {
            field: target_column.to_string(),
        })?;
        let y_true: Array1<f64> = target
            .cast(&DataType::Float64)
            .map_err(|e| CardspendError::Data(e.to_string()))?
            .f64()
            .map_err(|e| CardspendError::Data(e.to_string()))?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();

        let predictions = Array1::from_vec(self.predict_df(df)?);
        Ok(RegressionMetrics::compute(&y_true, &predictions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactStore, TrainedModel};
    use crate::preprocessing::{FeatureSchema, FeatureScaler, TargetScaler};
    use crate::record::YesNo;
    use crate::training::{SvrConfig, SvrKernel, SvrRegressor};
    use ndarray::array;

    // A hand-assembled artifact over the real feature layout, so
    // predictor tests don't need a full training run.
    fn test_artifact() -> Arc<ModelArtifact> {
        let columns: Vec<String> = [
            "reports",
            "age",
            "income",
            "share",
            "dependents",
            "months",
            "majorcards",
            "active",
            "owner_no",
            "owner_yes",
            "selfemp_no",
            "selfemp_yes",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let schema = FeatureSchema::new(columns.clone());

        let y = array![10.0, 20.0, 30.0, 40.0, 50.0, 60.0];

        let df = schema
            .reindex(
                &DataFrame::new(
                    columns
                        .iter()
                        .enumerate()
                        .map(|(c, name)| {
                            Series::new(
                                name.as_str().into(),
                                (0..6).map(|r| ((r + c) % 5) as f64).collect::<Vec<f64>>(),
                            )
                            .into()
                        })
                        .collect(),
                )
                .unwrap(),
            )
            .unwrap();

        let mut scaler_x = FeatureScaler::new();
        scaler_x.fit(&df, schema.columns()).unwrap();

        let mut scaler_y = TargetScaler::new();
        scaler_y.fit(&y);

        let mut model = SvrRegressor::new(SvrConfig {
            kernel: SvrKernel::Linear,
            max_iter: 100,
            ..Default::default()
        });
        let x_scaled = schema.to_matrix(&scaler_x.transform(&df).unwrap()).unwrap();
        let y_scaled = scaler_y.transform(&y).unwrap();
        model.fit(&x_scaled, &y_scaled).unwrap();

        Arc::new(ModelArtifact::new(
            TrainedModel::Svr(model),
            scaler_x,
            scaler_y,
            schema,
            None,
        ))
    }

    fn example_record() -> Record {
        Record {
            reports: 2,
            age: 35.0,
            income: 4.5,
            share: 0.1,
            owner: YesNo::Yes,
            selfemp: YesNo::No,
            dependents: 0,
            months: 12,
            majorcards: 1,
            active: 2,
        }
    }

    #[test]
    fn test_single_prediction_is_finite() {
        let predictor = Predictor::new(test_artifact());
        let value = predictor.predict(&example_record()).unwrap();
        assert!(value.is_finite());
    }

    #[test]
    fn test_batch_single_equivalence() {
        let predictor = Predictor::new(test_artifact());
        let record = example_record();

        let single = predictor.predict(&record).unwrap();
        let batch = predictor.predict_batch(&[record]).unwrap();
        assert!((single - batch[0]).abs() < 1e-12);
    }

    #[test]
    fn test_empty_batch() {
        let predictor = Predictor::new(test_artifact());
        assert!(predictor.predict_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_field_in_frame() {
        let predictor = Predictor::new(test_artifact());
        let df = df!("age" => &[35.0]).unwrap();

        match predictor.predict_df(&df) {
            Err(CardspendError::Schema { field }) => assert_eq!(field, "reports"),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_predict_records_augments() {
        let predictor = Predictor::new(test_artifact());
        let record = example_record();

        let predictions = predictor.predict_records(&[record.clone()]).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].record, record);
        assert!(predictions[0].predicted_expenditure.is_finite());
    }

    #[test]
    fn test_roundtrip_through_store_preserves_predictions() {
        let artifact = test_artifact();
        let predictor = Predictor::new(artifact.clone());
        let record = example_record();
        let before = predictor.predict(&record).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        ArtifactStore::save(&artifact, &path).unwrap();

        let reloaded = Predictor::new(Arc::new(ArtifactStore::load(&path).unwrap()));
        let after = reloaded.predict(&record).unwrap();
        assert!((before - after).abs() < 1e-12);
    }
}
