//! Model artifact: the persistence unit shared by trainer and predictor
//!
//! An artifact bundles the trained model, the fitted scaler pair, the
//! feature schema, and the held-out evaluation metrics. It is created
//! once by a training run, never mutated, and replaced wholesale by
//! retraining.

use crate::error::{CardspendError, Result};
use crate::preprocessing::{FeatureSchema, FeatureScaler, TargetScaler};
use crate::training::{
    GradientBoostingRegressor, ModelFamily, RandomForestRegressor, RegressionMetrics, SvrRegressor,
};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// A fitted regressor from one of the candidate families
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(RandomForestRegressor),
    GradientBoosting(GradientBoostingRegressor),
    Svr(SvrRegressor),
}

impl TrainedModel {
    /// Point predictions in scaled target space
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.predict(x),
            TrainedModel::GradientBoosting(m) => m.predict(x),
            TrainedModel::Svr(m) => m.predict(x),
        }
    }

    /// Feature importances, where the family provides them
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.feature_importances().cloned(),
            TrainedModel::GradientBoosting(m) => {
                Some(Array1::from_vec(m.feature_importances().to_vec()))
            }
            TrainedModel::Svr(_) => None,
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            TrainedModel::RandomForest(_) => ModelFamily::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelFamily::GradientBoosting,
            TrainedModel::Svr(_) => ModelFamily::Svr,
        }
    }
}

/// The serialized bundle `{model, scaler_x, scaler_y, schema, metrics}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: TrainedModel,
    pub scaler_x: FeatureScaler,
    pub scaler_y: TargetScaler,
    pub schema: FeatureSchema,
    /// Held-out metrics from the training run; absent on older artifacts
    #[serde(default)]
    pub metrics: Option<RegressionMetrics>,
    #[serde(default)]
    pub trained_at: String,
}

impl ModelArtifact {
    pub fn new(
        model: TrainedModel,
        scaler_x: FeatureScaler,
        scaler_y: TargetScaler,
        schema: FeatureSchema,
        metrics: Option<RegressionMetrics>,
    ) -> Self {
        Self {
            model,
            scaler_x,
            scaler_y,
            schema,
            metrics,
            trained_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Atomic single-file save/load of a [`ModelArtifact`].
pub struct ArtifactStore;

impl ArtifactStore {
    /// Serialize the artifact to `path`, writing a temp file in the same
    /// directory and renaming it over the destination.
    pub fn save(artifact: &ModelArtifact, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string(artifact)?;

        let file_name = path
            .file_name()
            .ok_or_else(|| CardspendError::InvalidParameter {
                name: "path".to_string(),
                value: path.display().to_string(),
                reason: "artifact path has no file name".to_string(),
            })?;
        let tmp = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load an artifact. A missing file is `ArtifactNotFound`; anything
    /// that fails to deserialize (bad JSON, missing `model`/`scaler_x`/
    /// `scaler_y`/`schema` keys) is `ArtifactCorrupt`.
    pub fn load(path: &Path) -> Result<ModelArtifact> {
        if !path.exists() {
            return Err(CardspendError::ArtifactNotFound {
                path: path.display().to_string(),
            });
        }

        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| CardspendError::ArtifactCorrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Load-once artifact holder. Constructed at process start and passed by
/// reference to every consumer; the first `get` reads the file, later
/// calls share the same `Arc`.
pub struct ArtifactCache {
    path: PathBuf,
    slot: OnceLock<Arc<ModelArtifact>>,
}

impl ArtifactCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            slot: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached artifact, loading it on first use.
    pub fn get(&self) -> Result<Arc<ModelArtifact>> {
        if let Some(artifact) = self.slot.get() {
            return Ok(artifact.clone());
        }
        let loaded = Arc::new(ArtifactStore::load(&self.path)?);
        Ok(self.slot.get_or_init(|| loaded).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{SvrConfig, SvrKernel};
    use ndarray::array;

    fn small_artifact() -> ModelArtifact {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 0.5, 1.0, 1.5];

        let mut model = SvrRegressor::new(SvrConfig {
            kernel: SvrKernel::Linear,
            max_iter: 200,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let df = polars::df!("f" => &[0.0, 1.0, 2.0, 3.0]).unwrap();
        let mut scaler_x = FeatureScaler::new();
        scaler_x.fit(&df, &["f".to_string()]).unwrap();

        let mut scaler_y = TargetScaler::new();
        scaler_y.fit(&array![0.0, 10.0]);

        ModelArtifact::new(
            TrainedModel::Svr(model),
            scaler_x,
            scaler_y,
            FeatureSchema::new(vec!["f".to_string()]),
            None,
        )
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let artifact = small_artifact();
        ArtifactStore::save(&artifact, &path).unwrap();

        let loaded = ArtifactStore::load(&path).unwrap();
        assert_eq!(loaded.schema, artifact.schema);

        let x = array![[1.5], [2.5]];
        let original = artifact.model.predict(&x).unwrap();
        let restored = loaded.model.predict(&x).unwrap();
        for (a, b) in original.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_load_missing_path() {
        let err = ArtifactStore::load(Path::new("no/such/artifact.json")).unwrap_err();
        assert!(matches!(err, CardspendError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_load_missing_model_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"scaler_x": {}, "scaler_y": {}}"#).unwrap();

        let err = ArtifactStore::load(&path).unwrap_err();
        assert!(matches!(err, CardspendError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn test_cache_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        ArtifactStore::save(&small_artifact(), &path).unwrap();

        let cache = ArtifactCache::new(&path);
        let first = cache.get().unwrap();

        // Delete the file; the cached Arc must keep serving
        std::fs::remove_file(&path).unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_missing_artifact() {
        let cache = ArtifactCache::new("no/such/model.json");
        assert!(matches!(
            cache.get(),
            Err(CardspendError::ArtifactNotFound { .. })
        ));
    }
}
