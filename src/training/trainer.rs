//! Training pipeline
//!
//! Splits the dataset, fits the scaler pair on the training partition,
//! grid-searches the three model families, evaluates each on the held-out
//! partition in original target units, selects the best by R², persists
//! the artifact, and writes comparison plots best-effort.

use super::cross_validation::{FoldSplit, KFold};
use super::grid::{self, BoostingGrid, BoostingParams, ForestGrid, ForestParams, SvrGrid, SvrParams};
use super::metrics::RegressionMetrics;
use crate::artifact::{ArtifactStore, ModelArtifact, TrainedModel};
use crate::error::{CardspendError, Result};
use crate::plots;
use crate::preprocessing::{FeatureSchema, FeatureScaler, OneHotEncoder, TargetScaler};
use crate::record::CATEGORICAL_FIELDS;
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::random_forest::RandomForestRegressor;
use super::svm::{SvrConfig, SvrRegressor};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// The candidate regressor families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFamily {
    RandomForest,
    GradientBoosting,
    Svr,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::Svr => "svr",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Target column name
    pub target_column: String,
    /// Columns dropped before encoding (identifiers, leakage columns)
    pub drop_columns: Vec<String>,
    /// Held-out test fraction
    pub test_split: f64,
    /// Number of cross-validation folds
    pub cv_folds: usize,
    /// Random seed for the split, CV shuffling, and model fits
    pub random_seed: u64,
    /// Random forest search grid
    pub forest_grid: ForestGrid,
    /// Gradient boosting search grid
    pub boosting_grid: BoostingGrid,
    /// SVR search grid
    pub svr_grid: SvrGrid,
    /// Where the artifact is persisted
    pub artifact_path: PathBuf,
    /// Where comparison plots go (None disables plotting)
    pub plots_dir: Option<PathBuf>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            target_column: "expenditure".to_string(),
            drop_columns: vec!["card".to_string()],
            test_split: 0.2,
            cv_folds: 5,
            random_seed: 42,
            forest_grid: ForestGrid::default(),
            boosting_grid: BoostingGrid::default(),
            svr_grid: SvrGrid::default(),
            artifact_path: PathBuf::from("models/expenditure_model.json"),
            plots_dir: Some(PathBuf::from("plots")),
        }
    }
}

impl TrainerConfig {
    /// Builder method to set the target column
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    /// Builder method to set the test fraction
    pub fn with_test_split(mut self, split: f64) -> Self {
        self.test_split = split;
        self
    }

    /// Builder method to set CV folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Builder method to set the artifact path
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    /// Builder method to set (or disable) the plots directory
    pub fn with_plots_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.plots_dir = dir;
        self
    }

    /// Builder method to set the forest grid
    pub fn with_forest_grid(mut self, grid: ForestGrid) -> Self {
        self.forest_grid = grid;
        self
    }

    /// Builder method to set the boosting grid
    pub fn with_boosting_grid(mut self, grid: BoostingGrid) -> Self {
        self.boosting_grid = grid;
        self
    }

    /// Builder method to set the SVR grid
    pub fn with_svr_grid(mut self, grid: SvrGrid) -> Self {
        self.svr_grid = grid;
        self
    }
}

/// Held-out evaluation of one model family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyEvaluation {
    pub family: ModelFamily,
    /// Mean negative MSE across CV folds (scaled space)
    pub cv_score: f64,
    /// Test-set metrics in original target units
    pub metrics: RegressionMetrics,
    pub training_time_secs: f64,
    /// Test-set predictions in original units, for the scatter plot
    pub predictions: Vec<f64>,
}

/// Outcome of a full training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub evaluations: Vec<FamilyEvaluation>,
    pub best_family: ModelFamily,
    pub artifact_path: PathBuf,
}

/// Main training pipeline
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run the full pipeline on a raw training frame.
    pub fn train(&self, df: &DataFrame) -> Result<(ModelArtifact, TrainReport)> {
        let n = df.height();
        if n < 10 {
            return Err(CardspendError::InvalidParameter {
                name: "n_samples".to_string(),
                value: n.to_string(),
                reason: "need at least 10 rows to train".to_string(),
            });
        }

        // Target
        let target = df
            .column(&self.config.target_column)
            .map_err(|_| CardspendError::Schema {
                field: self.config.target_column.clone(),
            })?;
        let y_all: Array1<f64> = target
            .cast(&DataType::Float64)
            .map_err(|e| CardspendError::Data(e.to_string()))?
            .f64()
            .map_err(|e| CardspendError::Data(e.to_string()))?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect();

        // Features: everything except the target and dropped columns
        let mut features = df
            .drop(&self.config.target_column)
            .map_err(|e| CardspendError::Data(e.to_string()))?;
        for col in &self.config.drop_columns {
            if features.column(col).is_ok() {
                features = features
                    .drop(col)
                    .map_err(|e| CardspendError::Data(e.to_string()))?;
            }
        }

        // One-hot encode and freeze the column layout
        let mut encoder = OneHotEncoder::new(&CATEGORICAL_FIELDS);
        let encoded = encoder.fit_transform(&features)?;
        let schema = FeatureSchema::new(
            encoded
                .get_column_names()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        let aligned = schema.reindex(&encoded)?;

        // Seeded shuffle split
        let (train_idx, test_idx) = self.split_indices(n);
        let train_df = take_rows(&aligned, &train_idx)?;
        let test_df = take_rows(&aligned, &test_idx)?;
        let y_train = y_all.select(Axis(0), &train_idx);
        let y_test = y_all.select(Axis(0), &test_idx);

        // Scalers fit on the training partition only
        let mut scaler_x = FeatureScaler::new();
        scaler_x.fit(&train_df, schema.columns())?;
        let x_train = schema.to_matrix(&scaler_x.transform(&train_df)?)?;
        let x_test = schema.to_matrix(&scaler_x.transform(&test_df)?)?;

        let mut scaler_y = TargetScaler::new();
        scaler_y.fit(&y_train);
        let y_train_scaled = scaler_y.transform(&y_train)?;

        let folds = KFold::new(self.config.cv_folds)
            .with_random_state(self.config.random_seed)
            .split(x_train.nrows())?;

        info!(
            rows = n,
            features = schema.len(),
            folds = self.config.cv_folds,
            "starting grid search"
        );

        // Grid-search each family; a failing family is skipped, not fatal
        let mut evaluations: Vec<FamilyEvaluation> = Vec::new();
        let mut models: Vec<TrainedModel> = Vec::new();

        for family in [
            ModelFamily::RandomForest,
            ModelFamily::GradientBoosting,
            ModelFamily::Svr,
        ] {
            let started = Instant::now();
            match self.evaluate_family(family, &x_train, &y_train_scaled, &x_test, &folds) {
                Ok((model, cv_score, pred_scaled)) => {
                    let predictions = scaler_y.inverse_transform(&pred_scaled)?;
                    let metrics = RegressionMetrics::compute(&y_test, &predictions);
                    info!(
                        family = family.as_str(),
                        r2 = metrics.r2,
                        rmse = metrics.rmse,
                        "family evaluated"
                    );
                    evaluations.push(FamilyEvaluation {
                        family,
                        cv_score,
                        metrics,
                        training_time_secs: started.elapsed().as_secs_f64(),
                        predictions: predictions.to_vec(),
                    });
                    models.push(model);
                }
                Err(e) => {
                    warn!(family = family.as_str(), error = %e, "grid search failed, skipping family");
                }
            }
        }

        if evaluations.is_empty() {
            return Err(CardspendError::TrainingFailure);
        }

        // Best by R² descending; ties by RMSE ascending, then family name
        let mut order: Vec<usize> = (0..evaluations.len()).collect();
        order.sort_by(|&a, &b| {
            let (ma, mb) = (&evaluations[a].metrics, &evaluations[b].metrics);
            mb.r2
                .partial_cmp(&ma.r2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    ma.rmse
                        .partial_cmp(&mb.rmse)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(evaluations[a].family.as_str().cmp(evaluations[b].family.as_str()))
        });
        let best_idx = order[0];
        let best_family = evaluations[best_idx].family;

        let artifact = ModelArtifact::new(
            models.swap_remove(best_idx),
            scaler_x,
            scaler_y,
            schema,
            Some(evaluations[best_idx].metrics.clone()),
        );

        ArtifactStore::save(&artifact, &self.config.artifact_path)?;
        info!(
            family = best_family.as_str(),
            path = %self.config.artifact_path.display(),
            "best model persisted"
        );

        if let Some(dir) = &self.config.plots_dir {
            if let Err(e) = plots::write_comparison_plots(dir, &evaluations, &y_test.to_vec()) {
                warn!(error = %e, "failed to write comparison plots");
            }
        }

        let report = TrainReport {
            evaluations,
            best_family,
            artifact_path: self.config.artifact_path.clone(),
        };

        Ok((artifact, report))
    }

    fn split_indices(&self, n: usize) -> (Vec<usize>, Vec<usize>) {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_seed);
        indices.shuffle(&mut rng);

        let test_size = ((n as f64) * self.config.test_split).ceil() as usize;
        let test_size = test_size.clamp(1, n - 1);

        let test_idx = indices[..test_size].to_vec();
        let train_idx = indices[test_size..].to_vec();
        (train_idx, test_idx)
    }

    /// Grid search one family on the training partition, refit the best
    /// candidate, and predict the held-out partition (still scaled).
    fn evaluate_family(
        &self,
        family: ModelFamily,
        x_train: &Array2<f64>,
        y_train_scaled: &Array1<f64>,
        x_test: &Array2<f64>,
        folds: &[FoldSplit],
    ) -> Result<(TrainedModel, f64, Array1<f64>)> {
        let seed = self.config.random_seed;

        match family {
            ModelFamily::RandomForest => {
                let outcome = grid::search(
                    self.config.forest_grid.expand(),
                    x_train,
                    y_train_scaled,
                    folds,
                    &|params, xt, yt, xe| fit_forest(params, seed, xt, yt)?.predict(xe),
                )?;
                let model = fit_forest(&outcome.params, seed, x_train, y_train_scaled)?;
                let pred = model.predict(x_test)?;
                Ok((TrainedModel::RandomForest(model), outcome.cv_score, pred))
            }
            ModelFamily::GradientBoosting => {
                let outcome = grid::search(
                    self.config.boosting_grid.expand(),
                    x_train,
                    y_train_scaled,
                    folds,
                    &|params, xt, yt, xe| fit_boosting(params, seed, xt, yt)?.predict(xe),
                )?;
                let model = fit_boosting(&outcome.params, seed, x_train, y_train_scaled)?;
                let pred = model.predict(x_test)?;
                Ok((TrainedModel::GradientBoosting(model), outcome.cv_score, pred))
            }
            ModelFamily::Svr => {
                let outcome = grid::search(
                    self.config.svr_grid.expand(x_train),
                    x_train,
                    y_train_scaled,
                    folds,
                    &|params, xt, yt, xe| fit_svr(params, xt, yt)?.predict(xe),
                )?;
                let model = fit_svr(&outcome.params, x_train, y_train_scaled)?;
                let pred = model.predict(x_test)?;
                Ok((TrainedModel::Svr(model), outcome.cv_score, pred))
            }
        }
    }
}

fn fit_forest(
    params: &ForestParams,
    seed: u64,
    x: &Array2<f64>,
    y: &Array1<f64>,
) -> Result<RandomForestRegressor> {
    let mut forest = RandomForestRegressor::new(params.n_estimators)
        .with_min_samples_split(params.min_samples_split)
        .with_min_samples_leaf(params.min_samples_leaf)
        .with_random_state(seed);
    if let Some(depth) = params.max_depth {
        forest = forest.with_max_depth(depth);
    }
    forest.fit(x, y)?;
    Ok(forest)
}

fn fit_boosting(
    params: &BoostingParams,
    seed: u64,
    x: &Array2<f64>,
    y: &Array1<f64>,
) -> Result<GradientBoostingRegressor> {
    let config = GradientBoostingConfig {
        n_estimators: params.n_estimators,
        learning_rate: params.learning_rate,
        max_depth: params.max_depth,
        subsample: params.subsample,
        random_state: Some(seed),
        ..Default::default()
    };
    let mut model = GradientBoostingRegressor::new(config);
    model.fit(x, y)?;
    Ok(model)
}

fn fit_svr(params: &SvrParams, x: &Array2<f64>, y: &Array1<f64>) -> Result<SvrRegressor> {
    let config = SvrConfig {
        c: params.c,
        kernel: params.kernel.clone(),
        ..Default::default()
    };
    let mut model = SvrRegressor::new(config);
    model.fit(x, y)?;
    Ok(model)
}

fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = UInt32Chunked::from_vec("idx".into(), indices.iter().map(|&i| i as u32).collect());
    df.take(&idx).map_err(|e| CardspendError::Data(e.to_string()))
}
