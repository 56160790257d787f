//! Hyperparameter grids and grid search
//!
//! Each model family carries its own grid; expansion order is fixed so
//! tie-breaks between equally scoring candidates are deterministic
//! (earliest candidate wins).

use super::cross_validation::FoldSplit;
use super::svm::SvrKernel;
use crate::error::{CardspendError, Result};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// RBF bandwidth setting, resolved against the training matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// 1 / (n_features * var(X))
    Scale,
    /// 1 / n_features
    Auto,
    Fixed(f64),
}

impl Gamma {
    pub fn resolve(&self, x: &Array2<f64>) -> f64 {
        let n_features = x.ncols().max(1) as f64;
        match self {
            Gamma::Scale => {
                let var = flat_variance(x);
                if var > 0.0 {
                    1.0 / (n_features * var)
                } else {
                    1.0 / n_features
                }
            }
            Gamma::Auto => 1.0 / n_features,
            Gamma::Fixed(v) => *v,
        }
    }
}

fn flat_variance(x: &Array2<f64>) -> f64 {
    let n = (x.nrows() * x.ncols()) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = x.iter().sum::<f64>() / n;
    x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// One random forest candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

/// Random forest search grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for ForestGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            max_depth: vec![Some(10), Some(20), Some(30), None],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
        }
    }
}

impl ForestGrid {
    /// Cartesian expansion in declaration order
    pub fn expand(&self) -> Vec<ForestParams> {
        let mut out = Vec::new();
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        out.push(ForestParams {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                        });
                    }
                }
            }
        }
        out
    }
}

/// One gradient boosting candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
}

/// Gradient boosting search grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub subsample: Vec<f64>,
}

impl Default for BoostingGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            max_depth: vec![3, 5, 7],
            learning_rate: vec![0.01, 0.1, 0.2],
            subsample: vec![0.8, 0.9, 1.0],
        }
    }
}

impl BoostingGrid {
    /// Cartesian expansion in declaration order
    pub fn expand(&self) -> Vec<BoostingParams> {
        let mut out = Vec::new();
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &learning_rate in &self.learning_rate {
                    for &subsample in &self.subsample {
                        out.push(BoostingParams {
                            n_estimators,
                            max_depth,
                            learning_rate,
                            subsample,
                        });
                    }
                }
            }
        }
        out
    }
}

/// One SVR candidate, with gamma already resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvrParams {
    pub c: f64,
    pub kernel: SvrKernel,
}

/// SVR search grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrGrid {
    pub c: Vec<f64>,
    /// Gamma variants for the rbf kernel
    pub rbf_gamma: Vec<Gamma>,
    /// Whether to include the linear kernel
    pub linear: bool,
}

impl Default for SvrGrid {
    fn default() -> Self {
        Self {
            c: vec![0.1, 1.0, 10.0],
            rbf_gamma: vec![Gamma::Scale, Gamma::Auto, Gamma::Fixed(0.1), Gamma::Fixed(0.01)],
            linear: true,
        }
    }
}

impl SvrGrid {
    /// Expand against the training matrix (gamma resolution needs it).
    /// Gamma applies to rbf only; the linear kernel gets one candidate
    /// per C value.
    pub fn expand(&self, x_train: &Array2<f64>) -> Vec<SvrParams> {
        let mut out = Vec::new();
        for &c in &self.c {
            for gamma in &self.rbf_gamma {
                out.push(SvrParams {
                    c,
                    kernel: SvrKernel::Rbf {
                        gamma: gamma.resolve(x_train),
                    },
                });
            }
            if self.linear {
                out.push(SvrParams {
                    c,
                    kernel: SvrKernel::Linear,
                });
            }
        }
        out
    }
}

/// Winning candidate of a grid search
#[derive(Debug, Clone)]
pub struct GridSearchOutcome<P> {
    pub params: P,
    /// Mean negative MSE across folds
    pub cv_score: f64,
    pub n_candidates: usize,
}

/// Exhaustive search: score every candidate by k-fold CV (negative MSE,
/// scaled space) and keep the best. Candidates evaluate in parallel;
/// ties keep the earliest candidate in grid order.
pub fn search<P, F>(
    candidates: Vec<P>,
    x: &Array2<f64>,
    y: &Array1<f64>,
    folds: &[FoldSplit],
    fit_predict: &F,
) -> Result<GridSearchOutcome<P>>
where
    P: Clone + Send + Sync,
    F: Fn(&P, &Array2<f64>, &Array1<f64>, &Array2<f64>) -> Result<Array1<f64>> + Sync,
{
    if candidates.is_empty() {
        return Err(CardspendError::InvalidParameter {
            name: "candidates".to_string(),
            value: "0".to_string(),
            reason: "grid expanded to no candidates".to_string(),
        });
    }

    let scores: Vec<f64> = candidates
        .par_iter()
        .map(|params| {
            let mut fold_scores = Vec::with_capacity(folds.len());
            for fold in folds {
                let x_tr = x.select(Axis(0), &fold.train_indices);
                let y_tr = y.select(Axis(0), &fold.train_indices);
                let x_te = x.select(Axis(0), &fold.test_indices);
                let y_te = y.select(Axis(0), &fold.test_indices);

                let pred = fit_predict(params, &x_tr, &y_tr, &x_te)?;
                let mse: f64 = y_te
                    .iter()
                    .zip(pred.iter())
                    .map(|(t, p)| (t - p).powi(2))
                    .sum::<f64>()
                    / y_te.len().max(1) as f64;
                fold_scores.push(-mse);
            }
            Ok(fold_scores.iter().sum::<f64>() / fold_scores.len().max(1) as f64)
        })
        .collect::<Result<Vec<f64>>>()?;

    let mut best_idx = 0;
    for (i, &score) in scores.iter().enumerate() {
        if score > scores[best_idx] {
            best_idx = i;
        }
    }

    Ok(GridSearchOutcome {
        params: candidates[best_idx].clone(),
        cv_score: scores[best_idx],
        n_candidates: candidates.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::cross_validation::KFold;

    #[test]
    fn test_forest_grid_size() {
        let grid = ForestGrid::default();
        assert_eq!(grid.expand().len(), 3 * 4 * 3 * 3);
    }

    #[test]
    fn test_boosting_grid_size() {
        let grid = BoostingGrid::default();
        assert_eq!(grid.expand().len(), 3 * 3 * 3 * 3);
    }

    #[test]
    fn test_svr_grid_size() {
        let x = Array2::from_shape_vec((4, 2), vec![1.0; 8]).unwrap();
        let grid = SvrGrid::default();
        // 3 C values × (4 rbf gammas + 1 linear)
        assert_eq!(grid.expand(&x).len(), 15);
    }

    #[test]
    fn test_gamma_auto() {
        let x = Array2::from_shape_vec((2, 4), vec![1.0; 8]).unwrap();
        assert_eq!(Gamma::Auto.resolve(&x), 0.25);
    }

    #[test]
    fn test_gamma_scale_constant_matrix() {
        // Zero variance falls back to 1/n_features
        let x = Array2::from_shape_vec((3, 2), vec![5.0; 6]).unwrap();
        assert_eq!(Gamma::Scale.resolve(&x), 0.5);
    }

    #[test]
    fn test_search_picks_lower_error() {
        // Candidate value is the constant each "model" predicts; the
        // target is constant 2.0, so candidate 2.0 must win.
        let x = Array2::from_shape_vec((8, 1), (0..8).map(|i| i as f64).collect()).unwrap();
        let y = Array1::from_elem(8, 2.0);
        let folds = KFold::new(2).with_random_state(1).split(8).unwrap();

        let outcome = search(
            vec![0.0f64, 2.0, 5.0],
            &x,
            &y,
            &folds,
            &|&c, _xt, _yt, xe| Ok(Array1::from_elem(xe.nrows(), c)),
        )
        .unwrap();

        assert_eq!(outcome.params, 2.0);
        assert_eq!(outcome.n_candidates, 3);
        assert!((outcome.cv_score - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_search_tie_keeps_first() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0; 4]).unwrap();
        let y = Array1::from_elem(4, 1.0);
        let folds = KFold::new(2).with_random_state(1).split(4).unwrap();

        // Both candidates score identically; the earlier one must win.
        let outcome = search(
            vec!["first", "second"],
            &x,
            &y,
            &folds,
            &|_, _xt, _yt, xe| Ok(Array1::from_elem(xe.nrows(), 1.0)),
        )
        .unwrap();

        assert_eq!(outcome.params, "first");
    }

    #[test]
    fn test_search_empty_grid() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0; 4]).unwrap();
        let y = Array1::from_elem(4, 1.0);
        let folds = KFold::new(2).split(4).unwrap();

        let result = search(Vec::<usize>::new(), &x, &y, &folds, &|_, _, _, xe| {
            Ok(Array1::zeros(xe.nrows()))
        });
        assert!(result.is_err());
    }
}
