//! Epsilon support-vector regression
//!
//! Kernel SVR trained by iterative alpha updates over a precomputed
//! kernel matrix with an epsilon-insensitive loss.

use crate::error::{CardspendError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SvrKernel {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    Rbf { gamma: f64 },
}

impl Default for SvrKernel {
    fn default() -> Self {
        SvrKernel::Rbf { gamma: 1.0 }
    }
}

/// SVR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: SvrKernel,
    /// Epsilon tube width
    pub epsilon: f64,
    /// Tolerance for the stopping criterion
    pub tol: f64,
    /// Maximum number of iterations
    pub max_iter: usize,
}

impl Default for SvrConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: SvrKernel::default(),
            epsilon: 0.1,
            tol: 1e-3,
            max_iter: 1000,
        }
    }
}

/// Support vector regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrRegressor {
    config: SvrConfig,
    support_vectors: Option<Array2<f64>>,
    // alpha - alpha*
    alphas: Option<Array1<f64>>,
    bias: f64,
    is_fitted: bool,
}

impl SvrRegressor {
    pub fn new(config: SvrConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            alphas: None,
            bias: 0.0,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &SvrConfig {
        &self.config
    }

    /// Fit on the epsilon-insensitive loss with iterative alpha updates
    /// and a convergence check.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();

        if n != y.len() {
            return Err(CardspendError::Shape {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(CardspendError::InvalidParameter {
                name: "n_samples".to_string(),
                value: n.to_string(),
                reason: format!(
                    "exceeds the maximum {} for the SVR kernel matrix",
                    MAX_KERNEL_MATRIX_SAMPLES
                ),
            });
        }

        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut alphas_star: Array1<f64> = Array1::zeros(n);
        let mut bias: f64 = 0.0;

        let kernel_matrix = self.compute_kernel_matrix(x);
        let learning_rate: f64 = 0.01;

        for _iter in 0..self.config.max_iter {
            let mut max_change: f64 = 0.0;

            for i in 0..n {
                let mut pred: f64 = bias;
                for j in 0..n {
                    pred += (alphas[j] - alphas_star[j]) * kernel_matrix[[j, i]];
                }

                let error: f64 = pred - y[i];

                if error > self.config.epsilon {
                    let new_val = (alphas_star[i] + learning_rate).min(self.config.c);
                    max_change = max_change.max((new_val - alphas_star[i]).abs());
                    alphas_star[i] = new_val;
                } else if error < -self.config.epsilon {
                    let new_val = (alphas[i] + learning_rate).min(self.config.c);
                    max_change = max_change.max((new_val - alphas[i]).abs());
                    alphas[i] = new_val;
                }

                let bias_update = learning_rate * 0.1 * error;
                max_change = max_change.max(bias_update.abs());
                bias -= bias_update;
            }

            if max_change < self.config.tol {
                break;
            }
        }

        let combined_alphas = &alphas - &alphas_star;

        let support_indices: Vec<usize> = combined_alphas
            .iter()
            .enumerate()
            .filter(|(_, a)| a.abs() > 1e-8)
            .map(|(i, _)| i)
            .collect();

        if support_indices.is_empty() {
            // Degenerate fit: fall back to all points
            self.support_vectors = Some(x.clone());
            self.alphas = Some(combined_alphas);
        } else {
            let n_features = x.ncols();
            let mut support_vectors = Array2::zeros((support_indices.len(), n_features));
            let mut support_alphas = Array1::zeros(support_indices.len());

            for (i, &idx) in support_indices.iter().enumerate() {
                support_vectors.row_mut(i).assign(&x.row(idx));
                support_alphas[i] = combined_alphas[idx];
            }

            self.support_vectors = Some(support_vectors);
            self.alphas = Some(support_alphas);
        }

        self.bias = bias;
        self.is_fitted = true;
        Ok(())
    }

    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let mut k = Array2::zeros((n, n));

        for i in 0..n {
            for j in i..n {
                let val = self.kernel(&x.row(i).to_owned(), &x.row(j).to_owned());
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }

        k
    }

    fn kernel(&self, x1: &Array1<f64>, x2: &Array1<f64>) -> f64 {
        match &self.config.kernel {
            SvrKernel::Linear => x1.dot(x2),
            SvrKernel::Rbf { gamma } => {
                let diff = x1 - x2;
                let norm_sq = diff.dot(&diff);
                (-gamma * norm_sq).exp()
            }
        }
    }

    /// Predict target values
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(CardspendError::NotFitted);
        }

        let sv = self.support_vectors.as_ref().ok_or(CardspendError::NotFitted)?;
        let alphas = self.alphas.as_ref().ok_or(CardspendError::NotFitted)?;

        let n = x.nrows();
        let mut predictions = Array1::zeros(n);

        for i in 0..n {
            let sample = x.row(i).to_owned();
            let mut sum = self.bias;
            for j in 0..sv.nrows() {
                sum += alphas[j] * self.kernel(&sample, &sv.row(j).to_owned());
            }
            predictions[i] = sum;
        }

        Ok(predictions)
    }

    /// Get number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map(|sv| sv.nrows()).unwrap_or(0)
    }
}
