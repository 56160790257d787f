//! Feature and target scaling
//!
//! Both scalers freeze their statistics at fit time and are pure
//! afterwards. The fitted instances are persisted with the model and
//! reused verbatim at inference; they are never refit on inference data.

use crate::error::{CardspendError, Result};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Frozen statistics for one standardized column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnStats {
    mean: f64,
    std: f64,
}

/// Zero-mean, unit-variance standardization per feature column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaler {
    params: HashMap<String, ColumnStats>,
    is_fitted: bool,
}

impl Default for FeatureScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureScaler {
    pub fn new() -> Self {
        Self {
            params: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit per-column mean/std on the given columns. Zero-variance
    /// columns scale by 1 so transform stays finite.
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.params.clear();

        for col_name in columns {
            let column = df.column(col_name).map_err(|_| CardspendError::Schema {
                field: col_name.clone(),
            })?;
            let ca = column
                .cast(&DataType::Float64)
                .map_err(|e| CardspendError::Data(e.to_string()))?
                .f64()
                .map_err(|e| CardspendError::Data(e.to_string()))?
                .clone();

            let mean = ca.mean().unwrap_or(0.0);
            let std = ca.std(1).unwrap_or(1.0);
            self.params.insert(
                col_name.clone(),
                ColumnStats {
                    mean,
                    std: if std == 0.0 { 1.0 } else { std },
                },
            );
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Standardize every fitted column present in the frame.
    /// Builds all replacement columns first, then applies them in one pass.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(CardspendError::NotFitted);
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .filter_map(|(col_name, stats)| {
                df.column(col_name)
                    .ok()
                    .map(|column| self.scale_column(column, stats))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result = result
                .with_column(scaled)
                .map_err(|e| CardspendError::Data(e.to_string()))?
                .clone();
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn scale_column(&self, column: &Column, stats: &ColumnStats) -> Result<Series> {
        let ca = column
            .cast(&DataType::Float64)
            .map_err(|e| CardspendError::Data(e.to_string()))?
            .f64()
            .map_err(|e| CardspendError::Data(e.to_string()))?
            .clone();

        let scaled: Float64Chunked = ca
            .into_iter()
            .map(|opt| opt.map(|v| (v - stats.mean) / stats.std))
            .collect();

        Ok(scaled.with_name(column.name().clone()).into_series())
    }
}

/// Min/max rescale of the target to [0, 1], with an exact inverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetScaler {
    min: f64,
    range: f64,
    is_fitted: bool,
}

impl Default for TargetScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetScaler {
    pub fn new() -> Self {
        Self {
            min: 0.0,
            range: 1.0,
            is_fitted: false,
        }
    }

    /// Freeze min/max over the training target. A constant target scales
    /// by 1.
    pub fn fit(&mut self, y: &Array1<f64>) -> &mut Self {
        let min = y.iter().copied().fold(f64::INFINITY, f64::min);
        let max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        self.min = if min.is_finite() { min } else { 0.0 };
        let range = max - self.min;
        self.range = if range.is_finite() && range != 0.0 {
            range
        } else {
            1.0
        };
        self.is_fitted = true;
        self
    }

    pub fn transform(&self, y: &Array1<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(CardspendError::NotFitted);
        }
        Ok(y.mapv(|v| (v - self.min) / self.range))
    }

    pub fn inverse_transform(&self, y: &Array1<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(CardspendError::NotFitted);
        }
        Ok(y.mapv(|v| v * self.range + self.min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_feature_scaler_zero_mean() {
        let df = df!("a" => &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        let mut scaler = FeatureScaler::new();
        let result = scaler.fit_transform(&df, &["a".to_string()]).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        let mean: f64 = col.mean().unwrap();
        assert!(mean.abs() < 1e-10);
    }

    #[test]
    fn test_feature_scaler_constant_column() {
        let df = df!("a" => &[7.0, 7.0, 7.0]).unwrap();

        let mut scaler = FeatureScaler::new();
        let result = scaler.fit_transform(&df, &["a".to_string()]).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        for v in col.into_no_null_iter() {
            assert!(v.is_finite());
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_feature_scaler_not_fitted() {
        let df = df!("a" => &[1.0]).unwrap();
        let scaler = FeatureScaler::new();
        assert!(matches!(
            scaler.transform(&df),
            Err(CardspendError::NotFitted)
        ));
    }

    #[test]
    fn test_target_scaler_range() {
        let y = array![10.0, 20.0, 30.0];
        let mut scaler = TargetScaler::new();
        let scaled = scaler.fit(&y).transform(&y).unwrap();

        assert!((scaled[0] - 0.0).abs() < 1e-12);
        assert!((scaled[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_target_scaler_roundtrip() {
        let y = array![3.0, 141.0, 52.5, 980.25, 0.0];
        let mut scaler = TargetScaler::new();
        scaler.fit(&y);

        let restored = scaler
            .inverse_transform(&scaler.transform(&y).unwrap())
            .unwrap();
        for (orig, back) in y.iter().zip(restored.iter()) {
            assert!((orig - back).abs() < 1e-10);
        }
    }

    #[test]
    fn test_target_scaler_not_fitted() {
        let scaler = TargetScaler::new();
        assert!(matches!(
            scaler.transform(&array![1.0]),
            Err(CardspendError::NotFitted)
        ));
        assert!(matches!(
            scaler.inverse_transform(&array![1.0]),
            Err(CardspendError::NotFitted)
        ));
    }
}
