//! Categorical encoding and the feature-column schema

use crate::error::{CardspendError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Current schema layout version. Bump when the encoded column layout
/// changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

/// The ordered encoded-column layout captured at training time.
///
/// Every matrix fed to a model must have exactly these columns in this
/// order. Persisted inside the model artifact so inference never has to
/// infer the layout from a fitted scaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    version: u32,
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            columns,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Align a frame to this schema: drop columns not in the schema, insert
    /// missing schema columns filled with zero, and reorder to match.
    /// All columns come back as Float64.
    pub fn reindex(&self, df: &DataFrame) -> Result<DataFrame> {
        let height = df.height();

        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|name| match df.column(name) {
                Ok(col) => col
                    .cast(&DataType::Float64)
                    .map_err(|e| CardspendError::Data(e.to_string())),
                Err(_) => Ok(Series::new(name.as_str().into(), vec![0.0f64; height]).into()),
            })
            .collect::<Result<Vec<_>>>()?;

        DataFrame::new(columns).map_err(|e| CardspendError::Data(e.to_string()))
    }

    /// Extract schema columns from a frame into a row-major matrix, in
    /// schema order. Fails with a schema error on any missing column.
    pub fn to_matrix(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let n_rows = df.height();
        let n_cols = self.columns.len();

        let col_data: Vec<Vec<f64>> = self
            .columns
            .iter()
            .map(|name| {
                let column = df.column(name).map_err(|_| CardspendError::Schema {
                    field: name.clone(),
                })?;
                let column_f64 = column
                    .cast(&DataType::Float64)
                    .map_err(|e| CardspendError::Data(e.to_string()))?;
                let values: Vec<f64> = column_f64
                    .f64()
                    .map_err(|e| CardspendError::Data(e.to_string()))?
                    .into_iter()
                    .map(|v| v.unwrap_or(0.0))
                    .collect();
                Ok(values)
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
        Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
            col_refs[c][r]
        }))
    }
}

/// One-hot encoder for string categorical columns.
///
/// Categories are stored as sorted lists rather than hash maps so the
/// expanded column order is identical across fits and across processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    // (column, sorted category values), in column order
    categories: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            categories: Vec::new(),
            is_fitted: false,
        }
    }

    /// Capture the observed category values for each configured column.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.categories.clear();

        for col_name in &self.columns {
            let column = df.column(col_name).map_err(|_| CardspendError::Schema {
                field: col_name.clone(),
            })?;
            let ca = column
                .str()
                .map_err(|e| CardspendError::Data(e.to_string()))?;

            let unique: BTreeSet<String> = ca
                .into_iter()
                .flatten()
                .map(|s| s.to_string())
                .collect();

            self.categories
                .push((col_name.clone(), unique.into_iter().collect()));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Expand each categorical column into one indicator column per
    /// category (`{column}_{value}`, Float64 0/1) and drop the original.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(CardspendError::NotFitted);
        }

        let mut indicator_columns: Vec<Series> = Vec::new();

        for (col_name, cats) in &self.categories {
            let column = df.column(col_name).map_err(|_| CardspendError::Schema {
                field: col_name.clone(),
            })?;
            let ca = column
                .str()
                .map_err(|e| CardspendError::Data(e.to_string()))?;

            for cat in cats {
                let name = format!("{col_name}_{cat}");
                let values: Vec<f64> = ca
                    .into_iter()
                    .map(|v| if v == Some(cat.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                indicator_columns.push(Series::new(name.into(), values));
            }
        }

        let mut result = df.clone();
        for series in indicator_columns {
            result = result
                .with_column(series)
                .map_err(|e| CardspendError::Data(e.to_string()))?
                .clone();
        }
        for (col_name, _) in &self.categories {
            result = result
                .drop(col_name)
                .map_err(|e| CardspendError::Data(e.to_string()))?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }
}
