//! cardspend — credit-card expenditure prediction
//!
//! Trains a regression model to predict annual credit-card expenditure
//! from demographic/financial features and serves predictions through a
//! library API, a CLI, and a JSON HTTP API.
//!
//! # Modules
//!
//! ## Core pipeline
//! - [`preprocessing`] - One-hot encoding, feature schema, scaler pair
//! - [`training`] - Grid-searched training of three regressor families
//! - [`artifact`] - Persistence bundle, atomic store, load-once cache
//! - [`predictor`] - Encode → scale → predict → inverse-scale inference
//!
//! ## Supporting
//! - [`record`] - Raw prediction records and validation
//! - [`data`] - CSV dataset loading
//! - [`plots`] - Post-training comparison charts (SVG)
//!
//! ## Services
//! - [`server`] - JSON HTTP API
//! - [`cli`] - Command-line interface

pub mod error;

pub mod artifact;
pub mod data;
pub mod plots;
pub mod predictor;
pub mod preprocessing;
pub mod record;
pub mod training;

pub mod cli;
pub mod server;

pub use error::{CardspendError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::artifact::{ArtifactCache, ArtifactStore, ModelArtifact, TrainedModel};
    pub use crate::error::{CardspendError, Result};
    pub use crate::predictor::{Prediction, Predictor};
    pub use crate::preprocessing::{FeatureSchema, FeatureScaler, OneHotEncoder, TargetScaler};
    pub use crate::record::{Record, YesNo, CATEGORICAL_FIELDS, REQUIRED_FIELDS};
    pub use crate::training::{
        BoostingGrid, ForestGrid, ModelFamily, RegressionMetrics, SvrGrid, TrainReport, Trainer,
        TrainerConfig,
    };
}
