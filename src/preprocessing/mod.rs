//! Data preprocessing module
//!
//! Turns raw records into the fixed numeric layout the models expect:
//! - One-hot encoding of the `yes`/`no` categoricals
//! - A versioned feature schema (ordered column list) with reindexing
//! - Per-column standardization for features, min/max scaling for the target

mod encoder;
mod scaler;

pub use encoder::{FeatureSchema, OneHotEncoder, SCHEMA_VERSION};
pub use scaler::{FeatureScaler, TargetScaler};
