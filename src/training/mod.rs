//! Model training module
//!
//! Provides the three regressor families the trainer grid-searches over:
//! - Random forest (bagged regression trees)
//! - Gradient boosted trees
//! - Epsilon support-vector regression
//!
//! plus k-fold cross-validation, hyperparameter grids, regression metrics,
//! and the [`Trainer`] pipeline that ties them together.

pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod grid;
pub mod metrics;
pub mod random_forest;
pub mod svm;
mod trainer;

pub use cross_validation::{CvScores, FoldSplit, KFold};
pub use decision_tree::{RegressionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use grid::{BoostingGrid, BoostingParams, ForestGrid, ForestParams, Gamma, SvrGrid, SvrParams};
pub use metrics::RegressionMetrics;
pub use random_forest::{MaxFeatures, RandomForestRegressor};
pub use svm::{SvrConfig, SvrKernel, SvrRegressor};
pub use trainer::{FamilyEvaluation, ModelFamily, TrainReport, Trainer, TrainerConfig};
