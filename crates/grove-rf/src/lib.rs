//! Random forest training and k-fold evaluation over dense numeric matrices.
//!
//! Provides a hand-rolled random forest with CART decision trees,
//! Gini/Entropy/variance split criteria, bootstrap bagging with per-split
//! feature subsampling, parallel training via rayon, and a k-fold
//! cross-validation harness. Trees and folds work on row-index views of a
//! single shared [`Matrix`]; row data is never copied.

mod columns;
mod cv;
mod error;
mod forest;
mod matrix;
mod node;
mod split;
mod tree;

pub use columns::ColumnSpec;
pub use cv::{CrossValidation, CvResult};
pub use error::RfError;
pub use forest::{Forest, ForestConfig, MaxFeatures};
pub use matrix::Matrix;
pub use node::{FeatureIndex, Node, NodeIndex};
pub use split::{SplitCriterion, TaskKind};
pub use tree::{DecisionTree, DecisionTreeConfig};
