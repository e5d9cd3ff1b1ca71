//! # foldkit
//!
//! Resampled evaluation of tabular models without leakage: split, fold,
//! prepare each fold's features on its own fit rows, sweep a hyperparameter
//! grid, aggregate the fold metrics and rank predictor importance.
//!
//! ## Modules
//!
//! - **core**: data frames, column roles, targets, the error type
//! - **linalg**: LU/QR solves, least squares, symmetric eigendecomposition
//! - **resample**: train/test split, k-fold and bootstrap plans
//! - **preprocessing**: imputation, scaling, power transforms, encoding, PCA, filters
//! - **pipeline**: ordered recipes fit per fold
//! - **linear**: OLS, elastic net, logistic regression, PCR, PLS
//! - **tree**: CART trees (used by tree imputation)
//! - **neighbors**: k-nearest neighbors
//! - **metrics**: regression and classification metrics
//! - **tune**: grids, sweeps, aggregation, model selection, importance
//! - **io**: CSV and JSON files
//! - **datasets**: synthetic data
//!
//! [`Workflow`] runs the whole chain from a [`WorkflowConfig`].

pub mod config;
pub mod workflow;

pub use config::{ImportanceOptions, WorkflowConfig};
pub use workflow::{FinalFit, Workflow, WorkflowReport};

/// Data frames, roles and errors.
pub use foldkit_core as core;

/// Linear algebra.
pub use foldkit_linalg as linalg;

/// Splits and resampling plans.
pub use foldkit_resample as resample;

/// Feature transforms.
pub use foldkit_preprocessing as preprocessing;

/// Recipes.
pub use foldkit_pipeline as pipeline;

/// Linear models.
pub use foldkit_linear as linear;

/// Decision trees.
pub use foldkit_tree as tree;

/// Nearest neighbors.
pub use foldkit_neighbors as neighbors;

/// Evaluation metrics.
pub use foldkit_metrics as metrics;

/// Hyperparameter sweeps and model selection.
pub use foldkit_tune as tune;

/// I/O utilities.
pub use foldkit_io as io;

/// Synthetic datasets.
pub use foldkit_datasets as datasets;
