//! Churn prediction service.
//!
//! A pre-fitted tabular pipeline (standard scaling, one-hot encoding and a
//! logistic or gradient-boosted model stage) served over an HTTP JSON API
//! with single and CSV batch prediction, SHAP attributions and read-only
//! dashboard statistics.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod ml;
pub mod schema;
pub mod services;

pub use error::{AppError, Result};
