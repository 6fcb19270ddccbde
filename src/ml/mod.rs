/// Machine learning pipeline for churn prediction
///
/// This module provides:
/// - Preprocessing (standard scaling and one-hot encoding)
/// - Logistic regression and gradient-boosted tree model stages
/// - SHAP attributions collapsed back onto input fields
/// - Offline training from the labeled Telco CSV

pub mod classifier;
pub mod explainer;
pub mod features;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod models;
pub mod training;

pub use classifier::{sigmoid, FittedPipeline, InferencePipeline};
pub use explainer::{Attribution, Explainer, ShapExplainer};
pub use features::{CategoricalColumn, NumericColumn, Preprocessor};
pub use models::{
    DashboardStats, LinearModel, MetricsArtifact, ModelMetrics, ModelStage, ModelType,
    PipelineArtifact, Tree, TreeEnsemble, TreeNode,
};
pub use training::{LabeledDataset, Trainer, TrainingReport};
