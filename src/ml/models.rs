use crate::ml::features::Preprocessor;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Serialized fitted pipeline (`model.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineArtifact {
    /// Schema version the preprocessor was fitted against
    pub schema_version: String,

    /// Human readable model name, matches a key in the metrics artifact
    pub model_name: String,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Scaling and one-hot encoding stage
    pub preprocessor: Preprocessor,

    /// Model stage, operating on the preprocessed vector
    pub model: ModelStage,

    /// Column means of the preprocessed training matrix.
    ///
    /// This is the reference distribution the linear explainer integrates
    /// over; tree models carry their own covers and ignore it.
    #[serde(default)]
    pub background_mean: Vec<f64>,
}

/// Model stage of the pipeline. Both variants produce a log-odds margin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelStage {
    LogisticRegression(LinearModel),
    GradientBoosting(TreeEnsemble),
}

impl ModelStage {
    pub fn model_type(&self) -> ModelType {
        match self {
            ModelStage::LogisticRegression(_) => ModelType::LogisticRegression,
            ModelStage::GradientBoosting(_) => ModelType::GradientBoosting,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Additive ensemble of regression trees in log-odds space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    /// Initial margin before any tree contributes
    #[serde(default)]
    pub base_score: f64,

    pub trees: Vec<Tree>,
}

/// Nodes are stored flat with the root at index 0. A split sends a sample
/// left when `x[feature] < threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Training weight that reached this node
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl TreeNode {
    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Split { cover, .. } | TreeNode::Leaf { cover, .. } => *cover,
        }
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    LogisticRegression,
    GradientBoosting,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::LogisticRegression => write!(f, "Logistic Regression"),
            ModelType::GradientBoosting => write!(f, "Gradient Boosting"),
        }
    }
}

/// Evaluation of one candidate model on the held-out split
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub auc: f64,

    /// Largest absolute coefficients (or split gains), descending
    #[serde(default)]
    pub feature_importance: IndexMap<String, f64>,
}

/// Churn rate per bucket for the three dashboard dimensions
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    #[serde(default)]
    pub contract: IndexMap<String, f64>,
    #[serde(default)]
    pub tenure: IndexMap<String, f64>,
    #[serde(default)]
    pub monthly: IndexMap<String, f64>,
}

/// Persisted metrics (`metrics.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsArtifact {
    /// Metrics per trained model, in training order
    pub models: IndexMap<String, ModelMetrics>,

    /// Name of the model currently served
    pub current_model: Option<String>,

    #[serde(default)]
    pub dashboard: DashboardStats,
}

impl MetricsArtifact {
    pub fn active_metrics(&self) -> Option<&ModelMetrics> {
        self.current_model
            .as_ref()
            .and_then(|name| self.models.get(name))
    }
}

/// Tenure bucket label used by the dashboard
pub fn tenure_bucket(tenure_months: u32) -> &'static str {
    match tenure_months {
        0..=12 => "0-12",
        13..=24 => "13-24",
        _ => "25+",
    }
}

/// Monthly charge bucket label used by the dashboard
pub fn monthly_bucket(monthly_charges: f64) -> &'static str {
    if monthly_charges <= 50.0 {
        "0-50"
    } else if monthly_charges <= 100.0 {
        "51-100"
    } else {
        "101+"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_display() {
        assert_eq!(ModelType::LogisticRegression.to_string(), "Logistic Regression");
        assert_eq!(ModelType::GradientBoosting.to_string(), "Gradient Boosting");
    }

    #[test]
    fn test_buckets() {
        assert_eq!(tenure_bucket(0), "0-12");
        assert_eq!(tenure_bucket(12), "0-12");
        assert_eq!(tenure_bucket(13), "13-24");
        assert_eq!(tenure_bucket(72), "25+");
        assert_eq!(monthly_bucket(50.0), "0-50");
        assert_eq!(monthly_bucket(50.5), "51-100");
        assert_eq!(monthly_bucket(118.75), "101+");
    }

    #[test]
    fn test_tree_node_wire_format() {
        let node: TreeNode = serde_json::from_str(
            r#"{"type":"split","feature":2,"threshold":0.5,"left":1,"right":2,"cover":10.0}"#,
        )
        .unwrap();
        assert_eq!(node.cover(), 10.0);

        let stage: ModelStage = serde_json::from_str(
            r#"{"kind":"logistic_regression","coefficients":[0.5,-1.0],"intercept":0.1}"#,
        )
        .unwrap();
        assert_eq!(stage.model_type(), ModelType::LogisticRegression);
    }

    #[test]
    fn test_active_metrics() {
        let mut models = IndexMap::new();
        models.insert(
            "Logistic Regression".to_string(),
            ModelMetrics {
                accuracy: 0.8,
                auc: 0.84,
                feature_importance: IndexMap::new(),
            },
        );
        let artifact = MetricsArtifact {
            models,
            current_model: Some("Logistic Regression".to_string()),
            dashboard: DashboardStats::default(),
        };
        assert_eq!(artifact.active_metrics().unwrap().auc, 0.84);
    }
}
