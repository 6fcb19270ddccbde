use crate::error::{AppError, Result};
use crate::ml::features::Preprocessor;
use crate::ml::models::{LinearModel, ModelStage, ModelType, PipelineArtifact, Tree, TreeEnsemble, TreeNode};
use crate::schema::{CustomerRecord, Field, SCHEMA_VERSION};
use ndarray::{Array1, ArrayView1};

/// The black box the prediction service talks to
pub trait InferencePipeline: Send + Sync {
    /// Probability that the customer churns
    fn predict_proba(&self, record: &CustomerRecord) -> Result<f64>;

    /// Name of the served model
    fn model_name(&self) -> &str;
}

/// Logistic link from margin to probability
pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// A loaded, validated pipeline artifact
#[derive(Debug, Clone)]
pub struct FittedPipeline {
    artifact: PipelineArtifact,
    feature_names: Vec<String>,
    source_fields: Vec<Field>,
}

impl FittedPipeline {
    /// Validate an artifact and wrap it for serving
    pub fn new(artifact: PipelineArtifact) -> Result<Self> {
        if artifact.schema_version != SCHEMA_VERSION {
            return Err(AppError::Configuration(format!(
                "pipeline was fitted against schema '{}', this build serves '{}'",
                artifact.schema_version, SCHEMA_VERSION
            )));
        }

        artifact.preprocessor.validate()?;
        let n_features = artifact.preprocessor.n_features();

        match &artifact.model {
            ModelStage::LogisticRegression(model) => model.validate(n_features)?,
            ModelStage::GradientBoosting(model) => model.validate(n_features)?,
        }

        if !artifact.background_mean.is_empty() && artifact.background_mean.len() != n_features {
            return Err(AppError::Configuration(format!(
                "background has {} columns, preprocessor produces {}",
                artifact.background_mean.len(),
                n_features
            )));
        }

        let feature_names = artifact.preprocessor.feature_names();
        let source_fields = artifact.preprocessor.source_fields();

        Ok(Self {
            artifact,
            feature_names,
            source_fields,
        })
    }

    pub fn artifact(&self) -> &PipelineArtifact {
        &self.artifact
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.artifact.preprocessor
    }

    pub fn model(&self) -> &ModelStage {
        &self.artifact.model
    }

    pub fn model_type(&self) -> ModelType {
        self.artifact.model.model_type()
    }

    /// Names of the preprocessed columns
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Input field behind each preprocessed column
    pub fn source_fields(&self) -> &[Field] {
        &self.source_fields
    }

    pub fn transform(&self, record: &CustomerRecord) -> Array1<f64> {
        self.artifact.preprocessor.transform(record)
    }

    /// Log-odds output of the model stage for a preprocessed vector
    pub fn margin(&self, x: ArrayView1<f64>) -> Result<f64> {
        if x.len() != self.feature_names.len() {
            return Err(AppError::Inference(format!(
                "expected {} features, got {}",
                self.feature_names.len(),
                x.len()
            )));
        }

        let margin = match &self.artifact.model {
            ModelStage::LogisticRegression(model) => model.margin(x),
            ModelStage::GradientBoosting(model) => model.margin(x),
        };

        if !margin.is_finite() {
            return Err(AppError::Inference(format!(
                "model produced a non-finite margin ({})",
                margin
            )));
        }
        Ok(margin)
    }
}

impl InferencePipeline for FittedPipeline {
    fn predict_proba(&self, record: &CustomerRecord) -> Result<f64> {
        let x = self.transform(record);
        let margin = self.margin(x.view())?;
        Ok(sigmoid(margin))
    }

    fn model_name(&self) -> &str {
        &self.artifact.model_name
    }
}

impl LinearModel {
    pub fn margin(&self, x: ArrayView1<f64>) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x.iter())
                .map(|(w, v)| w * v)
                .sum::<f64>()
    }

    fn validate(&self, n_features: usize) -> Result<()> {
        if self.coefficients.len() != n_features {
            return Err(AppError::Configuration(format!(
                "linear model has {} coefficients, preprocessor produces {} features",
                self.coefficients.len(),
                n_features
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|w| !w.is_finite()) {
            return Err(AppError::Configuration(
                "linear model has non-finite parameters".to_string(),
            ));
        }
        Ok(())
    }
}

impl TreeEnsemble {
    pub fn margin(&self, x: ArrayView1<f64>) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }

    /// Cover-weighted mean margin over the training distribution
    pub fn expected_margin(&self) -> f64 {
        self.base_score + self.trees.iter().map(Tree::expected_value).sum::<f64>()
    }

    fn validate(&self, n_features: usize) -> Result<()> {
        if self.trees.is_empty() {
            return Err(AppError::Configuration("tree ensemble is empty".to_string()));
        }
        if !self.base_score.is_finite() {
            return Err(AppError::Configuration("non-finite base score".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|e| AppError::Configuration(format!("tree {}: {}", i, e)))?;
        }
        Ok(())
    }
}

impl Tree {
    /// Leaf value reached by `x`
    pub fn predict(&self, x: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if x[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn expected_value(&self) -> f64 {
        self.node_expectation(0)
    }

    fn node_expectation(&self, idx: usize) -> f64 {
        match &self.nodes[idx] {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                left, right, cover, ..
            } => {
                let l = self.nodes[*left].cover();
                let r = self.nodes[*right].cover();
                (l * self.node_expectation(*left) + r * self.node_expectation(*right)) / cover
            }
        }
    }

    /// Children must come after their parent, which rules out cycles.
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value, cover } => {
                    if !value.is_finite() || !(*cover > 0.0) {
                        return Err(format!("leaf {} has invalid value or cover", i));
                    }
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    cover,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            i, feature, n_features
                        ));
                    }
                    if !threshold.is_finite() || !(*cover > 0.0) {
                        return Err(format!("node {} has invalid threshold or cover", i));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {} has out-of-order child {}", i, child));
                        }
                    }
                    if left == right {
                        return Err(format!("node {} points both branches at {}", i, left));
                    }
                    let children = self.nodes[*left].cover() + self.nodes[*right].cover();
                    if (children - cover).abs() > 1e-6 * cover.max(1.0) {
                        return Err(format!(
                            "node {} cover {} does not match its children ({})",
                            i, cover, children
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
