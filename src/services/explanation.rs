use crate::error::{AppError, Result};
use crate::metrics::EXPLANATION_FAILURES_TOTAL;
use crate::ml::{Attribution, Explainer};
use crate::schema::{record_from_json, CustomerRecord};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Per-field attribution for one record, in schema order
#[derive(Debug, Clone, Serialize)]
pub struct ExplanationResult {
    /// Signed contribution of each input field in log-odds
    pub feature_importance: IndexMap<String, f64>,

    /// Expected model margin the contributions are measured against
    pub base_value: f64,

    /// The validated input, echoed back
    pub features: CustomerRecord,
}

pub struct ExplanationService {
    explainer: Arc<dyn Explainer>,
}

impl ExplanationService {
    pub fn new(explainer: Arc<dyn Explainer>) -> Self {
        Self { explainer }
    }

    pub fn explain(&self, record: &CustomerRecord) -> Result<ExplanationResult> {
        let attribution = self.attribute(record)?;
        Ok(ExplanationResult {
            feature_importance: attribution.values,
            base_value: attribution.base_value,
            features: record.clone(),
        })
    }

    pub fn explain_json(&self, body: &serde_json::Value) -> Result<ExplanationResult> {
        let record = record_from_json(body)?;
        self.explain(&record)
    }

    /// Raw attribution. Any failure surfaces as an explainer error and is
    /// counted.
    pub fn attribute(&self, record: &CustomerRecord) -> Result<Attribution> {
        self.explainer.explain(record).map_err(|e| {
            EXPLANATION_FAILURES_TOTAL.inc();
            warn!(error = %e, "Attribution failed");
            match e {
                AppError::Explainer(_) => e,
                other => AppError::Explainer(other.to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::fixtures::{high_risk_record, stump_ensemble_artifact};
    use crate::ml::{FittedPipeline, ShapExplainer};
    use crate::services::mocks::{FailingExplainer, FixedPipeline};
    use crate::services::PredictionService;
    use serde_json::json;

    fn tree_service() -> ExplanationService {
        let pipeline = Arc::new(FittedPipeline::new(stump_ensemble_artifact()).unwrap());
        ExplanationService::new(Arc::new(ShapExplainer::new(pipeline)))
    }

    #[test]
    fn test_explanation_covers_every_field() {
        let result = tree_service().explain(&high_risk_record()).unwrap();

        assert_eq!(result.feature_importance.len(), 19);
        assert!(result.feature_importance["tenure"] > 0.0);
        assert_eq!(result.feature_importance["gender"], 0.0);
        assert_eq!(result.features, high_risk_record());
    }

    #[test]
    fn test_explain_json_rejects_bad_body() {
        let result = tree_service().explain_json(&json!(["not", "an", "object"]));
        assert!(matches!(result, Err(AppError::Schema(_))));
    }

    #[test]
    fn test_failure_does_not_affect_prediction() {
        let explanation = ExplanationService::new(Arc::new(FailingExplainer));
        let prediction = PredictionService::new(Arc::new(FixedPipeline::new(0.8)));

        assert!(matches!(
            explanation.explain(&high_risk_record()),
            Err(AppError::Explainer(_))
        ));
        assert_eq!(prediction.predict(&high_risk_record()).unwrap().prediction, 1);
    }
}
