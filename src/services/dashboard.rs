use crate::error::{AppError, Result};
use crate::ml::MetricsArtifact;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ModelScore {
    pub accuracy: f64,
    pub auc: f64,
}

/// Response of `GET /api/dashboard`
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub metrics: IndexMap<String, ModelScore>,
    pub active_model: Option<String>,
    pub contract: IndexMap<String, f64>,
    pub tenure: IndexMap<String, f64>,
    pub monthly: IndexMap<String, f64>,
}

/// Response of `GET /api/feature-importance`
#[derive(Debug, Clone, Serialize)]
pub struct FeatureImportanceView {
    pub active_model: Option<String>,
    pub feature_importance: IndexMap<String, f64>,
}

/// Read accessor over the metrics artifact loaded at startup
pub struct DashboardService {
    metrics: Option<Arc<MetricsArtifact>>,
}

impl DashboardService {
    pub fn new(metrics: Option<Arc<MetricsArtifact>>) -> Self {
        Self { metrics }
    }

    pub fn active_model(&self) -> Option<&str> {
        self.metrics.as_ref().and_then(|m| m.current_model.as_deref())
    }

    pub fn get_dashboard(&self) -> Result<DashboardView> {
        let artifact = self.artifact()?;
        Ok(DashboardView {
            metrics: artifact
                .models
                .iter()
                .map(|(name, m)| {
                    (
                        name.clone(),
                        ModelScore {
                            accuracy: m.accuracy,
                            auc: m.auc,
                        },
                    )
                })
                .collect(),
            active_model: artifact.current_model.clone(),
            contract: artifact.dashboard.contract.clone(),
            tenure: artifact.dashboard.tenure.clone(),
            monthly: artifact.dashboard.monthly.clone(),
        })
    }

    /// Stored importance of the active model; empty when no model is active
    pub fn get_feature_importance(&self) -> Result<FeatureImportanceView> {
        let artifact = self.artifact()?;
        Ok(FeatureImportanceView {
            active_model: artifact.current_model.clone(),
            feature_importance: artifact
                .active_metrics()
                .map(|m| m.feature_importance.clone())
                .unwrap_or_default(),
        })
    }

    fn artifact(&self) -> Result<&MetricsArtifact> {
        self.metrics.as_deref().ok_or_else(|| {
            AppError::NotFound("metrics artifact was not loaded; run training first".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{DashboardStats, ModelMetrics};

    fn artifact() -> MetricsArtifact {
        let mut importance = IndexMap::new();
        importance.insert("tenure".to_string(), 1.21);
        importance.insert("Contract_Two year".to_string(), 0.93);

        let mut models = IndexMap::new();
        models.insert(
            "Logistic Regression".to_string(),
            ModelMetrics {
                accuracy: 0.806,
                auc: 0.842,
                feature_importance: importance,
            },
        );

        let mut dashboard = DashboardStats::default();
        dashboard.contract.insert("Month-to-month".to_string(), 0.4271);
        dashboard.tenure.insert("0-12".to_string(), 0.4744);
        dashboard.monthly.insert("101+".to_string(), 0.3286);

        MetricsArtifact {
            models,
            current_model: Some("Logistic Regression".to_string()),
            dashboard,
        }
    }

    #[test]
    fn test_not_loaded_is_not_found() {
        let service = DashboardService::new(None);
        assert!(matches!(service.get_dashboard(), Err(AppError::NotFound(_))));
        assert!(matches!(
            service.get_feature_importance(),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(service.active_model(), None);
    }

    #[test]
    fn test_dashboard_view() {
        let service = DashboardService::new(Some(Arc::new(artifact())));
        let view = service.get_dashboard().unwrap();

        assert_eq!(view.active_model.as_deref(), Some("Logistic Regression"));
        assert_eq!(view.metrics["Logistic Regression"].auc, 0.842);
        assert_eq!(view.contract["Month-to-month"], 0.4271);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["metrics"]["Logistic Regression"].get("feature_importance").is_none());
    }

    #[test]
    fn test_feature_importance_keeps_stored_order() {
        let service = DashboardService::new(Some(Arc::new(artifact())));
        let view = service.get_feature_importance().unwrap();

        let keys: Vec<&String> = view.feature_importance.keys().collect();
        assert_eq!(keys, vec!["tenure", "Contract_Two year"]);
    }

    #[test]
    fn test_unknown_active_model_has_empty_importance() {
        let mut metrics = artifact();
        metrics.current_model = Some("Random Forest".to_string());
        let service = DashboardService::new(Some(Arc::new(metrics)));

        assert!(service.get_feature_importance().unwrap().feature_importance.is_empty());
    }
}
