pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::artifacts::Artifacts;
use crate::error::{AppError, Result};
use crate::ml::{Explainer, InferencePipeline, MetricsArtifact, ShapExplainer};
use crate::services::{BatchService, DashboardService, ExplanationService, PredictionService};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub prediction: Option<Arc<PredictionService>>,
    pub explanation: Option<Arc<ExplanationService>>,
    pub batch: Option<Arc<BatchService>>,
    pub dashboard: Arc<DashboardService>,
}

impl AppState {
    pub fn new(
        pipeline: Option<Arc<dyn InferencePipeline>>,
        explainer: Option<Arc<dyn Explainer>>,
        metrics: Option<Arc<MetricsArtifact>>,
    ) -> Self {
        let prediction = pipeline.map(|p| Arc::new(PredictionService::new(p)));
        let explanation = explainer.map(|e| Arc::new(ExplanationService::new(e)));
        let batch = prediction
            .clone()
            .map(|p| Arc::new(BatchService::new(p, explanation.clone())));

        Self {
            prediction,
            explanation,
            batch,
            dashboard: Arc::new(DashboardService::new(metrics)),
        }
    }

    /// Wire the services to the loaded artifacts
    pub fn from_artifacts(artifacts: &Artifacts) -> Self {
        let pipeline = artifacts
            .pipeline
            .clone()
            .map(|p| p as Arc<dyn InferencePipeline>);
        let explainer = artifacts
            .pipeline
            .clone()
            .map(|p| Arc::new(ShapExplainer::new(p)) as Arc<dyn Explainer>);

        Self::new(pipeline, explainer, artifacts.metrics.clone())
    }

    pub fn prediction(&self) -> Result<&PredictionService> {
        self.prediction.as_deref().ok_or_else(model_not_loaded)
    }

    pub fn explanation(&self) -> Result<&ExplanationService> {
        self.explanation.as_deref().ok_or_else(model_not_loaded)
    }

    pub fn batch(&self) -> Result<Arc<BatchService>> {
        self.batch.clone().ok_or_else(model_not_loaded)
    }
}

fn model_not_loaded() -> AppError {
    AppError::NotFound("model artifact was not loaded; run training first".to_string())
}
