use crate::error::{AppError, Result};
use crate::metrics::{INFERENCE_DURATION_SECONDS, PREDICTIONS_TOTAL};
use crate::ml::InferencePipeline;
use crate::schema::{record_from_json, CustomerRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Fixed decision threshold; `prediction == 1` iff `probability >= 0.5`
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Churn probability and thresholded label
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PredictionResult {
    pub probability: f64,
    pub prediction: u8,
}

impl PredictionResult {
    /// Threshold a probability, rejecting values outside `[0, 1]`
    pub fn from_probability(probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(AppError::Inference(format!(
                "pipeline returned probability {} outside [0, 1]",
                probability
            )));
        }
        Ok(Self {
            probability,
            prediction: u8::from(probability >= DECISION_THRESHOLD),
        })
    }
}

/// Single-record churn prediction
pub struct PredictionService {
    pipeline: Arc<dyn InferencePipeline>,
}

impl PredictionService {
    pub fn new(pipeline: Arc<dyn InferencePipeline>) -> Self {
        Self { pipeline }
    }

    pub fn model_name(&self) -> &str {
        self.pipeline.model_name()
    }

    /// Predict for one validated record
    pub fn predict(&self, record: &CustomerRecord) -> Result<PredictionResult> {
        let result = self.score(record)?;
        PREDICTIONS_TOTAL
            .with_label_values(&["single", if result.prediction == 1 { "1" } else { "0" }])
            .inc();
        Ok(result)
    }

    /// Validate a JSON body, then predict. Schema errors never reach the
    /// pipeline.
    pub fn predict_json(&self, body: &serde_json::Value) -> Result<PredictionResult> {
        let record = record_from_json(body)?;
        self.predict(&record)
    }

    /// Pipeline call without per-request accounting
    pub(crate) fn score(&self, record: &CustomerRecord) -> Result<PredictionResult> {
        let timer = INFERENCE_DURATION_SECONDS.start_timer();
        let probability = self.pipeline.predict_proba(record)?;
        timer.observe_duration();

        debug!(probability, model = self.pipeline.model_name(), "Scored record");
        PredictionResult::from_probability(probability)
    }
}
