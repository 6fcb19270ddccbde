//! Request-facing services over the loaded artifacts.
//!
//! Each service is constructed once from the immutable artifacts and shared
//! across requests behind an `Arc`.

pub mod batch;
pub mod dashboard;
pub mod explanation;
pub mod prediction;

pub use batch::{parse_csv, BatchPrediction, BatchResult, BatchRow, BatchService};
pub use dashboard::{DashboardService, DashboardView, FeatureImportanceView, ModelScore};
pub use explanation::{ExplanationResult, ExplanationService};
pub use prediction::{PredictionResult, PredictionService, DECISION_THRESHOLD};

#[cfg(test)]
pub(crate) mod mocks {
    use crate::error::{AppError, Result};
    use crate::ml::{Attribution, Explainer, InferencePipeline};
    use crate::schema::CustomerRecord;
    use indexmap::IndexMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Pipeline that returns a fixed probability and counts calls
    pub struct FixedPipeline {
        pub probability: f64,
        pub calls: AtomicUsize,
    }

    impl FixedPipeline {
        pub fn new(probability: f64) -> Self {
            Self {
                probability,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl InferencePipeline for FixedPipeline {
        fn predict_proba(&self, _record: &CustomerRecord) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.probability.is_finite() {
                Ok(self.probability)
            } else {
                Err(AppError::Inference("model produced a non-finite margin".to_string()))
            }
        }

        fn model_name(&self) -> &str {
            "Fixed"
        }
    }

    /// Explainer that credits the whole margin to `tenure`
    pub struct TenureExplainer;

    impl Explainer for TenureExplainer {
        fn explain(&self, record: &CustomerRecord) -> Result<Attribution> {
            let mut values = IndexMap::new();
            values.insert("tenure".to_string(), -(record.tenure as f64) / 10.0);
            values.insert("Contract".to_string(), 0.0);
            Ok(Attribution {
                base_value: 0.0,
                output_value: -(record.tenure as f64) / 10.0,
                values,
            })
        }
    }

    pub struct FailingExplainer;

    impl Explainer for FailingExplainer {
        fn explain(&self, _record: &CustomerRecord) -> Result<Attribution> {
            Err(AppError::Explainer("background unavailable".to_string()))
        }
    }
}
