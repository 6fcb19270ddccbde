use crate::error::{AppError, Result};
use crate::metrics::{BATCH_ROWS, PREDICTIONS_TOTAL};
use crate::schema::{parse_record, read_rows, CustomerRecord};
use crate::services::{ExplanationService, PredictionResult, PredictionService};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Identifier columns checked, in order, for a customer id
const ID_COLUMNS: [&str; 2] = ["customerID", "CustomerID"];

/// One validated CSV data row
#[derive(Debug, Clone)]
pub struct BatchRow {
    /// 1-based data row number (the header is row 0)
    pub row: usize,
    pub customer_id: Option<String>,
    pub record: CustomerRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchPrediction {
    pub row: usize,
    #[serde(rename = "CustomerID", skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(flatten)]
    pub result: PredictionResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// One entry per data row, in upload order
    pub predictions: Vec<BatchPrediction>,

    /// Mean absolute attribution per field; empty when attribution failed
    pub batch_feature_importance: IndexMap<String, f64>,
}

/// Parse and validate an uploaded CSV.
///
/// Fail-fast: the first invalid row rejects the upload with a schema error
/// naming the row. A file without data rows is also rejected.
pub fn parse_csv<R: std::io::Read>(input: R) -> Result<Vec<BatchRow>> {
    let rows = read_rows(input)?;
    if rows.is_empty() {
        return Err(AppError::Schema("Uploaded CSV is empty".to_string()));
    }

    rows.into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let record = parse_record(&raw).map_err(|e| match e {
                AppError::Schema(msg) => AppError::Schema(format!("row {}: {}", i + 1, msg)),
                other => other,
            })?;
            let customer_id = ID_COLUMNS
                .iter()
                .find_map(|column| raw.get(*column))
                .filter(|id| !id.is_empty())
                .cloned();
            Ok(BatchRow {
                row: i + 1,
                customer_id,
                record,
            })
        })
        .collect()
}

pub struct BatchService {
    prediction: Arc<PredictionService>,
    explanation: Option<Arc<ExplanationService>>,
}

impl BatchService {
    pub fn new(
        prediction: Arc<PredictionService>,
        explanation: Option<Arc<ExplanationService>>,
    ) -> Self {
        Self {
            prediction,
            explanation,
        }
    }

    pub fn predict_csv<R: std::io::Read>(&self, input: R) -> Result<BatchResult> {
        let rows = parse_csv(input)?;
        self.predict_batch(&rows)
    }

    /// Score every row in order, then aggregate attributions.
    pub fn predict_batch(&self, rows: &[BatchRow]) -> Result<BatchResult> {
        if rows.is_empty() {
            return Err(AppError::Schema("Uploaded CSV is empty".to_string()));
        }

        let mut predictions = Vec::with_capacity(rows.len());
        let mut churned = 0usize;
        for row in rows {
            let result = self.prediction.score(&row.record)?;
            churned += result.prediction as usize;
            predictions.push(BatchPrediction {
                row: row.row,
                customer_id: row.customer_id.clone(),
                result,
            });
        }

        PREDICTIONS_TOTAL
            .with_label_values(&["batch", "1"])
            .inc_by(churned as f64);
        PREDICTIONS_TOTAL
            .with_label_values(&["batch", "0"])
            .inc_by((rows.len() - churned) as f64);
        BATCH_ROWS.observe(rows.len() as f64);
        info!(rows = rows.len(), churned, "Scored batch");

        Ok(BatchResult {
            predictions,
            batch_feature_importance: self.aggregate_importance(rows),
        })
    }

    fn aggregate_importance(&self, rows: &[BatchRow]) -> IndexMap<String, f64> {
        let Some(explanation) = &self.explanation else {
            return IndexMap::new();
        };

        let mut totals: IndexMap<String, f64> = IndexMap::new();
        for row in rows {
            match explanation.attribute(&row.record) {
                Ok(attribution) => {
                    for (field, value) in attribution.values {
                        *totals.entry(field).or_insert(0.0) += value.abs();
                    }
                }
                Err(e) => {
                    warn!(row = row.row, error = %e, "Returning batch without feature importance");
                    return IndexMap::new();
                }
            }
        }

        let n = rows.len() as f64;
        totals.values_mut().for_each(|v| *v /= n);
        totals
    }
}
