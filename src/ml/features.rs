use crate::error::{AppError, Result};
use crate::schema::{CustomerRecord, Field};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Standard scaling for one numeric field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumericColumn {
    pub field: Field,
    pub mean: f64,
    pub scale: f64,
}

/// One-hot encoding for one categorical field.
///
/// A label not listed in `categories` encodes as all zeros.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoricalColumn {
    pub field: Field,
    pub categories: Vec<String>,
}

/// Preprocessing stage: scaled numeric columns followed by one-hot blocks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preprocessor {
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

impl Preprocessor {
    /// Fit scaling statistics and category lists on training records
    pub fn fit(records: &[CustomerRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(AppError::Training(
                "cannot fit preprocessor on an empty dataset".to_string(),
            ));
        }

        let n = records.len() as f64;
        let numeric = Field::numeric_fields()
            .map(|field| {
                let mean = records.iter().map(|r| r.numeric(field)).sum::<f64>() / n;
                let variance = records
                    .iter()
                    .map(|r| (r.numeric(field) - mean).powi(2))
                    .sum::<f64>()
                    / n;
                let std = variance.sqrt();
                NumericColumn {
                    field,
                    mean,
                    scale: if std > f64::EPSILON { std } else { 1.0 },
                }
            })
            .collect();

        let categorical = Field::categorical_fields()
            .map(|field| {
                let seen: BTreeSet<&str> =
                    records.iter().filter_map(|r| r.category(field)).collect();
                CategoricalColumn {
                    field,
                    categories: seen.into_iter().map(str::to_string).collect(),
                }
            })
            .collect();

        Ok(Self {
            numeric,
            categorical,
        })
    }

    /// Width of the preprocessed vector
    pub fn n_features(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>()
    }

    /// Output column names, e.g. `tenure` or `Contract_Two year`
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .numeric
            .iter()
            .map(|c| c.field.to_string())
            .collect();
        for column in &self.categorical {
            for category in &column.categories {
                names.push(format!("{}_{}", column.field, category));
            }
        }
        names
    }

    /// Input field behind each output column
    pub fn source_fields(&self) -> Vec<Field> {
        let mut fields: Vec<Field> = self.numeric.iter().map(|c| c.field).collect();
        for column in &self.categorical {
            fields.extend(std::iter::repeat(column.field).take(column.categories.len()));
        }
        fields
    }

    /// Transform a record into the model's input vector
    pub fn transform(&self, record: &CustomerRecord) -> Array1<f64> {
        let mut features = Array1::zeros(self.n_features());
        let mut offset = 0;

        for column in &self.numeric {
            features[offset] = (record.numeric(column.field) - column.mean) / column.scale;
            offset += 1;
        }

        for column in &self.categorical {
            if let Some(label) = record.category(column.field) {
                if let Some(idx) = column.categories.iter().position(|c| c == label) {
                    features[offset + idx] = 1.0;
                }
            }
            offset += column.categories.len();
        }

        features
    }

    /// Transform many records into an `n_records × n_features` matrix
    pub fn transform_batch(&self, records: &[CustomerRecord]) -> Array2<f64> {
        let mut matrix = Array2::zeros((records.len(), self.n_features()));
        for (i, record) in records.iter().enumerate() {
            matrix.row_mut(i).assign(&self.transform(record));
        }
        matrix
    }

    /// Structural checks run when an artifact is loaded
    pub fn validate(&self) -> Result<()> {
        for column in &self.numeric {
            if !column.field.is_numeric() {
                return Err(AppError::Configuration(format!(
                    "field '{}' is categorical but configured for scaling",
                    column.field
                )));
            }
            if !column.mean.is_finite() || !column.scale.is_finite() || column.scale <= 0.0 {
                return Err(AppError::Configuration(format!(
                    "invalid scaling statistics for '{}'",
                    column.field
                )));
            }
        }

        for column in &self.categorical {
            let allowed = column.field.categories();
            if allowed.is_empty() {
                return Err(AppError::Configuration(format!(
                    "field '{}' is numeric but configured for one-hot encoding",
                    column.field
                )));
            }
            if let Some(unknown) = column
                .categories
                .iter()
                .find(|c| !allowed.contains(&c.as_str()))
            {
                return Err(AppError::Configuration(format!(
                    "category '{}' of '{}' is not in the schema",
                    unknown, column.field
                )));
            }
        }

        Ok(())
    }
}
