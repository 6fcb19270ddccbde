//! Additive feature attributions (SHAP values) for the model stage.
//!
//! Attributions are computed on the preprocessed vector and then summed back
//! onto the input fields, so the one-hot columns of `Contract` collapse into a
//! single `Contract` entry. All values live in log-odds space: for every
//! record `base_value + Σ values == output_value`.

use crate::error::{AppError, Result};
use crate::ml::classifier::FittedPipeline;
use crate::ml::models::{ModelStage, Tree, TreeNode};
use crate::schema::{CustomerRecord, Field};
use indexmap::IndexMap;
use ndarray::{Array1, ArrayView1};
use serde::Serialize;
use std::sync::Arc;
use strum::IntoEnumIterator;

/// Per-field attribution for one record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Attribution {
    /// Expected model margin over the reference distribution
    pub base_value: f64,

    /// Model margin for this record
    pub output_value: f64,

    /// Signed contribution of each input field, in schema order
    pub values: IndexMap<String, f64>,
}

impl Attribution {
    /// `output_value - base_value - Σ values`; zero up to rounding
    pub fn residual(&self) -> f64 {
        self.output_value - self.base_value - self.values.values().sum::<f64>()
    }
}

/// Attribution routine configured against a pipeline
pub trait Explainer: Send + Sync {
    fn explain(&self, record: &CustomerRecord) -> Result<Attribution>;
}

/// SHAP explainer for the two supported model stages.
///
/// Linear models use the exact independent-feature solution against the
/// artifact's background means; tree ensembles use path-dependent TreeSHAP
/// driven by node covers.
pub struct ShapExplainer {
    pipeline: Arc<FittedPipeline>,
}

impl ShapExplainer {
    pub fn new(pipeline: Arc<FittedPipeline>) -> Self {
        Self { pipeline }
    }

    fn base_value(&self) -> Result<f64> {
        match self.pipeline.model() {
            ModelStage::LogisticRegression(model) => {
                let background = self.background()?;
                Ok(model.margin(background.view()))
            }
            ModelStage::GradientBoosting(ensemble) => Ok(ensemble.expected_margin()),
        }
    }

    fn background(&self) -> Result<Array1<f64>> {
        let mean = &self.pipeline.artifact().background_mean;
        if mean.is_empty() {
            return Err(AppError::Explainer(
                "linear explainer needs background means and the artifact has none".to_string(),
            ));
        }
        Ok(Array1::from_vec(mean.clone()))
    }

    /// SHAP value of every preprocessed column
    fn column_values(&self, x: ArrayView1<f64>) -> Result<Vec<f64>> {
        match self.pipeline.model() {
            ModelStage::LogisticRegression(model) => {
                let background = self.background()?;
                Ok(model
                    .coefficients
                    .iter()
                    .zip(x.iter().zip(background.iter()))
                    .map(|(w, (xi, mi))| w * (xi - mi))
                    .collect())
            }
            ModelStage::GradientBoosting(ensemble) => {
                let mut phi = vec![0.0; x.len()];
                for tree in &ensemble.trees {
                    tree_shap(tree, x, &mut phi);
                }
                Ok(phi)
            }
        }
    }
}

impl Explainer for ShapExplainer {
    fn explain(&self, record: &CustomerRecord) -> Result<Attribution> {
        let x = self.pipeline.transform(record);
        let output_value = self
            .pipeline
            .margin(x.view())
            .map_err(|e| AppError::Explainer(e.to_string()))?;
        let base_value = self.base_value()?;
        let phi = self.column_values(x.view())?;

        let mut values: IndexMap<String, f64> =
            Field::iter().map(|f| (f.to_string(), 0.0)).collect();
        for (field, value) in self.pipeline.source_fields().iter().zip(phi) {
            if let Some(slot) = values.get_mut(field.as_ref()) {
                *slot += value;
            }
        }

        if !base_value.is_finite() || values.values().any(|v| !v.is_finite()) {
            return Err(AppError::Explainer(
                "attribution produced non-finite values".to_string(),
            ));
        }

        Ok(Attribution {
            base_value,
            output_value,
            values,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

/// Add one tree's SHAP values for `x` into `phi`.
///
/// Polynomial-time path-dependent TreeSHAP (Lundberg et al., 2018, Alg. 2).
fn tree_shap(tree: &Tree, x: ArrayView1<f64>, phi: &mut [f64]) {
    recurse(tree, x, phi, 0, &[], 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    x: ArrayView1<f64>,
    phi: &mut [f64],
    node: usize,
    parent_path: &[PathElement],
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let mut path = parent_path.to_vec();
    extend(&mut path, zero_fraction, one_fraction, feature);

    match &tree.nodes[node] {
        TreeNode::Leaf { value, .. } => {
            for i in 1..path.len() {
                let weight = unwound_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += weight * (el.one_fraction - el.zero_fraction) * value;
                }
            }
        }
        TreeNode::Split {
            feature: split,
            threshold,
            left,
            right,
            cover,
        } => {
            let (hot, cold) = if x[*split] < *threshold {
                (*left, *right)
            } else {
                (*right, *left)
            };
            let hot_zero = tree.nodes[hot].cover() / cover;
            let cold_zero = tree.nodes[cold].cover() / cover;

            // A feature seen earlier on the path is folded into this split.
            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = path.iter().position(|el| el.feature == Some(*split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind(&mut path, k);
            }

            recurse(tree, x, phi, hot, &path, hot_zero * incoming_zero, incoming_one, Some(*split));
            recurse(tree, x, phi, cold, &path, cold_zero * incoming_zero, 0.0, Some(*split));
        }
    }
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / denom;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / denom;
    }
}

fn unwind(path: &mut Vec<PathElement>, k: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[k].one_fraction;
    let zero_fraction = path[k].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one * denom / ((i + 1) as f64 * one_fraction);
            next_one = tmp - path[i].weight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].weight = path[i].weight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in k..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

fn unwound_sum(path: &[PathElement], k: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[k].one_fraction;
    let zero_fraction = path[k].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one = path[i].weight - tmp * zero_fraction * (depth - i) as f64 / denom;
        } else {
            total += path[i].weight / (zero_fraction * (depth - i) as f64 / denom);
        }
    }
    total
}
