//! Offline training of the served pipeline from the Telco churn CSV.

use crate::config::TrainingConfig;
use crate::error::{AppError, Result};
use crate::ml::classifier::sigmoid;
use crate::ml::features::Preprocessor;
use crate::ml::models::{
    monthly_bucket, tenure_bucket, DashboardStats, LinearModel, MetricsArtifact, ModelMetrics,
    ModelStage, PipelineArtifact, Tree, TreeEnsemble, TreeNode,
};
use crate::schema::{parse_record, read_rows, Contract, CustomerRecord, SCHEMA_VERSION};
use indexmap::IndexMap;
use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use linfa_trees::{DecisionTree, SplitQuality, TreeNode as FittedNode};
use ndarray::{Array1, Array2, Axis};
use std::path::Path;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

pub const LOGISTIC_MODEL_NAME: &str = "Logistic Regression";
pub const TREE_MODEL_NAME: &str = "Decision Tree";

/// Customer records with their churn labels
#[derive(Debug, Clone, Default)]
pub struct LabeledDataset {
    pub records: Vec<CustomerRecord>,
    pub labels: Vec<bool>,

    /// Rows dropped because `TotalCharges` was blank
    pub skipped: usize,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn churn_rate<'a>(
        &self,
        keys: impl Iterator<Item = &'a str>,
        bucket: impl Fn(&CustomerRecord) -> &'a str,
    ) -> IndexMap<String, f64> {
        let mut rates = IndexMap::new();
        for key in keys {
            let (churned, total) = self
                .records
                .iter()
                .zip(&self.labels)
                .filter(|(r, _)| bucket(r) == key)
                .fold((0usize, 0usize), |(c, t), (_, &y)| (c + y as usize, t + 1));
            if total > 0 {
                rates.insert(key.to_string(), round_to(churned as f64 / total as f64, 4));
            }
        }
        rates
    }

    /// Churn rate per contract type, tenure bucket and monthly charge bucket
    pub fn dashboard_stats(&self) -> DashboardStats {
        DashboardStats {
            contract: self.churn_rate(
                Contract::iter().map(|c| -> &'static str { c.into() }),
                |r| r.contract.into(),
            ),
            tenure: self.churn_rate(["0-12", "13-24", "25+"].into_iter(), |r| {
                tenure_bucket(r.tenure)
            }),
            monthly: self.churn_rate(["0-50", "51-100", "101+"].into_iter(), |r| {
                monthly_bucket(r.monthly_charges)
            }),
        }
    }
}

/// Read a labeled churn CSV.
///
/// Rows with a blank `TotalCharges` are skipped and counted; any other
/// invalid row fails the whole read.
pub fn read_labeled<R: std::io::Read>(input: R) -> Result<LabeledDataset> {
    let mut dataset = LabeledDataset::default();

    for (i, row) in read_rows(input)?.into_iter().enumerate() {
        if row.get("TotalCharges").map_or(true, |v| v.is_empty()) {
            dataset.skipped += 1;
            continue;
        }

        let record = parse_record(&row)
            .map_err(|e| AppError::Training(format!("row {}: {}", i + 1, e)))?;
        let label = match row.get("Churn").map(String::as_str) {
            Some("Yes") => true,
            Some("No") => false,
            other => {
                return Err(AppError::Training(format!(
                    "row {}: Churn must be Yes or No, got {:?}",
                    i + 1,
                    other
                )))
            }
        };

        dataset.records.push(record);
        dataset.labels.push(label);
    }

    Ok(dataset)
}

pub fn load_dataset(path: &Path) -> Result<LabeledDataset> {
    let file = std::fs::File::open(path)?;
    let dataset = read_labeled(std::io::BufReader::new(file))?;
    info!(
        path = %path.display(),
        rows = dataset.len(),
        skipped = dataset.skipped,
        "Loaded training dataset"
    );
    Ok(dataset)
}

/// Output of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub pipeline: PipelineArtifact,
    pub metrics: MetricsArtifact,
}

impl TrainingReport {
    /// Write `model.json` and `metrics.json`
    pub fn save(&self, model_path: &Path, metrics_path: &Path) -> Result<()> {
        write_json(model_path, &self.pipeline)?;
        write_json(metrics_path, &self.metrics)?;
        info!(
            model = %model_path.display(),
            metrics = %metrics_path.display(),
            "Saved training artifacts"
        );
        Ok(())
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;
    Ok(())
}

/// Fits the preprocessor and the candidate models, then keeps the one with
/// the best test AUC
pub struct Trainer {
    config: TrainingConfig,
}

/// Row indices of the fit/validation/train/test splits
struct Splits {
    fit: Vec<usize>,
    val: Vec<usize>,
    train: Vec<usize>,
    test: Vec<usize>,
}

impl Splits {
    fn new(n: usize, config: &TrainingConfig) -> Self {
        let all: Vec<usize> = (0..n).collect();
        let (train, test) = holdout(&all, config.test_size);
        let (fit, val) = holdout(&train, config.validation_size);
        Self {
            fit,
            val,
            train,
            test,
        }
    }
}

/// A fitted model scored on the test split
struct Candidate {
    name: &'static str,
    model: ModelStage,
    auc: f64,
    metrics: ModelMetrics,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn train(&self, data: &LabeledDataset) -> Result<TrainingReport> {
        let positives = data.labels.iter().filter(|&&y| y).count();
        if data.len() < 10 || positives == 0 || positives == data.len() {
            return Err(AppError::Training(format!(
                "need at least 10 rows covering both classes, got {} rows with {} churned",
                data.len(),
                positives
            )));
        }

        let splits = Splits::new(data.len(), &self.config);
        info!(
            train = splits.train.len(),
            test = splits.test.len(),
            "Training candidate models"
        );

        let train_records = select(&data.records, &splits.train);
        let preprocessor = Preprocessor::fit(&train_records)?;
        let names = preprocessor.feature_names();
        let x = preprocessor.transform_batch(&data.records);

        let candidates = vec![
            self.train_logistic(&x, &data.labels, &splits, &names)?,
            self.train_tree(&x, &data.labels, &splits, &names)?,
        ];

        let mut models = IndexMap::new();
        let mut best: Option<Candidate> = None;
        for candidate in candidates {
            models.insert(candidate.name.to_string(), candidate.metrics.clone());
            if best.as_ref().map_or(true, |b| candidate.auc > b.auc) {
                best = Some(candidate);
            }
        }
        let best = best.ok_or_else(|| AppError::Training("no model was trained".to_string()))?;
        info!(model = best.name, auc = best.auc, "Selected active model");

        let background_mean = x
            .select(Axis(0), &splits.train)
            .mean_axis(Axis(0))
            .map(|m| m.to_vec())
            .unwrap_or_default();

        Ok(TrainingReport {
            pipeline: PipelineArtifact {
                schema_version: SCHEMA_VERSION.to_string(),
                model_name: best.name.to_string(),
                trained_at: chrono::Utc::now(),
                preprocessor,
                model: best.model,
                background_mean,
            },
            metrics: MetricsArtifact {
                models,
                current_model: Some(best.name.to_string()),
                dashboard: data.dashboard_stats(),
            },
        })
    }

    /// L2 penalty picked by validation AUC, then refit on the train split
    fn train_logistic(
        &self,
        x: &Array2<f64>,
        labels: &[bool],
        splits: &Splits,
        names: &[String],
    ) -> Result<Candidate> {
        let mut best: Option<(f64, f64)> = None;
        for &alpha in &self.config.alphas {
            let model = self.fit_logistic(x, labels, &splits.fit, alpha)?;
            let val_auc = roc_auc(
                &margins(&model, &x.select(Axis(0), &splits.val)),
                &pick(labels, &splits.val),
            );
            debug!(alpha, val_auc, "Evaluated penalty");
            if best.map_or(true, |(_, auc)| val_auc > auc) {
                best = Some((alpha, val_auc));
            }
        }
        let (alpha, _) =
            best.ok_or_else(|| AppError::Training("penalty grid is empty".to_string()))?;

        let model = self.fit_logistic(x, labels, &splits.train, alpha)?;
        let (accuracy, auc) = evaluate(
            &margins(&model, &x.select(Axis(0), &splits.test)),
            &pick(labels, &splits.test),
        );
        info!(alpha, accuracy, auc, "Fitted {}", LOGISTIC_MODEL_NAME);

        Ok(Candidate {
            name: LOGISTIC_MODEL_NAME,
            auc,
            metrics: ModelMetrics {
                accuracy: round_to(accuracy, 3),
                auc: round_to(auc, 3),
                feature_importance: top_coefficients(
                    names,
                    &model.coefficients,
                    self.config.top_features,
                ),
            },
            model: ModelStage::LogisticRegression(model),
        })
    }

    /// Tree depth picked by validation AUC, then refit on the train split
    fn train_tree(
        &self,
        x: &Array2<f64>,
        labels: &[bool],
        splits: &Splits,
        names: &[String],
    ) -> Result<Candidate> {
        let mut best: Option<(usize, f64)> = None;
        for &depth in &self.config.tree_depths {
            let (tree, _) = self.fit_tree(x, labels, &splits.fit, depth)?;
            let val_auc = roc_auc(
                &tree_margins(&tree, &x.select(Axis(0), &splits.val)),
                &pick(labels, &splits.val),
            );
            debug!(depth, val_auc, "Evaluated tree depth");
            if best.map_or(true, |(_, auc)| val_auc > auc) {
                best = Some((depth, val_auc));
            }
        }
        let (depth, _) =
            best.ok_or_else(|| AppError::Training("tree depth grid is empty".to_string()))?;

        let (tree, gains) = self.fit_tree(x, labels, &splits.train, depth)?;
        let (accuracy, auc) = evaluate(
            &tree_margins(&tree, &x.select(Axis(0), &splits.test)),
            &pick(labels, &splits.test),
        );
        info!(depth, leaves = tree.nodes.len(), accuracy, auc, "Fitted {}", TREE_MODEL_NAME);

        let total: f64 = gains.iter().sum();
        let importance: Vec<f64> = if total > 0.0 {
            gains.iter().map(|g| g / total).collect()
        } else {
            gains
        };

        Ok(Candidate {
            name: TREE_MODEL_NAME,
            auc,
            metrics: ModelMetrics {
                accuracy: round_to(accuracy, 3),
                auc: round_to(auc, 3),
                feature_importance: top_coefficients(names, &importance, self.config.top_features),
            },
            model: ModelStage::GradientBoosting(TreeEnsemble {
                base_score: 0.0,
                trees: vec![tree],
            }),
        })
    }

    fn fit_logistic(
        &self,
        x: &Array2<f64>,
        labels: &[bool],
        rows: &[usize],
        alpha: f64,
    ) -> Result<LinearModel> {
        let x = x.select(Axis(0), rows);
        let targets = Array1::from_iter(rows.iter().map(|&r| labels[r] as usize));
        let dataset = Dataset::new(x.clone(), targets);

        let fitted = LogisticRegression::default()
            .alpha(alpha)
            .max_iterations(self.config.max_iterations)
            .fit(&dataset)
            .map_err(|e| AppError::Training(format!("logistic regression failed: {}", e)))?;

        let mut model = LinearModel {
            coefficients: fitted.params().to_vec(),
            intercept: fitted.intercept(),
        };

        // linfa picks its own positive class; point the margin at churn
        if roc_auc(&margins(&model, &x), &pick(labels, rows)) < 0.5 {
            warn!("Flipping fitted coefficients toward the churn class");
            model.coefficients.iter_mut().for_each(|w| *w = -*w);
            model.intercept = -model.intercept;
        }
        Ok(model)
    }

    /// Fit a CART tree on `rows` and re-express it as a log-odds tree whose
    /// covers are the training rows reaching each node. Also returns the
    /// impurity decrease credited to each column.
    fn fit_tree(
        &self,
        x: &Array2<f64>,
        labels: &[bool],
        rows: &[usize],
        depth: usize,
    ) -> Result<(Tree, Vec<f64>)> {
        let targets = Array1::from_iter(rows.iter().map(|&r| labels[r] as usize));
        let dataset = Dataset::new(x.select(Axis(0), rows), targets);

        let fitted = DecisionTree::<f64, usize>::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(Some(depth))
            .min_weight_leaf(self.config.min_leaf_rows as f32)
            .fit(&dataset)
            .map_err(|e| AppError::Training(format!("decision tree failed: {}", e)))?;

        let mut export = TreeExport {
            x,
            labels,
            nodes: Vec::new(),
            gains: vec![0.0; x.ncols()],
        };
        export.node(fitted.root_node(), rows);
        Ok((Tree { nodes: export.nodes }, export.gains))
    }
}

/// Walks a fitted linfa tree, routing training rows to recompute covers
/// and leaf values.
struct TreeExport<'a> {
    x: &'a Array2<f64>,
    labels: &'a [bool],
    nodes: Vec<TreeNode>,
    gains: Vec<f64>,
}

impl TreeExport<'_> {
    /// Returns the index of the exported node. `rows` is never empty.
    fn node(&mut self, fitted: &FittedNode<f64, usize>, rows: &[usize]) -> usize {
        if !fitted.is_leaf() {
            let (feature, threshold, gain) = fitted.split();
            let children = fitted.children();
            let left = children.first().and_then(|c| c.as_deref());
            let right = children.get(1).and_then(|c| c.as_deref());

            if let (Some(left), Some(right)) = (left, right) {
                let (l_rows, r_rows): (Vec<usize>, Vec<usize>) = rows
                    .iter()
                    .copied()
                    .partition(|&r| self.x[[r, feature]] < threshold);

                // A split no training row crosses is dropped
                if l_rows.is_empty() {
                    return self.node(right, rows);
                }
                if r_rows.is_empty() {
                    return self.node(left, rows);
                }

                let idx = self.nodes.len();
                self.nodes.push(TreeNode::Leaf {
                    value: 0.0,
                    cover: rows.len() as f64,
                });
                self.gains[feature] += gain.max(0.0);
                let left = self.node(left, &l_rows);
                let right = self.node(right, &r_rows);
                self.nodes[idx] = TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    cover: rows.len() as f64,
                };
                return idx;
            }
        }

        // Laplace-smoothed churn rate of the leaf, as log-odds
        let churned = rows.iter().filter(|&&r| self.labels[r]).count() as f64;
        let rate = (churned + 1.0) / (rows.len() as f64 + 2.0);
        self.nodes.push(TreeNode::Leaf {
            value: (rate / (1.0 - rate)).ln(),
            cover: rows.len() as f64,
        });
        self.nodes.len() - 1
    }
}

/// Accuracy at the 0.5 threshold and AUC of margins against labels
fn evaluate(margins: &[f64], labels: &[bool]) -> (f64, f64) {
    let correct = margins
        .iter()
        .zip(labels)
        .filter(|(m, y)| (sigmoid(**m) >= 0.5) == **y)
        .count();
    (
        correct as f64 / labels.len().max(1) as f64,
        roc_auc(margins, labels),
    )
}

fn tree_margins(tree: &Tree, x: &Array2<f64>) -> Vec<f64> {
    x.outer_iter().map(|row| tree.predict(row)).collect()
}

fn pick(labels: &[bool], rows: &[usize]) -> Vec<bool> {
    rows.iter().map(|&r| labels[r]).collect()
}

fn margins(model: &LinearModel, x: &Array2<f64>) -> Vec<f64> {
    x.outer_iter().map(|row| model.margin(row)).collect()
}

fn select(records: &[CustomerRecord], idx: &[usize]) -> Vec<CustomerRecord> {
    idx.iter().map(|&i| records[i].clone()).collect()
}

/// Deterministic interleaved split: every k-th index is held out, where
/// `k = round(1 / fraction)`.
fn holdout(idx: &[usize], fraction: f64) -> (Vec<usize>, Vec<usize>) {
    let k = ((1.0 / fraction).round() as usize).max(2);
    let (held, kept): (Vec<(usize, usize)>, Vec<(usize, usize)>) =
        idx.iter().copied().enumerate().partition(|(pos, _)| pos % k == k - 1);
    (
        kept.into_iter().map(|(_, i)| i).collect(),
        held.into_iter().map(|(_, i)| i).collect(),
    )
}

/// Largest absolute coefficients, descending, rounded to 4 places
fn top_coefficients(names: &[String], coefficients: &[f64], n: usize) -> IndexMap<String, f64> {
    let mut ranked: Vec<(&String, f64)> = names
        .iter()
        .zip(coefficients.iter().map(|w| w.abs()))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .into_iter()
        .take(n)
        .map(|(name, w)| (name.clone(), round_to(w, 4)))
        .collect()
}

/// Area under the ROC curve via the rank-sum statistic; ties share the
/// average rank. Degenerate label sets score 0.5.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> f64 {
    let positives = labels.iter().filter(|&&y| y).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += order[i..=j].iter().filter(|&&k| labels[k]).count() as f64 * avg_rank;
        i = j + 1;
    }

    let p = positives as f64;
    (rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
