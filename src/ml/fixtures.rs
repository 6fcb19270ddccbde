//! Hand-built artifacts and records shared by unit tests.

use crate::ml::features::{CategoricalColumn, NumericColumn, Preprocessor};
use crate::ml::models::{LinearModel, ModelStage, PipelineArtifact, Tree, TreeEnsemble, TreeNode};
use crate::schema::*;

pub fn high_risk_record() -> CustomerRecord {
    CustomerRecord {
        gender: Gender::Female,
        senior_citizen: 0,
        partner: YesNo::No,
        dependents: YesNo::No,
        tenure: 1,
        phone_service: YesNo::Yes,
        multiple_lines: PhoneLines::No,
        internet_service: InternetService::FiberOptic,
        online_security: InternetAddon::No,
        online_backup: InternetAddon::No,
        device_protection: InternetAddon::No,
        tech_support: InternetAddon::No,
        streaming_tv: InternetAddon::Yes,
        streaming_movies: InternetAddon::Yes,
        contract: Contract::MonthToMonth,
        paperless_billing: YesNo::Yes,
        payment_method: PaymentMethod::ElectronicCheck,
        monthly_charges: 95.0,
        total_charges: 95.0,
    }
}

pub fn low_risk_record() -> CustomerRecord {
    CustomerRecord {
        gender: Gender::Male,
        senior_citizen: 0,
        partner: YesNo::Yes,
        dependents: YesNo::Yes,
        tenure: 70,
        phone_service: YesNo::Yes,
        multiple_lines: PhoneLines::Yes,
        internet_service: InternetService::No,
        online_security: InternetAddon::NoInternetService,
        online_backup: InternetAddon::NoInternetService,
        device_protection: InternetAddon::NoInternetService,
        tech_support: InternetAddon::NoInternetService,
        streaming_tv: InternetAddon::NoInternetService,
        streaming_movies: InternetAddon::NoInternetService,
        contract: Contract::TwoYear,
        paperless_billing: YesNo::No,
        payment_method: PaymentMethod::CreditCard,
        monthly_charges: 20.0,
        total_charges: 1400.0,
    }
}

/// Scaling close to the reference dataset, every schema category encoded
pub fn reference_preprocessor() -> Preprocessor {
    let numeric = Field::numeric_fields()
        .map(|field| {
            let (mean, scale) = match field {
                Field::SeniorCitizen => (0.16, 0.37),
                Field::Tenure => (32.0, 24.0),
                Field::MonthlyCharges => (65.0, 30.0),
                _ => (2280.0, 2265.0),
            };
            NumericColumn { field, mean, scale }
        })
        .collect();

    let categorical = Field::categorical_fields()
        .map(|field| CategoricalColumn {
            field,
            categories: field.categories().into_iter().map(String::from).collect(),
        })
        .collect();

    Preprocessor {
        numeric,
        categorical,
    }
}

fn column(pre: &Preprocessor, name: &str) -> usize {
    pre.feature_names()
        .iter()
        .position(|n| n == name)
        .unwrap_or_else(|| panic!("no column {}", name))
}

fn background(pre: &Preprocessor) -> Vec<f64> {
    let mut mean = vec![0.0; pre.numeric.len()];
    for column in &pre.categorical {
        let k = column.categories.len() as f64;
        mean.extend(std::iter::repeat(1.0 / k).take(column.categories.len()));
    }
    mean
}

/// Logistic model skewed toward short-tenure, high-charge churn
pub fn linear_artifact() -> PipelineArtifact {
    let pre = reference_preprocessor();
    let weights = [
        ("SeniorCitizen", 0.2),
        ("tenure", -1.2),
        ("MonthlyCharges", 0.6),
        ("TotalCharges", -0.3),
        ("Contract_Month-to-month", 0.8),
        ("Contract_One year", -0.3),
        ("Contract_Two year", -1.0),
        ("InternetService_Fiber optic", 0.5),
        ("InternetService_DSL", -0.2),
        ("InternetService_No", -0.4),
        ("PaymentMethod_Electronic check", 0.4),
        ("OnlineSecurity_No", 0.3),
        ("TechSupport_No", 0.3),
    ];

    let mut coefficients = vec![0.0; pre.n_features()];
    for (name, w) in weights {
        coefficients[column(&pre, name)] = w;
    }

    PipelineArtifact {
        schema_version: SCHEMA_VERSION.to_string(),
        model_name: "Logistic Regression".to_string(),
        trained_at: chrono::Utc::now(),
        background_mean: background(&pre),
        model: ModelStage::LogisticRegression(LinearModel {
            coefficients,
            intercept: -1.0,
        }),
        preprocessor: pre,
    }
}

/// Three small trees: two stumps and one depth-two interaction tree
pub fn stump_ensemble_artifact() -> PipelineArtifact {
    let pre = reference_preprocessor();
    let tenure = column(&pre, "tenure");
    let monthly = column(&pre, "MonthlyCharges");
    let month_to_month = column(&pre, "Contract_Month-to-month");

    let trees = vec![
        Tree {
            nodes: vec![
                TreeNode::Split { feature: tenure, threshold: -0.5, left: 1, right: 2, cover: 100.0 },
                TreeNode::Leaf { value: 1.5, cover: 30.0 },
                TreeNode::Leaf { value: -1.0, cover: 70.0 },
            ],
        },
        Tree {
            nodes: vec![
                TreeNode::Split { feature: month_to_month, threshold: 0.5, left: 1, right: 2, cover: 100.0 },
                TreeNode::Leaf { value: -1.2, cover: 45.0 },
                TreeNode::Leaf { value: 1.0, cover: 55.0 },
            ],
        },
        Tree {
            nodes: vec![
                TreeNode::Split { feature: monthly, threshold: 0.0, left: 1, right: 2, cover: 10.0 },
                TreeNode::Leaf { value: -0.3, cover: 5.0 },
                TreeNode::Split { feature: tenure, threshold: 0.0, left: 3, right: 4, cover: 5.0 },
                TreeNode::Leaf { value: 0.8, cover: 2.0 },
                TreeNode::Leaf { value: 0.1, cover: 3.0 },
            ],
        },
    ];

    PipelineArtifact {
        schema_version: SCHEMA_VERSION.to_string(),
        model_name: "XGBoost".to_string(),
        trained_at: chrono::Utc::now(),
        background_mean: Vec::new(),
        model: ModelStage::GradientBoosting(TreeEnsemble {
            base_score: -0.5,
            trees,
        }),
        preprocessor: pre,
    }
}
