//! Shared builders for the integration tests.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use churn_service::{
    api::{build_router, AppState},
    artifacts::Artifacts,
    config::ServerConfig,
    ml::{
        CategoricalColumn, DashboardStats, LinearModel, MetricsArtifact, ModelMetrics,
        ModelStage, NumericColumn, PipelineArtifact, Preprocessor,
    },
    schema::{Field, SCHEMA_VERSION},
};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::HashMap;
use tower::ServiceExt;

pub const CSV_HEADER: &str = "customerID,gender,SeniorCitizen,Partner,Dependents,tenure,PhoneService,MultipleLines,InternetService,OnlineSecurity,OnlineBackup,DeviceProtection,TechSupport,StreamingTV,StreamingMovies,Contract,PaperlessBilling,PaymentMethod,MonthlyCharges,TotalCharges";

pub fn high_risk_json() -> Value {
    json!({
        "gender": "Female",
        "SeniorCitizen": 0,
        "Partner": "No",
        "Dependents": "No",
        "tenure": 1,
        "PhoneService": "Yes",
        "MultipleLines": "No",
        "InternetService": "Fiber optic",
        "OnlineSecurity": "No",
        "OnlineBackup": "No",
        "DeviceProtection": "No",
        "TechSupport": "No",
        "StreamingTV": "Yes",
        "StreamingMovies": "Yes",
        "Contract": "Month-to-month",
        "PaperlessBilling": "Yes",
        "PaymentMethod": "Electronic check",
        "MonthlyCharges": 95.0,
        "TotalCharges": 95.0
    })
}

pub fn low_risk_json() -> Value {
    json!({
        "gender": "Male",
        "SeniorCitizen": 0,
        "Partner": "Yes",
        "Dependents": "Yes",
        "tenure": 70,
        "PhoneService": "Yes",
        "MultipleLines": "Yes",
        "InternetService": "No",
        "OnlineSecurity": "No internet service",
        "OnlineBackup": "No internet service",
        "DeviceProtection": "No internet service",
        "TechSupport": "No internet service",
        "StreamingTV": "No internet service",
        "StreamingMovies": "No internet service",
        "Contract": "Two year",
        "PaperlessBilling": "No",
        "PaymentMethod": "Credit card (automatic)",
        "MonthlyCharges": 20.0,
        "TotalCharges": 1400.0
    })
}

/// One CSV data row built from a JSON record
pub fn csv_row(id: &str, record: &Value) -> String {
    let mut cells = vec![id.to_string()];
    for name in CSV_HEADER.split(',').skip(1) {
        cells.push(match &record[name] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }
    cells.join(",")
}

pub fn csv_document(rows: &[String]) -> String {
    let mut text = CSV_HEADER.to_string();
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.push('\n');
    text
}

/// Logistic pipeline over every schema category, skewed toward
/// short-tenure month-to-month churn
pub fn linear_artifact() -> PipelineArtifact {
    let numeric: Vec<NumericColumn> = Field::numeric_fields()
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
    let categorical: Vec<CategoricalColumn> = Field::categorical_fields()
        .map(|field| CategoricalColumn {
            field,
            categories: field.categories().into_iter().map(String::from).collect(),
        })
        .collect();
    let preprocessor = Preprocessor {
        numeric,
        categorical,
    };

    let weights: HashMap<&str, f64> = [
        ("tenure", -1.2),
        ("MonthlyCharges", 0.6),
        ("TotalCharges", -0.3),
        ("Contract_Month-to-month", 0.8),
        ("Contract_Two year", -1.0),
        ("InternetService_Fiber optic", 0.5),
        ("PaymentMethod_Electronic check", 0.4),
    ]
    .into_iter()
    .collect();

    let coefficients = preprocessor
        .feature_names()
        .iter()
        .map(|n| weights.get(n.as_str()).copied().unwrap_or(0.0))
        .collect();

    let mut background_mean = vec![0.0; preprocessor.numeric.len()];
    for column in &preprocessor.categorical {
        let k = column.categories.len();
        background_mean.extend(std::iter::repeat(1.0 / k as f64).take(k));
    }

    PipelineArtifact {
        schema_version: SCHEMA_VERSION.to_string(),
        model_name: "Logistic Regression".to_string(),
        trained_at: chrono::Utc::now(),
        preprocessor,
        model: ModelStage::LogisticRegression(LinearModel {
            coefficients,
            intercept: -1.0,
        }),
        background_mean,
    }
}

pub fn metrics_artifact() -> MetricsArtifact {
    let mut importance = IndexMap::new();
    importance.insert("tenure".to_string(), 1.2);
    importance.insert("Contract_Two year".to_string(), 1.0);

    let mut models = IndexMap::new();
    models.insert(
        "Logistic Regression".to_string(),
        ModelMetrics {
            accuracy: 0.805,
            auc: 0.843,
            feature_importance: importance,
        },
    );

    let mut dashboard = DashboardStats::default();
    for (k, v) in [("Month-to-month", 0.4271), ("One year", 0.1127), ("Two year", 0.0283)] {
        dashboard.contract.insert(k.to_string(), v);
    }
    for (k, v) in [("0-12", 0.4744), ("13-24", 0.2871), ("25+", 0.1408)] {
        dashboard.tenure.insert(k.to_string(), v);
    }
    for (k, v) in [("0-50", 0.1782), ("51-100", 0.315), ("101+", 0.3286)] {
        dashboard.monthly.insert(k.to_string(), v);
    }

    MetricsArtifact {
        models,
        current_model: Some("Logistic Regression".to_string()),
        dashboard,
    }
}

pub fn loaded_artifacts() -> Artifacts {
    Artifacts::from_parts(Some(linear_artifact()), Some(metrics_artifact()))
        .expect("fixture artifacts are valid")
}

pub fn app(artifacts: &Artifacts) -> Router {
    build_router(AppState::from_artifacts(artifacts), &ServerConfig::default())
}

/// Run one request through the router and decode the reply. Non-JSON
/// bodies come back as a JSON string.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const BOUNDARY: &str = "churn-test-boundary";

/// Multipart request carrying `content` in a part named `field`
pub fn post_multipart(uri: &str, field: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"upload.csv\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = field,
        c = content
    );
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Prometheus exposition lines grouped by metric family
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                current_metric = parts[2].to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}
