use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::metrics::{gather_metrics, SCHEMA_REJECTIONS_TOTAL};
use crate::services::{
    BatchResult, DashboardView, ExplanationResult, FeatureImportanceView, PredictionResult,
};
use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::JsonRejection,
        State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Count schema failures per endpoint on their way out
fn rejected(endpoint: &str, err: AppError) -> AppError {
    if matches!(err, AppError::Schema(_)) {
        SCHEMA_REJECTIONS_TOTAL.with_label_values(&[endpoint]).inc();
    }
    err
}

/// Multipart failures keep their transport status; plain 400s count as
/// schema rejections
fn upload_error(endpoint: &str, status: StatusCode, message: String) -> AppError {
    if status == StatusCode::BAD_REQUEST {
        rejected(endpoint, AppError::Schema(message))
    } else {
        AppError::Upload { status, message }
    }
}

fn json_body(endpoint: &str, body: std::result::Result<Json<Value>, JsonRejection>) -> Result<Value> {
    body.map(|Json(value)| value)
        .map_err(|e| rejected(endpoint, AppError::Schema(e.body_text())))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let active_model = state
        .dashboard
        .active_model()
        .map(str::to_string)
        .or_else(|| state.prediction.as_ref().map(|p| p.model_name().to_string()));

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        model_loaded: state.prediction.is_some(),
        active_model,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub active_model: Option<String>,
    pub version: String,
}

/// Churn probability for one customer
pub async fn predict(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResult>> {
    let body = json_body("predict", body)?;
    let result = state
        .prediction()?
        .predict_json(&body)
        .map_err(|e| rejected("predict", e))?;
    Ok(Json(result))
}

/// Per-field attributions for one customer
pub async fn explain(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ExplanationResult>> {
    let body = json_body("explain", body)?;
    let result = state
        .explanation()?
        .explain_json(&body)
        .map_err(|e| rejected("explain", e))?;
    Ok(Json(result))
}

/// Score an uploaded CSV (multipart field `file`)
pub async fn batch_predict(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchResult>> {
    const ENDPOINT: &str = "batch-predict";

    let mut multipart =
        multipart.map_err(|e| upload_error(ENDPOINT, e.status(), e.body_text()))?;
    let service = state.batch()?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(ENDPOINT, e.status(), e.body_text()))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| upload_error(ENDPOINT, e.status(), e.body_text()))?;
            info!(file = ?file_name, bytes = bytes.len(), "Received batch upload");
            upload = Some(bytes);
            break;
        }
    }
    let bytes = upload
        .ok_or_else(|| rejected(ENDPOINT, AppError::Schema("No file uploaded".to_string())))?;

    let result = tokio::task::spawn_blocking(move || service.predict_csv(bytes.as_ref()))
        .await
        .map_err(|e| AppError::Internal(format!("batch worker failed: {}", e)))?
        .map_err(|e| rejected(ENDPOINT, e))?;
    Ok(Json(result))
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardView>> {
    Ok(Json(state.dashboard.get_dashboard()?))
}

pub async fn feature_importance(
    State(state): State<AppState>,
) -> Result<Json<FeatureImportanceView>> {
    Ok(Json(state.dashboard.get_feature_importance()?))
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}
