use crate::api::{handlers, AppState};
use crate::config::ServerConfig;
use crate::metrics::track_http_metrics;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        // Scoring
        .route("/api/predict", post(handlers::predict))
        .route("/api/explain", post(handlers::explain))
        .route("/api/batch-predict", post(handlers::batch_predict))
        // Read-only statistics
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/feature-importance", get(handlers::feature_importance))
        .route("/metrics", get(handlers::metrics))
        .route_layer(middleware::from_fn(track_http_metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
