use churn_service::{
    api::{build_router, AppState},
    artifacts::Artifacts,
    config::Config,
    logging::init_tracing,
    metrics,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load_or_default();

    init_tracing(&config.observability);
    tracing::info!(
        "Starting {} v{}",
        config.observability.service_name,
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.prometheus_enabled {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    let artifacts = Artifacts::load(&config.artifacts)?;
    match &artifacts.pipeline {
        Some(pipeline) => tracing::info!(
            model = %pipeline.artifact().model_name,
            features = pipeline.feature_names().len(),
            "Inference pipeline ready"
        ),
        None => tracing::warn!("Serving without a model; scoring endpoints will answer 404"),
    }

    let app = build_router(AppState::from_artifacts(&artifacts), &config.server);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("HTTP API server listening on http://{}", addr);
    tracing::info!("   Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
