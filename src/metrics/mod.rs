/// Prometheus metrics for the churn service.
///
/// All collectors live in one process-wide registry and are exposed in text
/// format on `/metrics`.
///
/// # Example
/// ```no_run
/// use churn_service::metrics::PREDICTIONS_TOTAL;
///
/// PREDICTIONS_TOTAL.with_label_values(&["single", "1"]).inc();
/// ```

mod middleware;

pub use middleware::track_http_metrics;

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry};

const NAMESPACE: &str = "churn_service";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    /// Predictions served.
    ///
    /// Labels: source (single, batch), label (0, 1)
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of churn predictions")
            .namespace(NAMESPACE),
        &["source", "label"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Labels: endpoint
    pub static ref SCHEMA_REJECTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("schema_rejections_total", "Requests rejected by schema validation")
            .namespace(NAMESPACE),
        &["endpoint"]
    ).expect("Failed to create SCHEMA_REJECTIONS_TOTAL metric");

    pub static ref EXPLANATION_FAILURES_TOTAL: Counter = Counter::with_opts(
        Opts::new("explanation_failures_total", "Attribution computations that failed")
            .namespace(NAMESPACE)
    ).expect("Failed to create EXPLANATION_FAILURES_TOTAL metric");

    /// Time spent in the inference pipeline for one record
    pub static ref INFERENCE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "inference_duration_seconds",
            "Pipeline inference duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
    ).expect("Failed to create INFERENCE_DURATION_SECONDS metric");

    /// Rows per accepted batch upload
    pub static ref BATCH_ROWS: Histogram = Histogram::with_opts(
        HistogramOpts::new("batch_rows", "Rows per batch upload")
            .namespace(NAMESPACE)
            .buckets(vec![1.0, 10.0, 100.0, 1000.0, 10000.0, 100000.0]),
    ).expect("Failed to create BATCH_ROWS metric");
}

fn register<C: Collector + Clone + 'static>(collector: &C) -> Result<(), prometheus::Error> {
    match PROMETHEUS_REGISTRY.register(Box::new(collector.clone())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Register every collector with [`PROMETHEUS_REGISTRY`].
///
/// Safe to call more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(&*HTTP_REQUESTS_TOTAL)?;
    register(&*HTTP_REQUEST_DURATION_SECONDS)?;
    register(&*PREDICTIONS_TOTAL)?;
    register(&*SCHEMA_REJECTIONS_TOTAL)?;
    register(&*EXPLANATION_FAILURES_TOTAL)?;
    register(&*INFERENCE_DURATION_SECONDS)?;
    register(&*BATCH_ROWS)?;

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Encode the registry in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_gather_metrics() {
        init_metrics().unwrap();
        PREDICTIONS_TOTAL.with_label_values(&["single", "1"]).inc();

        let metrics = gather_metrics();
        assert!(metrics.contains("churn_service_predictions_total"));
    }
}
