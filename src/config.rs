use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// HTTP server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Persisted model artifacts
    pub artifacts: ArtifactsConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Offline training configuration
    #[validate(nested)]
    pub training: TrainingConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: CHURN__)
            .add_source(
                config::Environment::with_prefix("CHURN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config
            .validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(config)
    }

    /// Load configuration, falling back to the defaults when loading fails.
    /// The failure is reported on stderr since logging is not set up yet.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            eprintln!("Failed to load configuration: {}", e);
            eprintln!("Using default configuration");
            Self::default()
        })
    }

    /// Socket address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            artifacts: ArtifactsConfig::default(),
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logs: false,
                service_name: default_service_name(),
                prometheus_enabled: true,
            },
            training: TrainingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Largest accepted request body, including CSV uploads
    #[serde(default = "default_max_upload_bytes")]
    #[validate(range(min = 1024))]
    pub max_upload_bytes: usize,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Serialized fitted pipeline
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Model metrics and dashboard statistics
    #[serde(default = "default_metrics_path")]
    pub metrics_path: PathBuf,

    /// Reference dataset used by `churn-cli train`
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            metrics_path: default_metrics_path(),
            dataset_path: default_dataset_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrainingConfig {
    /// Fraction of rows held out for the final evaluation
    #[serde(default = "default_test_size")]
    #[validate(range(min = 0.05, max = 0.5))]
    pub test_size: f64,

    /// Fraction of the training rows used to pick the penalty
    #[serde(default = "default_validation_size")]
    #[validate(range(min = 0.05, max = 0.5))]
    pub validation_size: f64,

    /// L2 penalties searched for the logistic model
    #[serde(default = "default_alphas")]
    #[validate(length(min = 1))]
    pub alphas: Vec<f64>,

    /// Solver iteration cap
    #[serde(default = "default_max_iterations")]
    #[validate(range(min = 1))]
    pub max_iterations: u64,

    /// Depths searched for the decision tree
    #[serde(default = "default_tree_depths")]
    #[validate(length(min = 1))]
    pub tree_depths: Vec<usize>,

    /// Minimum training rows per tree leaf
    #[serde(default = "default_min_leaf_rows")]
    #[validate(range(min = 1))]
    pub min_leaf_rows: usize,

    /// Number of coefficients kept in the stored feature importance
    #[serde(default = "default_top_features")]
    pub top_features: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            validation_size: default_validation_size(),
            alphas: default_alphas(),
            max_iterations: default_max_iterations(),
            tree_depths: default_tree_depths(),
            min_leaf_rows: default_min_leaf_rows(),
            top_features: default_top_features(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_request_timeout() -> u64 {
    30
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model.json")
}

fn default_metrics_path() -> PathBuf {
    PathBuf::from("metrics.json")
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("Telco_Cust_Churn.csv")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "churn-service".to_string()
}

fn default_true() -> bool {
    true
}

fn default_test_size() -> f64 {
    0.2
}

fn default_validation_size() -> f64 {
    0.25
}

fn default_alphas() -> Vec<f64> {
    vec![0.1, 1.0, 10.0]
}

fn default_max_iterations() -> u64 {
    1000
}

fn default_tree_depths() -> Vec<usize> {
    vec![3, 4, 5, 6]
}

fn default_min_leaf_rows() -> usize {
    5
}

fn default_top_features() -> usize {
    20
}
