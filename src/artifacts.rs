//! Startup artifacts: the fitted pipeline and the metrics file.
//!
//! Both are optional. A missing file is logged and leaves the corresponding
//! endpoints answering `404`; a file that exists but cannot be read or
//! validated aborts startup.

use crate::config::ArtifactsConfig;
use crate::error::{AppError, Result};
use crate::ml::{FittedPipeline, MetricsArtifact, PipelineArtifact};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Immutable artifacts shared by every service
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    pub pipeline: Option<Arc<FittedPipeline>>,
    pub metrics: Option<Arc<MetricsArtifact>>,
}

impl Artifacts {
    pub fn load(config: &ArtifactsConfig) -> Result<Self> {
        let pipeline = read_artifact::<PipelineArtifact>(&config.model_path, "model")?;
        let metrics = read_artifact::<MetricsArtifact>(&config.metrics_path, "metrics")?;
        Self::from_parts(pipeline, metrics)
    }

    /// Validate deserialized artifacts
    pub fn from_parts(
        pipeline: Option<PipelineArtifact>,
        metrics: Option<MetricsArtifact>,
    ) -> Result<Self> {
        let pipeline = pipeline.map(FittedPipeline::new).transpose()?;

        if let (Some(p), Some(m)) = (&pipeline, &metrics) {
            let served = &p.artifact().model_name;
            if m.current_model.as_deref() != Some(served.as_str()) {
                warn!(
                    served = %served,
                    reported = ?m.current_model,
                    "Metrics report a different active model than the one served"
                );
            }
        }

        Ok(Self {
            pipeline: pipeline.map(Arc::new),
            metrics: metrics.map(Arc::new),
        })
    }

    pub fn model_loaded(&self) -> bool {
        self.pipeline.is_some()
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<Option<T>> {
    if !path.exists() {
        warn!(path = %path.display(), "No {} artifact found; run `churn-cli train`", kind);
        return Ok(None);
    }

    let bytes = std::fs::read(path)?;
    let value = serde_json::from_slice(&bytes).map_err(|e| {
        AppError::Configuration(format!("invalid {} artifact {}: {}", kind, path.display(), e))
    })?;

    info!(
        path = %path.display(),
        sha256 = %format!("{:x}", Sha256::digest(&bytes)),
        "Loaded {} artifact",
        kind
    );
    Ok(Some(value))
}
