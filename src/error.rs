use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input field
    #[error("Schema error: {0}")]
    Schema(String),

    /// The inference pipeline failed to produce a probability
    #[error("Inference error: {0}")]
    Inference(String),

    /// The attribution routine failed
    #[error("Explainer error: {0}")]
    Explainer(String),

    /// The upload body could not be read; carries the transport status
    #[error("Upload error: {message}")]
    Upload { status: StatusCode, message: String },

    /// A required startup artifact is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors, including malformed artifacts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Model fitting errors
    #[error("Training error: {0}")]
    Training(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Schema(_) => StatusCode::BAD_REQUEST,
            AppError::Upload { status, .. } => *status,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Explainer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Training(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Schema(_) => "SCHEMA_ERROR",
            AppError::Upload { .. } => "UPLOAD_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Inference(_) => "INFERENCE_ERROR",
            AppError::Explainer(_) => "EXPLAINER_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Training(_) => "TRAINING_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message returned to API callers.
    ///
    /// Server-side failures get a fixed message; the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Schema(_) | AppError::NotFound(_) | AppError::Upload { .. } => {
                self.to_string()
            }
            AppError::Inference(_) => "Model inference failed".to_string(),
            AppError::Explainer(_) => "Explanation could not be computed".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request rejected"
            );
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.public_message(),
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from csv::Error
impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        let row = err.position().map(|p| p.line()).unwrap_or(0);
        AppError::Schema(format!("Malformed CSV near line {}: {}", row, err))
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::Schema("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Inference("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Explainer("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::Schema("x".to_string()).error_code(), "SCHEMA_ERROR");
        assert_eq!(AppError::NotFound("x".to_string()).error_code(), "NOT_FOUND");
        assert_eq!(
            AppError::Explainer("x".to_string()).error_code(),
            "EXPLAINER_ERROR"
        );
    }

    #[test]
    fn test_upload_error_keeps_its_status() {
        let err = AppError::Upload {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.error_code(), "UPLOAD_ERROR");
        assert!(err.public_message().contains("length limit"));
    }

    #[test]
    fn test_public_message_hides_internals() {
        let err = AppError::Inference("coefficient vector has 3 entries".to_string());
        assert_eq!(err.public_message(), "Model inference failed");

        let err = AppError::Schema("missing required field 'tenure'".to_string());
        assert!(err.public_message().contains("tenure"));
    }
}
