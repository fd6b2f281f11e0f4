//! Error types for the reply gateway.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors surfaced by the gateway to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Reply pipeline failed: {0}")]
    PipelineFailure(String),

    #[error("Queue backend failed: {0}")]
    QueueBackendFailure(#[from] QueueError),
}

impl GatewayError {
    /// HTTP status class for this error: caller-input errors are 4xx,
    /// collaborator and backend errors are 5xx.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PipelineFailure(_) | Self::QueueBackendFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code returned alongside the message.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::PipelineFailure(_) => "pipeline_failure",
            Self::QueueBackendFailure(_) => "queue_backend_failure",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            code: self.error_code(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<PipelineError> for GatewayError {
    fn from(err: PipelineError) -> Self {
        Self::PipelineFailure(err.to_string())
    }
}

/// Errors from a queue sink while persisting a batch.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Errors raised by the reply-generation collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Request to reply pipeline failed: {0}")]
    Request(String),

    #[error("Reply pipeline returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from reply pipeline: {0}")]
    InvalidResponse(String),

    #[error("Reply pipeline unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_is_client_error() {
        let err = GatewayError::InvalidRequest("email must not be empty".into());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[test]
    fn collaborator_and_backend_errors_are_server_errors() {
        let pipeline: GatewayError = PipelineError::Unavailable("no endpoint".into()).into();
        assert_eq!(pipeline.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(pipeline.error_code(), "pipeline_failure");

        let queue: GatewayError =
            QueueError::Database(DatabaseError::Transaction("locked".into())).into();
        assert_eq!(queue.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(queue.error_code(), "queue_backend_failure");
    }

    #[test]
    fn pipeline_error_message_is_preserved() {
        let err: GatewayError = PipelineError::Status {
            status: 503,
            body: "overloaded".into(),
        }
        .into();
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
    }
}
