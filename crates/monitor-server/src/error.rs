use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use xsi_monitor_core::MonitorError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors raised by the monitor service
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("{message}")]
    BadRequest { message: String },
}

impl ServerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Monitor(MonitorError::ChannelClosed) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body of every non-2xx response and of the start/stop answers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Monitor(MonitorError::ChannelClosed) => {
                "No monitoring channel is open".to_string()
            }
            Self::BadRequest { message } => message.clone(),
            other => {
                tracing::error!("Request failed: {}", other);
                "An internal error occurred".to_string()
            }
        };
        (status, Json(MessageResponse::new(message))).into_response()
    }
}
