// crates/server/src/error.rs
use agent_pulse_core::{ActivityError, ModelError, TurnError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Tool call not found: {0}")]
    ToolCallNotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Turn failed: {0}")]
    Turn(#[from] TurnError),
}

impl From<ActivityError> for ApiError {
    fn from(err: ActivityError) -> Self {
        match err {
            ActivityError::NotFound { call_id } => ApiError::ToolCallNotFound(call_id),
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::ToolCallNotFound(id) => {
                tracing::warn!(call_id = %id, "Tool call not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Tool call not found", format!("Tool call {id} not found")),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Unavailable(msg) => {
                tracing::error!(message = %msg, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::with_details("Service unavailable", msg.clone()),
                )
            }
            ApiError::Turn(turn_err) => {
                let error_msg = match turn_err {
                    TurnError::LaunchFailed { program, source } => {
                        tracing::error!(program = %program, error = %source, "Agent launch failed");
                        "Agent launch failed"
                    }
                    TurnError::ExitNonZero { code, stderr } => {
                        tracing::error!(exit_code = ?code, stderr = %stderr, "Agent execution failed");
                        "Agent execution failed"
                    }
                    TurnError::EmptyResponse => {
                        tracing::error!("Agent returned empty response");
                        "Agent returned empty response"
                    }
                    TurnError::Timeout(secs) => {
                        tracing::error!(timeout_secs = secs, "Agent timed out");
                        "Agent timed out"
                    }
                    TurnError::Io(e) => {
                        tracing::error!(error = %e, "Agent IO error");
                        "Agent IO error"
                    }
                    TurnError::Aborted(msg) => {
                        tracing::error!(message = %msg, "Agent turn aborted");
                        "Agent turn aborted"
                    }
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details(error_msg, turn_err.to_string()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
