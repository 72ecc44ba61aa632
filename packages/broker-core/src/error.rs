// ABOUTME: The broker-wide error taxonomy and its HTTP mapping
// ABOUTME: mirrors packages/cli's AppError: machine-readable code, sanitized message, audit logging

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Top-level error type returned by every broker component. Each variant
/// corresponds to one of the error kinds in the data model's error taxonomy.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not authorized")]
    NotAuthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("container runtime unavailable")]
    RuntimeUnavailable,

    #[error("execution timed out after {0}s")]
    ExecTimeout(u64),

    #[error("execution failed: {0}")]
    ExecFailed(String),

    #[error("package install failed: {0}")]
    InstallFailed(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// Structured error response body for API consistency.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorDetail,
    request_id: String,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<HashMap<String, String>>,
}

impl BrokerError {
    fn to_status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            BrokerError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            BrokerError::NotAuthorized => (StatusCode::FORBIDDEN, "not_authorized"),
            BrokerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            BrokerError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            BrokerError::RuntimeUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "runtime_unavailable")
            }
            BrokerError::ExecTimeout(_) => (StatusCode::REQUEST_TIMEOUT, "exec_timeout"),
            BrokerError::ExecFailed(_) => (StatusCode::OK, "exec_failed"),
            BrokerError::InstallFailed(_) => (StatusCode::OK, "install_failed"),
            BrokerError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            BrokerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }

    /// Sanitized, external-facing message. Never includes the wrapped
    /// internal error's Display output for Internal/Io variants.
    fn to_user_message(&self) -> String {
        match self {
            BrokerError::InvalidArgument(msg) => msg.clone(),
            BrokerError::NotAuthorized => "you do not have access to this resource".to_string(),
            BrokerError::NotFound(what) => format!("{what} not found"),
            BrokerError::Conflict(msg) => msg.clone(),
            BrokerError::RuntimeUnavailable => {
                "the container runtime is currently unavailable".to_string()
            }
            BrokerError::ExecTimeout(secs) => format!("execution exceeded the {secs}s timeout"),
            BrokerError::ExecFailed(msg) => msg.clone(),
            BrokerError::InstallFailed(msg) => msg.clone(),
            BrokerError::Io(_) => "an internal I/O error occurred".to_string(),
            BrokerError::Internal(_) => "an internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let (status_code, error_code) = self.to_status_and_code();
        let user_message = self.to_user_message();

        match &self {
            BrokerError::Internal(err) => {
                error!(request_id = %request_id, error = %err, "internal server error");
            }
            BrokerError::Io(msg) => {
                error!(request_id = %request_id, io_error = %msg, "io error");
            }
            BrokerError::RuntimeUnavailable => {
                error!(request_id = %request_id, "container runtime unavailable");
            }
            BrokerError::NotAuthorized => {
                warn!(request_id = %request_id, audit = true, "access denied");
            }
            _ => {
                tracing::info!(
                    request_id = %request_id,
                    error_code = %error_code,
                    error = %self,
                    "api error response"
                );
            }
        }

        let error_detail = ErrorDetail {
            code: error_code.to_string(),
            message: user_message,
            retry_after: None,
            details: None,
        };

        let response_body = ErrorResponse {
            success: false,
            error: error_detail,
            request_id,
        };

        let mut response = Json(response_body).into_response();
        *response.status_mut() = status_code;
        response
    }
}

/// Result type alias used across every broker crate.
pub type Result<T> = std::result::Result<T, BrokerError>;

impl BrokerError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn exec_failed(msg: impl Into<String>) -> Self {
        Self::ExecFailed(msg.into())
    }

    pub fn install_failed(msg: impl Into<String>) -> Self {
        Self::InstallFailed(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}
