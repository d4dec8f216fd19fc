#![forbid(unsafe_code)]

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures reported to API callers as `{ok: false, error: {code, message}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("request body must be valid JSON: {0}")]
    InvalidJson(String),

    #[error("{0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Storage(String),

    #[error("{0}")]
    ToolUnavailable(String),

    #[error("{0}")]
    ToolFailed(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::InvalidJson(_) | Self::ToolUnavailable(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::ToolFailed(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage(_) => "STORAGE_UNAVAILABLE",
            Self::ToolUnavailable(_) => "TOOL_UNAVAILABLE",
            Self::ToolFailed(_) => "TOOL_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<vu_core::CertIdError> for ApiError {
    fn from(value: vu_core::CertIdError) -> Self {
        Self::InvalidInput(value.message().to_string())
    }
}

impl From<vu_storage::StoreError> for ApiError {
    fn from(value: vu_storage::StoreError) -> Self {
        match value {
            vu_storage::StoreError::InvalidInput(message) => Self::InvalidInput(message.to_string()),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<crate::tools::ToolError> for ApiError {
    fn from(value: crate::tools::ToolError) -> Self {
        use crate::tools::ToolError;
        match value {
            ToolError::Missing(_) => Self::ToolUnavailable(value.to_string()),
            ToolError::Failed { .. } => Self::ToolFailed(value.to_string()),
            ToolError::Io(err) => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "ok": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Errors that stop the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage: {0}")]
    Store(#[from] vu_storage::StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidJson("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Storage("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn missing_tools_are_client_errors() {
        let err: ApiError = crate::tools::ToolError::Missing("openssl".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "TOOL_UNAVAILABLE");
        let err: ApiError = crate::tools::ToolError::Failed {
            tool: "c2patool".to_string(),
            detail: "bad key".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "c2patool failed: bad key");
    }

    #[test]
    fn store_input_errors_stay_client_errors() {
        let err: ApiError = vu_storage::StoreError::InvalidInput("cert_id must not be empty").into();
        assert_eq!(err.code(), "INVALID_INPUT");
    }
}
