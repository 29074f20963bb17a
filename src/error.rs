use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read guard config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse guard config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid guard config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("LLM auth token is not configured")]
    MissingToken,
    #[error("analytics API key is not configured")]
    MissingAnalyticsKey,
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("analytics query failed: {0}")]
    QueryFailed(String),
    #[error("analytics query timed out")]
    QueryTimeout,
}

// Handler failures (admission rejections are not errors, see guard.rs)
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotConfigured(&'static str),
    #[error("{0}")]
    NoData(&'static str),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotConfigured(_) | AppError::NoData(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(UpstreamError::Status { .. }) => StatusCode::BAD_GATEWAY,
            AppError::Upstream(
                UpstreamError::Request(_)
                | UpstreamError::MissingToken
                | UpstreamError::MissingAnalyticsKey
                | UpstreamError::QueryFailed(_)
                | UpstreamError::QueryTimeout,
            ) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
