use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::error;

use crate::metrics::render;

pub async fn metrics_handler() -> impl IntoResponse {
    render().map_err(|e| {
        error!(error = %e, "failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
