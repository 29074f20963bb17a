use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use super::admit;
use crate::error::AppError;
use crate::gap_score::{GapReport, compute};
use crate::metrics::REQUEST_TOTAL;
use crate::state::AppState;

const ENDPOINT: &str = "gap-score";

pub async fn gap_score_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, Response> {
    REQUEST_TOTAL.with_label_values(&[ENDPOINT]).inc();
    admit(&state, &headers, ENDPOINT, None)?;

    let report = gap_report(&state)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(state.guard.secure_headers(Json(report), ENDPOINT))
}

async fn gap_report(state: &AppState) -> Result<GapReport, AppError> {
    let agents = state.upstream.fetch_ranking().await?;
    compute(&agents).ok_or(AppError::NoData("no ranking data available"))
}
