use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use std::sync::Arc;

use super::{admit, require_analytics};
use crate::error::AppError;
use crate::metrics::REQUEST_TOTAL;
use crate::onchain::{DAILY_TRANSFERS_SQL, DailyTransfers, OnchainReport, summarize};
use crate::state::AppState;

// not in the endpoint table, so the fallback limits apply
const ENDPOINT: &str = "onchain";

pub async fn onchain_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, Response> {
    REQUEST_TOTAL.with_label_values(&[ENDPOINT]).inc();
    require_analytics(&state)?;
    admit(&state, &headers, ENDPOINT, None)?;

    let report = onchain_report(&state)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(state.guard.secure_headers(Json(report), ENDPOINT))
}

async fn onchain_report(state: &AppState) -> Result<OnchainReport, AppError> {
    let daily: Vec<DailyTransfers> = state.upstream.run_query(DAILY_TRANSFERS_SQL).await?;
    Ok(OnchainReport {
        summary: summarize(&daily),
        daily,
        updated_at: Utc::now().to_rfc3339(),
    })
}
