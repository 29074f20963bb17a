use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use super::{admit, require_llm};
use crate::error::AppError;
use crate::insights::{ANALYST_SYSTEM_PROMPT, summarize};
use crate::metrics::REQUEST_TOTAL;
use crate::models::{AnalyzeRequest, AnalyzeResponse, InsightKind};
use crate::state::AppState;

const ENDPOINT: &str = "analyze";

pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Response> {
    REQUEST_TOTAL.with_label_values(&[ENDPOINT]).inc();
    require_llm(&state)?;
    admit(&state, &headers, ENDPOINT, Some(body.len()))?;

    let result = analyze(&state, &body)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(state.guard.secure_headers(Json(result), ENDPOINT))
}

async fn analyze(state: &AppState, body: &[u8]) -> Result<AnalyzeResponse, AppError> {
    let req: AnalyzeRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))?;
    let kind = InsightKind::parse(&req.kind)
        .ok_or_else(|| AppError::BadRequest("Invalid type".to_string()))?;

    let agents = state.upstream.fetch_ranking().await?;
    let prompt = format!("{}\n\n{}", kind.prompt(), summarize(&agents));
    let result = state
        .upstream
        .complete(ANALYST_SYSTEM_PROMPT, &prompt, 2000)
        .await?;

    Ok(AnalyzeResponse { result, kind })
}
