use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::debug;

use super::{admit, require_llm};
use crate::error::AppError;
use crate::insights::{TRANSLATE_SYSTEM_PROMPT, needs_translation};
use crate::metrics::REQUEST_TOTAL;
use crate::models::{TranslateRequest, TranslateResponse};
use crate::state::AppState;

const ENDPOINT: &str = "translate";

pub async fn translate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Response> {
    REQUEST_TOTAL.with_label_values(&[ENDPOINT]).inc();
    require_llm(&state)?;
    admit(&state, &headers, ENDPOINT, Some(body.len()))?;

    let result = translate(&state, &body)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(state.guard.secure_headers(Json(result), ENDPOINT))
}

async fn translate(state: &AppState, body: &[u8]) -> Result<TranslateResponse, AppError> {
    let req: TranslateRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))?;
    let text = req
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("text required".to_string()))?;

    if !needs_translation(&text) {
        debug!("translation skipped");
        return Ok(TranslateResponse { result: text });
    }

    let translated = state
        .upstream
        .complete(TRANSLATE_SYSTEM_PROMPT, &text, 1024)
        .await?;
    let result = if translated.is_empty() { text } else { translated };
    Ok(TranslateResponse { result })
}
