use axum::Router;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;

mod analyze;
mod gap_score;
mod health;
mod metrics;
mod onchain;
mod ranking;
mod translate;

pub use analyze::analyze_handler;
pub use gap_score::gap_score_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use onchain::onchain_handler;
pub use ranking::ranking_handler;
pub use translate::translate_handler;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/ranking", get(ranking_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/translate", post(translate_handler))
        .route("/api/gap-score", get(gap_score_handler))
        .route("/api/onchain", get(onchain_handler))
        .with_state(state)
}

// Run the guard for `endpoint`; Err carries the ready-made rejection response
fn admit(
    state: &AppState,
    headers: &HeaderMap,
    endpoint: &str,
    body_len: Option<usize>,
) -> Result<(), Response> {
    let decision = match body_len {
        Some(len) => state.guard.check_with_body(headers, endpoint, len),
        None => state.guard.check(headers, endpoint),
    };
    decision.into_result().map_err(IntoResponse::into_response)
}

// Insight routes are pointless without an LLM token
fn require_llm(state: &AppState) -> Result<(), Response> {
    if state.upstream.has_llm() {
        Ok(())
    } else {
        Err(AppError::NotConfigured("LLM_AUTH_TOKEN is not configured").into_response())
    }
}

fn require_analytics(state: &AppState) -> Result<(), Response> {
    if state.upstream.has_analytics() {
        Ok(())
    } else {
        Err(AppError::NotConfigured("DUNE_API_KEY is not configured").into_response())
    }
}
