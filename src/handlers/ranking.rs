use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::error::AppError;
use crate::metrics::REQUEST_TOTAL;
use crate::models::RankingAgent;
use crate::state::AppState;

// Unguarded: the leaderboard itself is cheap and cached
pub async fn ranking_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RankingAgent>>, AppError> {
    REQUEST_TOTAL.with_label_values(&["ranking"]).inc();
    let agents = state.upstream.fetch_ranking().await?;
    Ok(Json(agents))
}
